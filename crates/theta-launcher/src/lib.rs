//! Theta Launcher - supervises the ThetaTerminal process
//!
//! The facade crate wires the platform process managers to the terminal
//! supervisor and ships the surrounding collaborators: credential
//! persistence, JAR download, and the terminal's region settings.

mod download;
mod launcher;
mod platform;
mod settings;
mod store;
mod supervisor;

pub use download::JarDownloader;
pub use launcher::TerminalLauncher;
pub use platform::{create_process_manager, platform_name};
pub use settings::{
    FPSS_REGIONS, MDDS_REGIONS, RegionSettings, TerminalSettings, config_dir, logs_dir,
};
pub use store::CredentialStore;
pub use supervisor::{ExitInfo, TerminalSupervisor};

// Re-export core functionality
pub use theta_launcher_core::*;
