use std::sync::Arc;
use theta_launcher_core::TerminalProcessManager;

/// Create the process manager for the current platform.
///
/// Selection happens at compile time; the unused platform crate is not
/// even linked.
pub fn create_process_manager() -> Arc<dyn TerminalProcessManager> {
    #[cfg(unix)]
    {
        Arc::new(theta_launcher_unix::UnixProcessManagerFactory::create_process_manager())
    }

    #[cfg(windows)]
    {
        Arc::new(theta_launcher_windows::WindowsProcessManagerFactory::create_process_manager())
    }
}

/// Platform name for logging and diagnostics
pub fn platform_name() -> &'static str {
    #[cfg(unix)]
    return theta_launcher_unix::UnixProcessManagerFactory::platform_name();

    #[cfg(windows)]
    return theta_launcher_windows::WindowsProcessManagerFactory::platform_name();
}
