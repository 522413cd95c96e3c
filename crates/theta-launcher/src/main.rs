use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use theta_launcher::{
    Credentials, DownloadProgress, LauncherError, RegionSettings, TerminalConfig,
    TerminalLauncher, TerminalSettings,
};

#[derive(Parser)]
#[command(name = "theta-launcher")]
#[command(about = "Launches and supervises the ThetaData terminal")]
#[command(version)]
struct Cli {
    /// Path to ThetaTerminal.jar (defaults to the current directory)
    #[arg(long, global = true)]
    jar: Option<PathBuf>,

    /// Java executable used to run the terminal
    #[arg(long, global = true)]
    java: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the terminal and stream its output until it exits or Ctrl-C
    Run {
        /// ThetaData username; falls back to the stored credentials
        #[arg(long)]
        username: Option<String>,

        /// ThetaData password; falls back to the stored credentials
        #[arg(long)]
        password: Option<String>,

        /// Download the JAR first when it is missing
        #[arg(long)]
        download: bool,
    },

    /// Download the terminal JAR
    Download,

    /// Show or change the terminal's server regions
    Regions {
        /// New MDDS region (e.g. MDDS_NJ_HOSTS)
        #[arg(long)]
        mdds: Option<String>,

        /// New FPSS region (e.g. FPSS_NJ_HOSTS)
        #[arg(long)]
        fpss: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let mut builder = TerminalConfig::builder();
    builder.jar_path(cli.jar.unwrap_or_else(|| PathBuf::from("ThetaTerminal.jar")));
    if let Some(java) = cli.java {
        builder.java_binary(java);
    }
    let config = builder.build()?;

    match cli.command {
        Commands::Run {
            username,
            password,
            download,
        } => run_terminal(config, username, password, download).await,
        Commands::Download => download_jar(config).await,
        Commands::Regions { mdds, fpss } => regions(mdds, fpss),
    }
}

async fn run_terminal(
    config: TerminalConfig,
    username: Option<String>,
    password: Option<String>,
    download: bool,
) -> Result<()> {
    let launcher = TerminalLauncher::new(config);

    let stored = launcher.stored_credentials()?;
    let credentials = Credentials::new(
        username.unwrap_or(stored.username),
        password.unwrap_or(stored.password),
    );
    if credentials.is_incomplete() {
        anyhow::bail!(
            "no credentials given; pass --username/--password once and they are remembered"
        );
    }

    let supervisor = launcher.supervisor();
    supervisor.on_output(|line| println!("{line}"));

    let result = if download {
        launcher
            .start_with_download(&credentials, Some(progress_printer()))
            .await
    } else {
        launcher.start(&credentials).await
    };
    let pid = result?;
    eprintln!("terminal started (pid {pid}), press Ctrl-C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            eprintln!("stopping terminal...");
            launcher.stop().await?;
        }
        _ = supervisor.wait_until_stopped() => {}
    }

    match supervisor.last_exit() {
        Some(exit) if !exit.was_expected => {
            Err(LauncherError::UnexpectedExit { code: exit.code }.into())
        }
        _ => Ok(()),
    }
}

async fn download_jar(config: TerminalConfig) -> Result<()> {
    let launcher = TerminalLauncher::new(config);
    if launcher.ensure_jar(Some(progress_printer())).await? {
        eprintln!();
        eprintln!("saved {}", launcher.config().jar_path.display());
    } else {
        eprintln!("{} already present", launcher.config().jar_path.display());
    }
    Ok(())
}

fn regions(mdds: Option<String>, fpss: Option<String>) -> Result<()> {
    let settings = TerminalSettings::with_default_location()
        .ok_or_else(|| anyhow::anyhow!("could not resolve the home directory"))?;

    let current = settings.read_regions()?;
    if mdds.is_none() && fpss.is_none() {
        println!("MDDS_REGION={}", current.mdds_region);
        println!("FPSS_REGION={}", current.fpss_region);
        return Ok(());
    }

    let updated = RegionSettings {
        mdds_region: mdds.unwrap_or(current.mdds_region),
        fpss_region: fpss.unwrap_or(current.fpss_region),
    };
    settings.update_regions(&updated)?;
    println!("MDDS_REGION={}", updated.mdds_region);
    println!("FPSS_REGION={}", updated.fpss_region);
    Ok(())
}

/// Progress sink that rewrites one status line on stderr
fn progress_printer() -> theta_launcher::ProgressSink {
    Arc::new(|progress: DownloadProgress| match progress.percentage() {
        Some(pct) => eprint!("\rdownloading... {pct}% ({} bytes)", progress.downloaded),
        None => eprint!("\rdownloading... {} bytes", progress.downloaded),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_credentials() {
        let cli = Cli::try_parse_from([
            "theta-launcher",
            "run",
            "--username",
            "u",
            "--password",
            "p",
            "--download",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                username,
                password,
                download,
            } => {
                assert_eq!(username.as_deref(), Some("u"));
                assert_eq!(password.as_deref(), Some("p"));
                assert!(download);
            }
            _ => panic!("expected the run subcommand"),
        }
    }

    #[test]
    fn parses_global_jar_override_after_subcommand() {
        let cli =
            Cli::try_parse_from(["theta-launcher", "download", "--jar", "/tmp/Terminal.jar"])
                .unwrap();
        assert_eq!(
            cli.jar.as_deref(),
            Some(std::path::Path::new("/tmp/Terminal.jar"))
        );
        assert!(matches!(cli.command, Commands::Download));
    }

    #[test]
    fn parses_regions_update() {
        let cli =
            Cli::try_parse_from(["theta-launcher", "regions", "--mdds", "MDDS_DEV_HOSTS"]).unwrap();
        match cli.command {
            Commands::Regions { mdds, fpss } => {
                assert_eq!(mdds.as_deref(), Some("MDDS_DEV_HOSTS"));
                assert!(fpss.is_none());
            }
            _ => panic!("expected the regions subcommand"),
        }
    }
}
