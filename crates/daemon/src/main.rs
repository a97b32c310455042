use anyhow::Context;
use cachectl_core::{print_version, FadvisePurger};
use cachectld::{lifecycle, orchestrator, NAME};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "cachectld",
    about = "Periodically evicts configured paths from the page cache",
    disable_version_flag = true
)]
struct Cli {
    /// Print version information and exit.
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Configuration file.
    #[arg(short = 'c', long = "config", required_unless_present = "version")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(short = 't', long = "check")]
    check: bool,

    /// Log every purged file at info level.
    #[arg(long)]
    verbose: bool,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    log: String,

    /// Seconds to wait for in-flight purges after a termination signal.
    #[arg(long, default_value_t = 5)]
    drain_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        print_version(NAME);
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&cli.log))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli.config.context("-c <path> is required")?;
    let config = match orchestrator::load_targets(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(lifecycle::EXIT_FAILURE);
        }
    };

    if cli.check {
        info!(
            config = %config_path.display(),
            targets = config.targets.len(),
            "configuration ok"
        );
        return Ok(());
    }

    #[cfg(unix)]
    let signals = lifecycle::UnixSignals::register().context("registering signal handlers")?;
    #[cfg(not(unix))]
    let signals = lifecycle::CtrlC;

    let engine = Arc::new(FadvisePurger::new());
    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();
    let count = orchestrator::spawn_schedulers(&config, engine, cli.verbose, &tracker, &shutdown)?;
    info!(targets = count, config = %config_path.display(), "cachectld started");

    let code = lifecycle::wait_for_termination(signals).await;
    orchestrator::drain(&shutdown, &tracker, Duration::from_secs(cli.drain_timeout_secs)).await;

    // Exit without dropping the runtime: dropping it would wait on abandoned blocking purges.
    std::process::exit(code);
}
