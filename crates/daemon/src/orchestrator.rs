use crate::scheduler::TargetScheduler;
use cachectl_core::{load_config, validate_config, Config, ConfigError, PurgeEngine};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Load and validate the configuration. Any error here is fatal to startup.
pub fn load_targets(path: &Path) -> Result<Config, ConfigError> {
    let config = load_config(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Spawn one scheduler per target onto `tracker`. Returns the number spawned.
///
/// Every filter is compiled before anything is spawned, so an error leaves no task running.
pub fn spawn_schedulers<E: PurgeEngine + 'static>(
    config: &Config,
    engine: Arc<E>,
    verbose: bool,
    tracker: &TaskTracker,
    shutdown: &CancellationToken,
) -> Result<usize, ConfigError> {
    let schedulers = config
        .targets
        .iter()
        .enumerate()
        .map(|(id, target)| TargetScheduler::new(id, target.clone(), Arc::clone(&engine), verbose))
        .collect::<Result<Vec<_>, _>>()?;

    let count = schedulers.len();
    for scheduler in schedulers {
        tracker.spawn(scheduler.run(shutdown.child_token()));
    }
    Ok(count)
}

/// Cancel every scheduler and wait up to `timeout` for in-flight cycles.
///
/// Returns `false` if the wait timed out; the remaining purges are abandoned.
pub async fn drain(shutdown: &CancellationToken, tracker: &TaskTracker, timeout: Duration) -> bool {
    shutdown.cancel();
    tracker.close();

    match tokio::time::timeout(timeout, tracker.wait()).await {
        Ok(()) => {
            info!("all schedulers stopped");
            true
        }
        Err(_) => {
            warn!(
                timeout_secs = timeout.as_secs_f64(),
                remaining = tracker.len(),
                "schedulers still busy; abandoning in-flight purges"
            );
            false
        }
    }
}
