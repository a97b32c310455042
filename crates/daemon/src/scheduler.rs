use cachectl_core::{probe, ConfigError, PathKind, PurgeEngine, PurgeError, PurgeStats, Target};
use regex::Regex;
use std::sync::Arc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of a single probe-and-purge cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The path could not be stat'ed.
    ProbeFailed,
    /// The path exists but is neither a directory nor a regular file.
    Skipped,
    Walked(PurgeStats),
    Purged(PurgeStats),
    PurgeFailed,
}

/// Drives one target forever. Errors inside a cycle are logged and never end the loop.
pub struct TargetScheduler<E> {
    id: usize,
    target: Arc<Target>,
    filter: Arc<Regex>,
    engine: Arc<E>,
    verbose: bool,
}

impl<E: PurgeEngine + 'static> TargetScheduler<E> {
    /// Compiles the target's filter. This is the only compilation for the scheduler's lifetime.
    pub fn new(
        id: usize,
        target: Target,
        engine: Arc<E>,
        verbose: bool,
    ) -> Result<Self, ConfigError> {
        target.check_interval(id)?;
        let filter = target.compile_filter_at(id)?;
        Ok(Self {
            id,
            target: Arc::new(target),
            filter: Arc::new(filter),
            engine,
            verbose,
        })
    }

    /// Fire a cycle every `purge_interval` until `shutdown` is cancelled.
    ///
    /// The first cycle runs one interval after start. A cancellation observed
    /// mid-cycle takes effect once the in-flight purge returns.
    pub async fn run(self, shutdown: CancellationToken) {
        let period = self.target.interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            id = self.id,
            path = %self.target.path.display(),
            interval_secs = self.target.purge_interval,
            rate = self.target.rate,
            "scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let outcome = self.cycle().await;
            debug!(id = self.id, ?outcome, "cycle finished");
        }

        info!(id = self.id, path = %self.target.path.display(), "scheduler stopped");
    }

    /// One probe plus at most one purge. The path is re-classified and its size re-read every time.
    pub async fn cycle(&self) -> CycleOutcome {
        let path = &self.target.path;

        let probed = match probe(path) {
            Ok(p) => p,
            Err(e) => {
                warn!(id = self.id, path = %path.display(), error = %e, "probe failed");
                return CycleOutcome::ProbeFailed;
            }
        };

        match probed.kind {
            PathKind::Directory => {
                let verbose = self.verbose;
                let res = self
                    .blocking(move |engine, target, filter| {
                        engine.walk_and_purge(&target.path, filter, target.rate, verbose)
                    })
                    .await;
                match res {
                    Ok(stats) => {
                        debug!(
                            id = self.id,
                            path = %path.display(),
                            files = stats.files,
                            bytes = stats.bytes,
                            failed = stats.failed,
                            "walk finished"
                        );
                        CycleOutcome::Walked(stats)
                    }
                    Err(e) => {
                        warn!(id = self.id, path = %path.display(), error = %e, "failed to walk");
                        CycleOutcome::PurgeFailed
                    }
                }
            }
            PathKind::Other => {
                warn!(id = self.id, path = %path.display(), "not a regular file; skipping");
                CycleOutcome::Skipped
            }
            PathKind::Regular => {
                let (size, verbose) = (probed.size, self.verbose);
                let res = self
                    .blocking(move |engine, target, _| {
                        engine.purge_file(&target.path, size, target.rate, verbose)
                    })
                    .await;
                match res {
                    Ok(stats) => CycleOutcome::Purged(stats),
                    Err(e) => {
                        warn!(id = self.id, path = %path.display(), error = %e, "purge failed");
                        CycleOutcome::PurgeFailed
                    }
                }
            }
        }
    }

    async fn blocking<F>(&self, f: F) -> anyhow::Result<PurgeStats>
    where
        F: FnOnce(&E, &Target, &Regex) -> Result<PurgeStats, PurgeError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        let target = Arc::clone(&self.target);
        let filter = Arc::clone(&self.filter);
        let stats = tokio::task::spawn_blocking(move || f(&engine, &target, &filter)).await??;
        Ok(stats)
    }
}
