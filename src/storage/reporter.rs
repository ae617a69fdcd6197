//! Background Stats Reporter
//!
//! A background task that periodically takes a snapshot of the tuple space
//! and emits a human-readable report.
//!
//! ## Design
//!
//! The reporter runs as a Tokio task and:
//! 1. Sleeps for the configured interval (default: 10s)
//! 2. Wakes up and takes a [`StoreStats`] snapshot (one lock acquisition)
//! 3. Hands the snapshot to its sink, which logs it by default
//!
//! The store lock is held only while the snapshot is computed, never while
//! the report is rendered or written.

use crate::storage::{StoreStats, TupleSpace};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Default interval between reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for the stats reporter.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Interval between reports (default: 10s)
    pub interval: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REPORT_INTERVAL,
        }
    }
}

/// A handle to the running stats reporter.
///
/// When this handle is dropped, the reporter task will be stopped.
#[derive(Debug)]
pub struct StatsReporter {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl StatsReporter {
    /// Starts the reporter, logging every report through `tracing`.
    pub fn start(space: Arc<TupleSpace>, config: ReporterConfig) -> Self {
        Self::start_with_sink(space, config, log_report)
    }

    /// Starts the reporter with a custom sink for the snapshots.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use tuplespace::storage::{ReporterConfig, StatsReporter, TupleSpace};
    /// use std::sync::Arc;
    ///
    /// let space = Arc::new(TupleSpace::new());
    /// let reporter = StatsReporter::start_with_sink(space, ReporterConfig::default(), |stats| {
    ///     println!("{}", stats);
    /// });
    ///
    /// // Dropping the reporter will stop it
    /// drop(reporter);
    /// ```
    pub fn start_with_sink<F>(space: Arc<TupleSpace>, config: ReporterConfig, sink: F) -> Self
    where
        F: FnMut(&StoreStats) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(reporter_loop(space, config.clone(), sink, shutdown_rx));

        info!(
            interval_secs = config.interval.as_secs_f64(),
            "Stats reporter started"
        );

        Self { shutdown_tx }
    }

    /// Stops the reporter.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        info!("Stats reporter stopped");
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The default sink: one INFO event carrying the rendered report.
fn log_report(stats: &StoreStats) {
    info!(
        tuples = stats.tuple_count,
        clients = stats.clients,
        operations = stats.total_operations,
        errors = stats.total_errors,
        "\n{}",
        stats
    );
}

/// The main reporter loop.
async fn reporter_loop<F>(
    space: Arc<TupleSpace>,
    config: ReporterConfig,
    mut sink: F,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    F: FnMut(&StoreStats),
{
    loop {
        // Wait for the interval or shutdown signal
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Stats reporter received shutdown signal");
                    return;
                }
            }
        }

        let stats = space.snapshot();
        sink(&stats);
    }
}
