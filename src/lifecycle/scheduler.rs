use super::machine::{LifecycleService, SweepReport};
use crate::core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Background task that releases identities whose afterlife deadline has
/// elapsed.
///
/// One task for all identities. Stopping is observed between ticks only, so
/// a sweep that has started always runs to completion.
pub struct ReleaseScheduler {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
    reports: watch::Receiver<SweepReport>,
}

impl ReleaseScheduler {
    pub fn spawn(
        service: Arc<LifecycleService>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        let interval = interval.max(Duration::from_millis(10));
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (report_tx, reports) = watch::channel(SweepReport::default());

        let join_handle = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "release scheduler started");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        break;
                    }
                    _ = sleep(interval) => {
                        let report = service.sweep(clock.now_millis()).await;
                        if report.failed > 0 {
                            error!(failed = report.failed, "release sweep had failures");
                        }
                        debug!(checked = report.checked, released = report.released, "release tick");
                        let _ = report_tx.send(report);
                    }
                }
            }
            info!("release scheduler stopped");
        });

        Self {
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
            reports,
        }
    }

    /// Report of the most recent tick.
    pub fn last_report(&self) -> SweepReport {
        *self.reports.borrow()
    }

    /// Waits until the next tick completes and returns its report.
    pub async fn next_report(&mut self) -> Option<SweepReport> {
        self.reports.changed().await.ok()?;
        Some(*self.reports.borrow_and_update())
    }

    /// Signals the task to stop and waits for any in-flight sweep to finish.
    pub async fn shutdown(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            if let Err(err) = join_handle.await {
                error!(error = %err, "release scheduler task failed");
            }
        }
    }
}

impl Drop for ReleaseScheduler {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}
