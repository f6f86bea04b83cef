// src/health/runner.rs
use super::checker::{CheckError, CheckResult, Checker};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Smallest accepted interval; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Re-runs a [`Checker`] on a fixed cadence and caches the latest result.
///
/// The first check runs immediately when the runner is created; later checks
/// follow every `interval`. A check slower than the interval delays the next
/// tick instead of queueing a burst.
///
/// The background task stops when [`PeriodicRunner::stop`] is called or the
/// runner is dropped. A check already in flight at that point is allowed to
/// finish but its result is thrown away.
pub struct PeriodicRunner {
    kind: &'static str,
    interval: Duration,
    threshold: u32,
    latest: Arc<ArcSwap<CheckResult>>,
    runs: Arc<AtomicU64>,
    shutdown_tx: watch::Sender<bool>,
}

impl PeriodicRunner {
    /// Spawn a runner that publishes every result as it completes.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(checker: Arc<dyn Checker>, interval: Duration) -> Self {
        Self::with_threshold(checker, interval, 1)
    }

    /// Spawn a runner that only publishes a failure once `threshold`
    /// consecutive checks have failed. Successes are published immediately
    /// and reset the count. A failure below the threshold keeps the previous
    /// verdict but stamps it with the time of the check that just ran.
    pub fn with_threshold(checker: Arc<dyn Checker>, interval: Duration, threshold: u32) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        let threshold = threshold.max(1);
        let latest = Arc::new(ArcSwap::from_pointee(CheckResult::pending()));
        let runs = Arc::new(AtomicU64::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let kind = checker.kind();

        let schedule = Schedule {
            checker,
            interval,
            threshold,
            latest: latest.clone(),
            runs: runs.clone(),
            shutdown_rx,
        };
        tokio::spawn(schedule.run());

        debug!(kind, ?interval, threshold, "periodic runner started");

        Self {
            kind,
            interval,
            threshold,
            latest,
            runs,
            shutdown_tx,
        }
    }

    /// Most recently completed result. Never blocks and never runs a check.
    pub fn latest(&self) -> CheckResult {
        self.latest.load().as_ref().clone()
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of checks whose outcome has been recorded.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Stop scheduling further ticks.
    pub fn stop(&self) {
        // Stored even when the task has already exited.
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

impl Drop for PeriodicRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PeriodicRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicRunner")
            .field("kind", &self.kind)
            .field("interval", &self.interval)
            .field("threshold", &self.threshold)
            .field("runs", &self.runs())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// State owned by the background task.
struct Schedule {
    checker: Arc<dyn Checker>,
    interval: Duration,
    threshold: u32,
    latest: Arc<ArcSwap<CheckResult>>,
    runs: Arc<AtomicU64>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Schedule {
    async fn run(mut self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let result = execute(self.checker.clone()).await;

                    if *self.shutdown_rx.borrow() {
                        debug!(kind = self.checker.kind(), "discarding result of check finished after stop");
                        break;
                    }

                    self.runs.fetch_add(1, Ordering::SeqCst);
                    self.record(result, &mut consecutive_failures);
                }
                // Fires on an explicit stop and when the runner handle is dropped.
                _ = self.shutdown_rx.changed() => {
                    break;
                }
            }
        }

        info!(kind = self.checker.kind(), "periodic runner stopped");
    }

    fn record(&self, result: CheckResult, consecutive_failures: &mut u32) {
        if result.ok {
            if *consecutive_failures >= self.threshold {
                info!(kind = self.checker.kind(), "check recovered");
            }
            *consecutive_failures = 0;
            self.latest.store(Arc::new(result));
            return;
        }

        *consecutive_failures = consecutive_failures.saturating_add(1);
        if *consecutive_failures >= self.threshold {
            if *consecutive_failures == self.threshold {
                warn!(
                    kind = self.checker.kind(),
                    failures = *consecutive_failures,
                    detail = ?result.detail,
                    "check is failing"
                );
            }
            self.latest.store(Arc::new(result));
        } else {
            debug!(
                kind = self.checker.kind(),
                failures = *consecutive_failures,
                threshold = self.threshold,
                "check failed below threshold"
            );
            let previous = self.latest.load();
            self.latest.store(Arc::new(CheckResult {
                ok: previous.ok,
                detail: previous.detail.clone(),
                timestamp: result.timestamp,
            }));
        }
    }
}

/// Run one check on its own task so a panic cannot take the schedule down.
async fn execute(checker: Arc<dyn Checker>) -> CheckResult {
    match tokio::spawn(async move { checker.check().await }).await {
        Ok(result) => result,
        Err(err) => CheckResult::from_outcome(Err(CheckError::Panicked(join_error_reason(err)))),
    }
}

fn join_error_reason(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic payload".to_string()
        }
    } else if err.is_cancelled() {
        "check task unexpectedly cancelled".to_string()
    } else {
        "check task failed (reason unknown)".to_string()
    }
}
