// src/health/checker.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a single check execution.
///
/// Produced once and never mutated; a runner publishes a fresh value on every
/// tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CheckResult {
    pub fn passed() -> Self {
        Self {
            ok: true,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
            timestamp: Utc::now(),
        }
    }

    /// The result reported before a runner has completed its first check.
    ///
    /// Healthy, with the default (epoch) timestamp so callers can tell it
    /// apart from a real measurement.
    pub fn pending() -> Self {
        Self {
            ok: true,
            detail: None,
            timestamp: DateTime::<Utc>::default(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.timestamp == DateTime::<Utc>::default()
    }

    pub fn from_outcome(outcome: Result<(), CheckError>) -> Self {
        match outcome {
            Ok(()) => Self::passed(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Ordinary probe failures. The display text is what ends up in
/// [`CheckResult::detail`].
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("connection to {address} failed")]
    ConnectionFailed { address: String },

    #[error("High CPU Usage")]
    HighCpuUsage { usage: f64, threshold: f64 },

    #[error("failed to sample cpu counters: {0}")]
    CpuStats(String),

    #[error("downstream service returned unexpected status: {0}")]
    UnexpectedStatus(u16),

    #[error("error while checking: {url}")]
    Request { url: String },

    #[error("file exists")]
    FileExists,

    #[error("check panicked: {0}")]
    Panicked(String),
}

/// A single health probe.
///
/// Implementors only provide [`Checker::probe`]; ordinary failures are
/// returned as [`CheckError`] rather than panicking.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn probe(&self) -> Result<(), CheckError>;

    fn kind(&self) -> &'static str;

    async fn check(&self) -> CheckResult {
        CheckResult::from_outcome(self.probe().await)
    }
}
