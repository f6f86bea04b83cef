// src/health/cpu.rs
//
// CPU utilization derived from the aggregate counters in /proc/stat.

use super::checker::{CheckError, Checker};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Cumulative CPU time counters at one instant, in clock ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    pub idle: u64,
}

impl CpuTimes {
    /// Parse the aggregate `cpu` line of `/proc/stat`.
    ///
    /// Total is user+nice+system+idle+iowait+irq+softirq+steal+guest+guest_nice.
    /// Older kernels expose fewer columns; missing ones count as zero.
    pub fn parse(stat: &str) -> Result<Self, CheckError> {
        let line = stat
            .lines()
            .find(|line| line.split_whitespace().next() == Some("cpu"))
            .ok_or_else(|| CheckError::CpuStats("missing aggregate cpu line".to_string()))?;

        let fields = line
            .split_whitespace()
            .skip(1)
            .take(10)
            .map(|field| {
                field
                    .parse::<u64>()
                    .map_err(|e| CheckError::CpuStats(format!("bad counter {:?}: {}", field, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if fields.len() < 4 {
            return Err(CheckError::CpuStats(format!(
                "expected at least 4 cpu counters, found {}",
                fields.len()
            )));
        }

        Ok(Self {
            total: fields.iter().sum(),
            idle: fields[3],
        })
    }

    /// Utilization between `earlier` and `self`, as a percentage.
    pub fn utilization_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let idle = self.idle.saturating_sub(earlier.idle).min(total);
        (1.0 - idle as f64 / total as f64) * 100.0
    }
}

/// Source of CPU counter samples.
#[async_trait]
pub trait CpuSampler: Send + Sync {
    async fn sample(&self) -> Result<CpuTimes, CheckError>;
}

/// Reads samples from a procfs `stat` file.
#[derive(Debug, Clone)]
pub struct ProcStatSampler {
    path: PathBuf,
}

impl ProcStatSampler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcStatSampler {
    fn default() -> Self {
        Self::new("/proc/stat")
    }
}

#[async_trait]
impl CpuSampler for ProcStatSampler {
    async fn sample(&self) -> Result<CpuTimes, CheckError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CheckError::CpuStats(format!("{}: {}", self.path.display(), e)))?;
        CpuTimes::parse(&contents)
    }
}

/// Fails while CPU utilization exceeds `threshold_percent`.
///
/// Each instance keeps its own previous sample, so two checkers never share a
/// baseline. The first probe only records the baseline and reports 0%.
pub struct CpuChecker<S = ProcStatSampler> {
    threshold_percent: f64,
    sampler: S,
    last: Mutex<Option<CpuTimes>>,
}

impl CpuChecker<ProcStatSampler> {
    pub fn new(threshold_percent: f64) -> Self {
        Self::with_sampler(threshold_percent, ProcStatSampler::default())
    }
}

impl<S: CpuSampler> CpuChecker<S> {
    pub fn with_sampler(threshold_percent: f64, sampler: S) -> Self {
        Self {
            threshold_percent,
            sampler,
            last: Mutex::new(None),
        }
    }

    /// Take a sample and return utilization relative to the previous one.
    pub async fn measure(&self) -> Result<f64, CheckError> {
        let current = self.sampler.sample().await?;
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let usage = match last.replace(current) {
            Some(previous) => current.utilization_since(&previous),
            None => 0.0,
        };
        Ok(usage)
    }
}

#[async_trait]
impl<S: CpuSampler> Checker for CpuChecker<S> {
    async fn probe(&self) -> Result<(), CheckError> {
        let usage = self.measure().await?;
        debug!(usage, threshold = self.threshold_percent, "cpu sample");

        if usage > self.threshold_percent {
            return Err(CheckError::HighCpuUsage {
                usage,
                threshold: self.threshold_percent,
            });
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "cpu"
    }
}
