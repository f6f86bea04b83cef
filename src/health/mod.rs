// src/health/mod.rs
mod checker;
mod cpu;
mod file;
mod http;
mod registry;
mod runner;
mod status;
mod tcp;

pub use checker::{CheckError, CheckResult, Checker};
pub use cpu::{CpuChecker, CpuSampler, CpuTimes, ProcStatSampler};
pub use file::FileChecker;
pub use http::HttpChecker;
pub use registry::{Registry, Snapshot};
pub use runner::PeriodicRunner;
pub use status::{handle_status_request, HealthStatus, StatusReport};
pub use tcp::TcpChecker;

use crate::config::CheckKind;
use std::sync::Arc;

/// Build the checker described by a configured check kind.
pub fn create_checker(kind: &CheckKind) -> Arc<dyn Checker> {
    match kind {
        CheckKind::Tcp { address, .. } => Arc::new(TcpChecker::new(address.clone(), kind.timeout())),
        CheckKind::Cpu { threshold_percent } => Arc::new(CpuChecker::new(*threshold_percent)),
        CheckKind::Http {
            url,
            expected_status,
            ..
        } => Arc::new(HttpChecker::new(url.clone(), *expected_status, kind.timeout())),
        CheckKind::File { path } => Arc::new(FileChecker::new(path.clone())),
    }
}
