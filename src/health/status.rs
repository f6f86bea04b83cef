// src/health/status.rs
use super::checker::CheckResult;
use super::registry::Snapshot;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn status_code(self) -> StatusCode {
        match self {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Rendered form of a registry snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: HealthStatus,
    pub checks: BTreeMap<String, CheckResult>,
}

impl StatusReport {
    /// Healthy iff every check passed; an empty snapshot is healthy.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let status = if snapshot.values().all(|result| result.ok) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        Self {
            status,
            checks: snapshot,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Names of the checks currently failing.
    pub fn failing(&self) -> impl Iterator<Item = &str> {
        self.checks
            .iter()
            .filter(|(_, result)| !result.ok)
            .map(|(name, _)| name.as_str())
    }
}

/// Render a snapshot as a JSON response: 200 when healthy, 503 otherwise.
pub fn handle_status_request(snapshot: Snapshot) -> Response<Body> {
    let report = StatusReport::from_snapshot(snapshot);
    let status = report.status.status_code();

    if !report.is_healthy() {
        tracing::debug!(failing = ?report.failing().collect::<Vec<_>>(), "reporting unhealthy");
    }

    let mut response = match serde_json::to_vec(&report) {
        Ok(body) => Response::new(Body::from(body)),
        Err(e) => {
            // The status code alone still carries the verdict.
            tracing::error!(%e, "failed to encode status report");
            Response::new(Body::empty())
        }
    };

    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
