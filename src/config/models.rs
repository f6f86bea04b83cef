// src/config/models.rs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Consecutive failures needed before the check reports unhealthy.
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(flatten)]
    pub kind: CheckKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckKind {
    Tcp {
        address: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    Cpu {
        threshold_percent: f64,
    },
    Http {
        url: Url,
        #[serde(default = "default_expected_status")]
        expected_status: u16,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    File {
        path: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("check name must not be empty")]
    EmptyName,

    #[error("duplicate check name: {0}")]
    DuplicateName(String),

    #[error("check {0}: interval_secs must be greater than zero")]
    ZeroInterval(String),

    #[error("check {0}: threshold must be at least 1")]
    ZeroThreshold(String),

    #[error("check {0}: timeout_secs must be greater than zero")]
    ZeroTimeout(String),

    #[error("check {name}: threshold_percent {value} must be in (0, 100]")]
    CpuThreshold { name: String, value: f64 },

    #[error("{field} must start with '/': {value}")]
    InvalidPath { field: &'static str, value: String },
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.status_path.starts_with('/') {
            return Err(ConfigError::InvalidPath {
                field: "server.status_path",
                value: self.server.status_path.clone(),
            });
        }
        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidPath {
                field: "metrics.path",
                value: self.metrics.path.clone(),
            });
        }

        let mut seen = HashSet::new();
        for check in &self.checks {
            check.validate()?;
            if !seen.insert(check.name.as_str()) {
                return Err(ConfigError::DuplicateName(check.name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    /// One TCP check against a local service, served on port 8080.
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            metrics: MetricsConfig::default(),
            checks: vec![CheckConfig {
                name: "tcpCheck".to_string(),
                interval_secs: 5,
                threshold: 1,
                kind: CheckKind::Tcp {
                    address: "127.0.0.1:8000".to_string(),
                    timeout_secs: 5,
                },
            }],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            status_path: default_status_path(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

impl CheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval(self.name.clone()));
        }
        if self.threshold == 0 {
            return Err(ConfigError::ZeroThreshold(self.name.clone()));
        }

        match &self.kind {
            CheckKind::Tcp { timeout_secs, .. } | CheckKind::Http { timeout_secs, .. }
                if *timeout_secs == 0 =>
            {
                Err(ConfigError::ZeroTimeout(self.name.clone()))
            }
            CheckKind::Cpu { threshold_percent }
                if !(*threshold_percent > 0.0 && *threshold_percent <= 100.0) =>
            {
                Err(ConfigError::CpuThreshold {
                    name: self.name.clone(),
                    value: *threshold_percent,
                })
            }
            _ => Ok(()),
        }
    }
}

impl CheckKind {
    /// Probe timeout for kinds that have one; zero otherwise.
    pub fn timeout(&self) -> Duration {
        match self {
            CheckKind::Tcp { timeout_secs, .. } | CheckKind::Http { timeout_secs, .. } => {
                Duration::from_secs(*timeout_secs)
            }
            CheckKind::Cpu { .. } | CheckKind::File { .. } => Duration::ZERO,
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_status_path() -> String {
    "/health".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_interval_secs() -> u64 {
    5
}

fn default_threshold() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_expected_status() -> u16 {
    200
}
