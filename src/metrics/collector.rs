// src/metrics/collector.rs
use crate::health::Snapshot;
use anyhow::Result;
use prometheus::{Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::{Arc, Mutex};

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
    // Held across refresh and encode so scrapes never see a half-reset gauge.
    scrape: Mutex<()>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
            scrape: Mutex::new(()),
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }

    /// Refresh the per-check gauges from `snapshot` and encode the result.
    pub fn gather_snapshot(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        let _scrape = self.scrape.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.collector.observe_snapshot(snapshot);
        self.gather()
    }
}

pub struct MetricsCollector {
    // Check metrics
    pub check_status: IntGaugeVec,
    pub check_last_run_timestamp_seconds: IntGaugeVec,
    pub checks_registered: IntGauge,

    // Endpoint metrics
    pub status_requests_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let check_status = IntGaugeVec::new(
            Opts::new(
                "health_check_status",
                "Latest check outcome (1=ok, 0=failing)",
            ),
            &["check"],
        )?;
        registry.register(Box::new(check_status.clone()))?;

        let check_last_run_timestamp_seconds = IntGaugeVec::new(
            Opts::new(
                "health_check_last_run_timestamp_seconds",
                "Unix time of the latest completed check (0 before the first run)",
            ),
            &["check"],
        )?;
        registry.register(Box::new(check_last_run_timestamp_seconds.clone()))?;

        let checks_registered =
            IntGauge::new("health_checks_registered", "Number of registered checks")?;
        registry.register(Box::new(checks_registered.clone()))?;

        let status_requests_total = IntCounterVec::new(
            Opts::new(
                "health_status_requests_total",
                "Status endpoint requests by response code",
            ),
            &["status_code"],
        )?;
        registry.register(Box::new(status_requests_total.clone()))?;

        Ok(Self {
            check_status,
            check_last_run_timestamp_seconds,
            checks_registered,
            status_requests_total,
        })
    }

    /// Refresh the per-check gauges from a registry snapshot.
    pub fn observe_snapshot(&self, snapshot: &Snapshot) {
        // Drop series for names no longer registered.
        self.check_status.reset();
        self.check_last_run_timestamp_seconds.reset();

        for (name, result) in snapshot {
            let value = if result.ok { 1 } else { 0 };
            self.check_status.with_label_values(&[name.as_str()]).set(value);

            let last_run = if result.is_pending() {
                0
            } else {
                result.timestamp.timestamp()
            };
            self.check_last_run_timestamp_seconds
                .with_label_values(&[name.as_str()])
                .set(last_run);
        }

        self.checks_registered.set(snapshot.len() as i64);
    }

    pub fn record_status_request(&self, status_code: u16) {
        self.status_requests_total
            .with_label_values(&[&status_code.to_string()])
            .inc();
    }
}
