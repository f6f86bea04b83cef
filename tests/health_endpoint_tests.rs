// tests/health_endpoint_tests.rs
use async_trait::async_trait;
use rust_health_monitor::health::{
    CheckError, CheckResult, Checker, CpuChecker, CpuSampler, CpuTimes, PeriodicRunner, Registry,
    TcpChecker,
};
use rust_health_monitor::server::{RequestHandler, ServerBuilder};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};

struct Ticking {
    ticks: Arc<AtomicU64>,
}

#[async_trait]
impl Checker for Ticking {
    async fn probe(&self) -> Result<(), CheckError> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "ticking"
    }
}

struct Hang;

#[async_trait]
impl Checker for Hang {
    async fn probe(&self) -> Result<(), CheckError> {
        sleep(Duration::from_secs(3600)).await;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "hang"
    }
}

/// Replays a fixed list of counter samples.
struct Replay(Mutex<VecDeque<CpuTimes>>);

#[async_trait]
impl CpuSampler for Replay {
    async fn sample(&self) -> Result<CpuTimes, CheckError> {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CheckError::CpuStats("no more samples".to_string()))
    }
}

#[tokio::test]
async fn test_latest_has_timestamp_after_one_interval() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let registry = Registry::new();
    registry.register_periodic(
        "tcp",
        Arc::new(TcpChecker::new(addr, Duration::from_secs(1))),
        Duration::from_millis(50),
    );
    registry.register_periodic(
        "cpu",
        Arc::new(CpuChecker::new(100.0)),
        Duration::from_millis(50),
    );

    sleep(Duration::from_millis(120)).await;

    for (name, result) in registry.snapshot() {
        assert!(!result.is_pending(), "{} never completed a check", name);
        assert!(result.timestamp > CheckResult::pending().timestamp);
    }
    assert!(registry.snapshot()["tcp"].ok);
}

#[tokio::test]
async fn test_tcp_check_flips_when_listener_goes_away() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let registry = Registry::new();
    registry.register_periodic(
        "tcpCheck",
        Arc::new(TcpChecker::new(addr.clone(), Duration::from_millis(500))),
        Duration::from_millis(30),
    );

    sleep(Duration::from_millis(60)).await;
    assert!(registry.snapshot()["tcpCheck"].ok);

    drop(listener);
    sleep(Duration::from_millis(150)).await;

    let result = &registry.snapshot()["tcpCheck"];
    assert!(!result.ok);
    assert_eq!(result.detail, Some(format!("connection to {} failed", addr)));
}

#[tokio::test]
async fn test_cpu_checker_synthetic_samples() {
    let samples = [(1_000, 500), (1_100, 510), (1_200, 605)]
        .into_iter()
        .map(|(total, idle)| CpuTimes { total, idle })
        .collect();
    let checker = CpuChecker::with_sampler(20.0, Replay(Mutex::new(samples)));

    // Baseline, then 90% busy, then 5% busy.
    assert!(checker.check().await.ok);
    let busy = checker.check().await;
    assert!(!busy.ok);
    assert_eq!(busy.detail.as_deref(), Some("High CPU Usage"));
    assert!(checker.check().await.ok);
}

#[tokio::test]
async fn test_reregistering_stops_old_tick_counter() {
    let registry = Registry::new();
    let old_ticks = Arc::new(AtomicU64::new(0));
    let new_ticks = Arc::new(AtomicU64::new(0));

    registry.register_periodic(
        "svc",
        Arc::new(Ticking {
            ticks: old_ticks.clone(),
        }),
        Duration::from_millis(10),
    );
    sleep(Duration::from_millis(50)).await;

    registry.register_periodic(
        "svc",
        Arc::new(Ticking {
            ticks: new_ticks.clone(),
        }),
        Duration::from_millis(10),
    );
    sleep(Duration::from_millis(30)).await;

    let old_frozen = old_ticks.load(Ordering::SeqCst);
    let new_before = new_ticks.load(Ordering::SeqCst);
    sleep(Duration::from_millis(100)).await;

    assert_eq!(old_ticks.load(Ordering::SeqCst), old_frozen);
    assert!(new_ticks.load(Ordering::SeqCst) > new_before);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_snapshot_is_race_free_under_concurrent_registration() {
    let registry = Arc::new(Registry::new());
    let stable = ["alpha", "beta", "gamma"];
    for name in stable {
        registry.register_periodic(
            name,
            Arc::new(Ticking {
                ticks: Arc::new(AtomicU64::new(0)),
            }),
            Duration::from_millis(5),
        );
    }

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let registry = registry.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    // Replace the stable names and add fresh ones.
                    let name = if i % 2 == 0 {
                        stable[i % stable.len()].to_string()
                    } else {
                        format!("extra-{}-{}", w, i)
                    };
                    registry.register_periodic(
                        name,
                        Arc::new(Ticking {
                            ticks: Arc::new(AtomicU64::new(0)),
                        }),
                        Duration::from_millis(5),
                    );
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let reader = {
        let registry = registry.clone();
        tokio::spawn(async move {
            let mut last_len = 0;
            for _ in 0..500 {
                let snapshot = registry.snapshot();
                for name in stable {
                    let result = snapshot.get(name).expect("stable name missing from snapshot");
                    assert!(result.ok);
                    assert!(result.detail.is_none());
                }
                // Names are only ever added, so the map never shrinks.
                assert!(snapshot.len() >= last_len);
                last_len = snapshot.len();
                tokio::task::yield_now().await;
            }
        })
    };

    for writer in writers {
        writer.await.unwrap();
    }
    reader.await.unwrap();

    assert_eq!(registry.len(), stable.len() + 4 * 25);
    registry.shutdown();
}

#[tokio::test]
async fn test_status_endpoint_over_http() {
    let registry = Arc::new(Registry::new());
    let server = ServerBuilder::new("127.0.0.1:0".parse().unwrap())
        .with_handler(RequestHandler::new(registry.clone(), "/health"))
        .bind()
        .await
        .unwrap();
    let base = format!("http://{}", server.local_addr());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve(async move {
        let _ = stop_rx.await;
    }));

    // No checks registered yet: healthy by default.
    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    // A dead port makes the endpoint report 503 with the failing detail.
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_addr = closed.local_addr().unwrap().to_string();
    drop(closed);
    registry.register(
        "tcpCheck",
        PeriodicRunner::new(
            Arc::new(TcpChecker::new(closed_addr.clone(), Duration::from_millis(500))),
            Duration::from_secs(60),
        ),
    );
    sleep(Duration::from_millis(100)).await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(response.status(), 503);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["tcpCheck"]["ok"], false);
    assert_eq!(
        body["checks"]["tcpCheck"]["detail"],
        format!("connection to {} failed", closed_addr)
    );

    let greeting = reqwest::get(format!("{}/world", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(greeting, "Hi there, I love world!");

    stop_tx.send(()).unwrap();
    serving.await.unwrap().unwrap();
    registry.shutdown();
}

#[tokio::test]
async fn test_status_never_waits_on_hung_checker() {
    let registry = Arc::new(Registry::new());
    registry.register(
        "hung",
        PeriodicRunner::new(Arc::new(Hang), Duration::from_millis(10)),
    );
    let handler = RequestHandler::new(registry.clone(), "/health");

    let request = hyper::Request::get("/health")
        .body(hyper::Body::empty())
        .unwrap();
    let response = tokio::time::timeout(Duration::from_millis(100), async {
        handler.handle(&request)
    })
    .await
    .expect("status request blocked on a checker");

    // Still pending, which reports healthy.
    assert_eq!(response.status(), 200);
    registry.shutdown();
}
