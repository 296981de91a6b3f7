use async_trait::async_trait;
use ci_warden::adapters::http::ReqwestProbe;
use ci_warden::core::workflow::{restart, RestartSettings};
use ci_warden::domain::ports::{ServiceControl, SocketTable};
use ci_warden::{cancellation, Cancellation, PollStatus, ReadinessWaiter, Result};
use httpmock::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 模擬 "stop 指令回來了但 process 還沒死" 的服務
struct StubbornService {
    port: u16,
    started: AtomicBool,
    release_after_reads: u32,
    reads_since_stop: AtomicU32,
    stopped: AtomicBool,
}

impl StubbornService {
    fn new(port: u16, release_after_reads: u32) -> Self {
        Self {
            port,
            started: AtomicBool::new(false),
            release_after_reads,
            reads_since_stop: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ServiceControl for StubbornService {
    async fn stop(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_running(&self) -> Result<bool> {
        Ok(self.started.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl SocketTable for StubbornService {
    async fn listening_ports(&self) -> Result<Vec<u16>> {
        if self.started.load(Ordering::SeqCst) {
            return Ok(vec![self.port]);
        }
        if self.stopped.load(Ordering::SeqCst) {
            let reads = self.reads_since_stop.fetch_add(1, Ordering::SeqCst) + 1;
            if reads > self.release_after_reads {
                return Ok(vec![]);
            }
        }
        Ok(vec![self.port])
    }
}

fn settings(port: u16, health_url: String) -> RestartSettings {
    RestartSettings {
        port,
        health_url,
        interval: Duration::from_millis(10),
        stop_attempts: 5,
        start_timeout: Duration::from_secs(2),
        http_timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn test_restart_waits_for_release_then_health() {
    let server = MockServer::start_async().await;
    let health_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/job/test/config.xml");
            then.status(404);
        })
        .await;

    let service = Arc::new(StubbornService::new(8080, 2));
    let waiter = ReadinessWaiter::new(
        service.clone(),
        ReqwestProbe::new(Duration::from_secs(2)).unwrap(),
    );

    let report = restart(
        &service,
        &waiter,
        &settings(8080, server.url("/job/test/config.xml")),
        &Cancellation::never(),
    )
    .await
    .unwrap();

    assert!(report.stopped.satisfied());
    assert_eq!(report.stopped.attempts_used(), 3);
    assert!(report.started);
    assert!(report.is_operational());
    health_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_restart_continues_when_port_is_never_released() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200);
        })
        .await;

    let service = Arc::new(StubbornService::new(9090, u32::MAX));
    let waiter = ReadinessWaiter::new(
        service.clone(),
        ReqwestProbe::new(Duration::from_secs(2)).unwrap(),
    );

    let report = restart(
        &service,
        &waiter,
        &settings(9090, server.url("/")),
        &Cancellation::never(),
    )
    .await
    .unwrap();

    assert_eq!(report.stopped.status(), PollStatus::Exhausted);
    assert_eq!(report.stopped.attempts_used(), 5);
    assert!(report.started);
    assert!(report.is_operational());
}

#[tokio::test]
async fn test_cancelled_restart_does_not_start() {
    let service = Arc::new(StubbornService::new(7070, u32::MAX));
    let waiter = ReadinessWaiter::new(
        service.clone(),
        ReqwestProbe::new(Duration::from_secs(2)).unwrap(),
    );
    let (handle, cancel) = cancellation();
    let mut settings = settings(7070, "http://127.0.0.1:7070/".to_string());
    settings.interval = Duration::from_millis(100);
    settings.stop_attempts = 100;

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let report = restart(&service, &waiter, &settings, &cancel).await.unwrap();

    assert_eq!(report.stopped.status(), PollStatus::Cancelled);
    assert!(!report.started);
    assert!(!service.started.load(Ordering::SeqCst));
}
