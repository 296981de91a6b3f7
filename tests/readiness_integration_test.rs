use ci_warden::adapters::http::ReqwestProbe;
use ci_warden::adapters::socket_table::SystemSocketTable;
use ci_warden::{Cancellation, PollStatus, ReadinessCheck, ReadinessWaiter, WardenError};
use httpmock::prelude::*;
use std::time::Duration;
use tokio_test::assert_ok;

fn waiter() -> ReadinessWaiter<SystemSocketTable, ReqwestProbe> {
    ReadinessWaiter::new(
        SystemSocketTable::detect(),
        ReqwestProbe::new(Duration::from_secs(2)).unwrap(),
    )
}

#[tokio::test]
async fn test_http_not_found_counts_as_ready() {
    let server = MockServer::start_async().await;
    let config_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/job/test/config.xml");
            then.status(404);
        })
        .await;

    let check = ReadinessCheck::http_healthy(
        server.url("/job/test/config.xml"),
        Duration::from_millis(20),
        Duration::from_secs(5),
    )
    .unwrap();
    let outcome = waiter()
        .wait_for(&check, &Cancellation::never())
        .await
        .unwrap();

    assert_eq!(outcome.status(), PollStatus::Satisfied);
    assert_eq!(outcome.attempts_used(), 1);
    config_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_http_ok_is_ready() {
    let server = MockServer::start_async().await;
    let login_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/login");
            then.status(200).body("<html>login</html>");
        })
        .await;

    let check = ReadinessCheck::http_healthy(
        server.url("/login"),
        Duration::from_millis(20),
        Duration::from_secs(5),
    )
    .unwrap();
    let outcome = assert_ok!(waiter().wait_for(&check, &Cancellation::never()).await);

    assert!(outcome.satisfied());
    login_mock.assert_async().await;
}

#[tokio::test]
async fn test_http_server_error_exhausts_deadline() {
    let server = MockServer::start_async().await;
    let unavailable_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(503);
        })
        .await;

    let check = ReadinessCheck::http_healthy(
        server.url("/"),
        Duration::from_millis(30),
        Duration::from_millis(200),
    )
    .unwrap();
    let outcome = waiter()
        .wait_for(&check, &Cancellation::never())
        .await
        .unwrap();

    assert_eq!(outcome.status(), PollStatus::Exhausted);
    assert!(outcome.attempts_used() >= 2);
    assert!(outcome.last_observed_error().unwrap().contains("503"));
    assert!(unavailable_mock.hits_async().await >= 2);
}

#[tokio::test]
async fn test_connection_refused_is_retried_until_deadline() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let check = ReadinessCheck::http_healthy(
        format!("http://127.0.0.1:{}/", port),
        Duration::from_millis(30),
        Duration::from_millis(150),
    )
    .unwrap();
    let outcome = waiter()
        .wait_for(&check, &Cancellation::never())
        .await
        .unwrap();

    assert_eq!(outcome.status(), PollStatus::Exhausted);
    assert!(outcome.attempts_used() >= 2);
    assert!(outcome.last_observed_error().is_some());
}

#[tokio::test]
async fn test_malformed_url_fails_before_any_request() {
    let check = ReadinessCheck::http_healthy(
        "http//missing-colon",
        Duration::from_millis(20),
        Duration::from_secs(5),
    )
    .unwrap();
    let err = waiter()
        .wait_for(&check, &Cancellation::never())
        .await
        .unwrap_err();

    assert!(matches!(err, WardenError::InvalidCheckError { .. }));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_real_listener_is_seen_then_released() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let waiter = waiter();

    let listening =
        ReadinessCheck::port_listening(port, Duration::from_millis(20), Duration::from_secs(2))
            .unwrap();
    let outcome = waiter
        .wait_for(&listening, &Cancellation::never())
        .await
        .unwrap();
    assert!(outcome.satisfied());
    assert_eq!(outcome.attempts_used(), 1);

    let still_bound = ReadinessCheck::port_free(port, Duration::from_millis(10), 2);
    let outcome = waiter
        .wait_for(&still_bound, &Cancellation::never())
        .await
        .unwrap();
    assert_eq!(outcome.status(), PollStatus::Exhausted);

    drop(listener);

    let released = ReadinessCheck::port_free(port, Duration::from_millis(20), 50);
    let outcome = waiter
        .wait_for(&released, &Cancellation::never())
        .await
        .unwrap();
    assert!(outcome.satisfied());
}
