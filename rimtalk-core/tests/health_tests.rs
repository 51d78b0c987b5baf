//! Background health loop behaviour

use rimtalk_core::config::ClientConfig;
use rimtalk_core::health::{HealthMonitor, ProbeOutcome};
use rimtalk_core::{CancellationToken, ChatClient};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn health_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer, interval: Duration) -> ClientConfig {
    ClientConfig::new("p2-test-key")
        .with_base_url(server.uri())
        .with_health_interval(interval)
}

#[tokio::test]
async fn test_probe_reports_outcome() {
    let healthy = health_server(200).await;
    let monitor = HealthMonitor::new(&config_for(&healthy, Duration::from_secs(60))).unwrap();
    assert_eq!(monitor.probe().await, ProbeOutcome::Healthy);

    let failing = health_server(503).await;
    let monitor = HealthMonitor::new(&config_for(&failing, Duration::from_secs(60))).unwrap();
    assert_eq!(monitor.probe().await, ProbeOutcome::Unhealthy { status: 503 });
    assert!(monitor.state().last_probed().is_some());
}

#[tokio::test]
async fn test_loop_waits_an_interval_then_probes_periodically() {
    let server = health_server(200).await;
    let monitor = Arc::new(
        HealthMonitor::new(&config_for(&server, Duration::from_millis(100))).unwrap(),
    );

    let handle = monitor.start(&CancellationToken::new()).expect("loop starts");
    assert!(monitor.state().is_active());
    assert_eq!(monitor.probes_sent(), 0);

    tokio::time::sleep(Duration::from_millis(450)).await;
    let sent = monitor.probes_sent();
    assert!(sent >= 2, "expected periodic probes, got {}", sent);

    handle.stop();
    assert!(!monitor.state().is_active());
    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .expect("loop exits after stop");

    let after_stop = monitor.probes_sent();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(monitor.probes_sent(), after_stop);
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let server = health_server(200).await;
    let monitor = Arc::new(
        HealthMonitor::new(&config_for(&server, Duration::from_secs(60))).unwrap(),
    );
    let session = CancellationToken::new();

    let handle = monitor.start(&session).expect("first start");
    assert!(monitor.start(&session).is_none());

    handle.stop();
    handle.join().await;
    assert!(monitor.start(&session).is_some());
}

#[tokio::test]
async fn test_session_end_stops_loop() {
    let server = health_server(200).await;
    let monitor = Arc::new(
        HealthMonitor::new(&config_for(&server, Duration::from_millis(50))).unwrap(),
    );
    let session = CancellationToken::new();

    let handle = monitor.start(&session).expect("loop starts");
    session.cancel();

    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .expect("loop exits when the session ends");
    assert!(!monitor.state().is_active());
}

#[tokio::test]
async fn test_client_monitoring_is_idempotent() {
    let server = health_server(200).await;
    let client = ChatClient::new(config_for(&server, Duration::from_secs(60))).unwrap();
    let session = CancellationToken::new();

    assert!(client.start_monitoring(&session));
    assert!(!client.start_monitoring(&session));
    assert!(client.health().state().is_active());

    client.stop_monitoring();
    assert!(!client.health().state().is_active());
}

#[tokio::test]
async fn test_clients_have_independent_health_state() {
    let server = health_server(200).await;
    let first = ChatClient::new(config_for(&server, Duration::from_secs(60))).unwrap();
    let second = ChatClient::new(config_for(&server, Duration::from_secs(60))).unwrap();

    first.health().probe().await;
    assert!(first.health().state().last_probed().is_some());
    assert!(second.health().state().last_probed().is_none());
}
