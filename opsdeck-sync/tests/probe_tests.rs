use opsdeck_sync::BackendProbe;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn probe_for(server: &MockServer) -> BackendProbe {
    BackendProbe::new(
        reqwest::Client::new(),
        format!("{}/health", server.uri()),
        Duration::from_millis(3_000),
    )
}

#[tokio::test]
async fn healthy_backend_settles_available() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let probe = probe_for(&server);
    assert!(!probe.is_available());
    assert!(probe.check().await);
    assert!(probe.is_available());
}

#[tokio::test]
async fn non_success_status_settles_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let probe = probe_for(&server);
    assert!(!probe.check().await);
    assert!(probe.is_unavailable());
}

#[tokio::test]
async fn network_error_settles_unavailable() {
    let probe = BackendProbe::new(
        reqwest::Client::new(),
        "http://127.0.0.1:1/health".to_string(),
        Duration::from_millis(3_000),
    );
    assert!(!probe.check().await);
    assert!(probe.is_unavailable());
}

#[tokio::test]
async fn verdict_is_memoized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let probe = probe_for(&server);
    assert!(probe.check().await);
    assert!(probe.check().await);
    assert!(probe.check().await);
    server.verify().await;
}

#[tokio::test]
async fn concurrent_callers_share_one_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let probe = Arc::new(probe_for(&server));
    let a = tokio::spawn({
        let probe = probe.clone();
        async move { probe.check().await }
    });
    let b = tokio::spawn({
        let probe = probe.clone();
        async move { probe.check().await }
    });
    assert!(a.await.unwrap());
    assert!(b.await.unwrap());
    server.verify().await;
}

#[tokio::test]
async fn mark_unavailable_overrides_without_probing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let probe = probe_for(&server);
    probe.mark_unavailable();
    assert!(!probe.check().await);
    assert!(probe.is_unavailable());
    server.verify().await;
}

#[tokio::test]
async fn reset_allows_a_fresh_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let probe = probe_for(&server);
    probe.mark_unavailable();
    assert!(!probe.check().await);

    probe.reset();
    assert!(probe.check().await);
    server.verify().await;
}
