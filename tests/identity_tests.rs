// ModeRouter tests: push key determinism, tenancy, pull relay and failures

mod common;

use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::get};
use hostwatch::identity::{IdentityKey, IngestError, ModeRouter, QueryError};
use hostwatch::models::{DeliveryMode, NewSystem, TenantId};
use hostwatch::pull_client::PullClient;
use hostwatch::store::MetricStore;
use hostwatch::systems_repo::SystemsRepo;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const OWNER: TenantId = TenantId(0);

async fn setup(timeout: Duration) -> (TempDir, ModeRouter) {
    let (dir, pool) = common::temp_pool().await;
    let systems = SystemsRepo::new(pool);
    systems.init().await.unwrap();
    let router = ModeRouter::new(
        Arc::new(MetricStore::new()),
        systems,
        PullClient::new(timeout).unwrap(),
        Some("hub-key".into()),
    );
    (dir, router)
}

async fn add(router: &ModeRouter, owner: TenantId, name: &str, url: &str, key: &str) -> i64 {
    router
        .systems()
        .add(
            owner,
            &NewSystem {
                name: name.into(),
                mode: DeliveryMode::parse(url).unwrap(),
                api_key: key.into(),
            },
        )
        .await
        .unwrap()
        .id
}

/// Serve `app` on an ephemeral port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn push_then_query_returns_exact_snapshot() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    let id = add(&router, OWNER, "h1", "push", "k1").await;

    let snap = common::snapshot("h1");
    let body = serde_json::to_vec(&snap).unwrap();
    let key = router.ingest("k1", &body).await.unwrap();
    assert_eq!(key, IdentityKey::for_push("k1", "h1"));

    let got = router.query(OWNER, id).await.unwrap();
    assert_eq!(got.host_info, snap.host_info);
    assert_eq!(got.cpu, snap.cpu);
    assert_eq!(got.memory, snap.memory);
}

#[tokio::test]
async fn different_secret_hostname_pair_is_no_data_yet() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    add(&router, OWNER, "h1", "push", "k1").await;
    let other = add(&router, OWNER, "h2", "dynamic", "k1").await;

    let body = serde_json::to_vec(&common::snapshot("h1")).unwrap();
    router.ingest("k1", &body).await.unwrap();

    let err = router.query(OWNER, other).await.unwrap_err();
    assert!(matches!(err, QueryError::NoDataYet), "got {err:?}");
}

#[tokio::test]
async fn snapshot_without_hostname_is_found_via_legacy_key() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    let id = add(&router, OWNER, "any-name", "push", "k9").await;

    let body = serde_json::to_vec(&common::snapshot("")).unwrap();
    let key = router.ingest("k9", &body).await.unwrap();
    assert_eq!(key, IdentityKey::legacy("k9"));
    assert!(router.query(OWNER, id).await.is_ok());
}

#[tokio::test]
async fn padded_registration_secret_matches_trimmed_push() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    let id = add(&router, OWNER, " h1 ", "push", " k1\t").await;

    let stored = router.systems().get(id).await.unwrap().unwrap();
    assert_eq!(stored.api_key, "k1");
    assert_eq!(stored.name, "h1");

    let body = serde_json::to_vec(&common::snapshot("h1")).unwrap();
    let key = router.ingest(" k1", &body).await.unwrap();
    assert_eq!(key, IdentityKey::for_push("k1", "h1"));

    let got = router.query(OWNER, id).await.unwrap();
    assert_eq!(got.hostname(), "h1");
}

#[tokio::test]
async fn query_before_any_push_is_no_data_yet() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    let id = add(&router, OWNER, "h1", "push", "k1").await;
    assert!(matches!(
        router.query(OWNER, id).await,
        Err(QueryError::NoDataYet)
    ));
}

#[tokio::test]
async fn other_tenants_system_is_not_found() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    let id = add(&router, TenantId(7), "h1", "push", "k1").await;
    let body = serde_json::to_vec(&common::snapshot("h1")).unwrap();
    router.ingest("k1", &body).await.unwrap();

    assert!(matches!(
        router.query(OWNER, id).await,
        Err(QueryError::NotFound)
    ));
    assert!(matches!(
        router.query(OWNER, 9_999).await,
        Err(QueryError::NotFound)
    ));
}

#[tokio::test]
async fn ingest_rejects_unknown_and_empty_credentials() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    add(&router, OWNER, "h1", "push", "k1").await;
    let body = serde_json::to_vec(&common::snapshot("h1")).unwrap();

    assert!(matches!(
        router.ingest("wrong", &body).await,
        Err(IngestError::UnknownCredential)
    ));
    assert!(matches!(
        router.ingest("  ", &body).await,
        Err(IngestError::EmptyCredential)
    ));
    assert!(router.store().is_empty().await);
}

#[tokio::test]
async fn pull_mode_secret_does_not_authorize_pushes() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    add(&router, OWNER, "h1", "http://10.0.0.1:8080", "pull-secret").await;
    let body = serde_json::to_vec(&common::snapshot("h1")).unwrap();
    assert!(matches!(
        router.ingest("pull-secret", &body).await,
        Err(IngestError::UnknownCredential)
    ));
}

#[tokio::test]
async fn hub_key_authorizes_pushes() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    let body = serde_json::to_vec(&common::snapshot("self")).unwrap();
    router.ingest("hub-key", &body).await.unwrap();
    assert_eq!(router.store().len().await, 1);
}

#[tokio::test]
async fn malformed_body_is_rejected_without_touching_store() {
    let (_dir, router) = setup(Duration::from_secs(1)).await;
    add(&router, OWNER, "h1", "push", "k1").await;
    assert!(matches!(
        router.ingest("k1", b"{not json").await,
        Err(IngestError::Malformed(_))
    ));
    assert!(matches!(
        router.ingest("k1", br#"{"cpu_total": "high"}"#).await,
        Err(IngestError::Malformed(_))
    ));
    assert!(router.store().is_empty().await);
}

#[tokio::test]
async fn pull_mode_relays_remote_snapshot_with_bearer() {
    let (_dir, router) = setup(Duration::from_secs(2)).await;
    let agent = Router::new().route(
        "/api/v1/metrics",
        get(|headers: HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if auth != "Bearer agent-secret" {
                return Err(StatusCode::UNAUTHORIZED);
            }
            Ok(Json(common::snapshot("remote-host")))
        }),
    );
    let base = serve(agent).await;
    let id = add(&router, OWNER, "remote", &base, "agent-secret").await;

    let got = router.query(OWNER, id).await.unwrap();
    assert_eq!(got.hostname(), "remote-host");
    assert!(router.store().is_empty().await, "pulled snapshots are not stored");
}

#[tokio::test]
async fn pull_mode_remote_401_becomes_upstream_error() {
    let (_dir, router) = setup(Duration::from_secs(2)).await;
    let agent = Router::new().route(
        "/api/v1/metrics",
        get(|| async { StatusCode::UNAUTHORIZED }),
    );
    let base = serve(agent).await;
    let id = add(&router, OWNER, "remote", &base, "stale-secret").await;

    match router.query(OWNER, id).await {
        Err(QueryError::Upstream { status }) => assert_eq!(status, 401),
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn pull_mode_invalid_body_is_invalid_payload() {
    let (_dir, router) = setup(Duration::from_secs(2)).await;
    let agent = Router::new().route("/api/v1/metrics", get(|| async { "not a snapshot" }));
    let base = serve(agent).await;
    let id = add(&router, OWNER, "remote", &base, "k").await;
    assert!(matches!(
        router.query(OWNER, id).await,
        Err(QueryError::InvalidPayload(_))
    ));
}

#[tokio::test]
async fn pull_mode_silent_agent_fails_within_timeout() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((sock, _)) = listener.accept().await {
            held.push(sock);
        }
    });

    let (_dir, router) = setup(Duration::from_millis(400)).await;
    let id = add(&router, OWNER, "silent", &format!("http://{addr}"), "k").await;

    let started = Instant::now();
    let result = tokio::time::timeout(Duration::from_secs(5), router.query(OWNER, id))
        .await
        .expect("query must not hang");
    hold.abort();

    assert!(matches!(result, Err(QueryError::Unreachable(_))));
    assert!(started.elapsed() < Duration::from_secs(3));
}
