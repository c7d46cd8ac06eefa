//! Liveness and readiness probes.
//!
//! These tests require a running API server (cargo run -p copperbay-api).

use copperbay_integration_tests::{base_url, client};
use reqwest::StatusCode;

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_health_returns_ok() {
    let resp = client()
        .get(format!("{}/health", base_url()))
        .send()
        .await
        .expect("health request failed");

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("health body"), "ok");
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_readiness_reflects_store() {
    let resp = client()
        .get(format!("{}/health/ready", base_url()))
        .send()
        .await
        .expect("readiness request failed");

    // OK when the store answers, 503 when it does not; anything else is a bug.
    assert!(
        resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected readiness status: {}",
        resp.status()
    );
}
