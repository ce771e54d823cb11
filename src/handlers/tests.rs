//! # Tests for Handlers

use axum::{extract::State, http::StatusCode, response::Json};

use crate::config::AppConfig;
use crate::handlers::{health, root};
use crate::server::AppState;

#[tokio::test]
async fn root_reports_service_name_and_version() {
    let Json(info) = root().await;

    assert_eq!(info.service, "tableside");
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn root_serializes_expected_fields() {
    let Json(info) = root().await;
    let json = serde_json::to_value(&info).unwrap();

    assert!(json.get("service").is_some());
    assert!(json.get("version").is_some());
}

#[tokio::test]
async fn health_is_ok_with_sqlite() {
    let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
    let state = AppState::new(AppConfig::default(), db);

    let (status, Json(body)) = health(State(state)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.database, "up");
}
