//! Test utilities shared by the integration suites.
//!
//! Every suite gets its own in-memory SQLite database with all migrations
//! applied. Foreign keys stay enforced, so fixtures create real tenant, menu
//! and table rows.

#![allow(dead_code)]

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use tableside::auth::{JwtKeys, Principal, Role};
use tableside::config::AppConfig;
use tableside::models::{item_customization::CustomizationAction, menu_item, table_identity, tenant};
use tableside::orders::CreateOrderRequest;
use tableside::pricing::{LineRequest, SelectedCustomization};
use tableside::repositories::{
    MenuItemRepository, NewCustomization, NewMenuItem, TableIdentityRepository, TenantRepository,
};
use tableside::server::{AppState, create_app};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Config tuned for tests: fast feed polling, default everything else.
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        feed_poll_interval_ms: 50,
        public_base_url: "https://order.example.com".to_string(),
        ..AppConfig::default()
    }
}

pub fn test_state(db: DatabaseConnection) -> AppState {
    AppState::new(test_config(), db)
}

/// Router plus the state behind it, so tests can call services directly too.
pub fn build_app(db: DatabaseConnection) -> (Router, AppState) {
    let state = test_state(db);
    (create_app(state.clone()), state)
}

pub async fn create_tenant(db: &DatabaseConnection, code: &str, name: &str) -> Result<tenant::Model> {
    Ok(TenantRepository::new(db).create(code, name).await?)
}

pub async fn create_item(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    code: &str,
    name: &str,
    price: Decimal,
    category: &str,
) -> Result<menu_item::Model> {
    let item = MenuItemRepository::new(db)
        .create(
            tenant_id,
            NewMenuItem {
                item_code: code.to_string(),
                name: name.to_string(),
                price,
                description: None,
                category: category.to_string(),
            },
        )
        .await?;
    Ok(item)
}

pub async fn add_customization(
    db: &DatabaseConnection,
    item_id: Uuid,
    name: &str,
    price: Decimal,
    action: CustomizationAction,
) -> Result<Uuid> {
    let customization = MenuItemRepository::new(db)
        .add_customization(
            item_id,
            NewCustomization {
                name: name.to_string(),
                price,
                action,
            },
        )
        .await?;
    Ok(customization.id)
}

pub async fn create_table(
    db: &DatabaseConnection,
    tenant_id: Uuid,
    identifier: &str,
) -> Result<table_identity::Model> {
    Ok(TableIdentityRepository::new(db)
        .insert(tenant_id, identifier)
        .await?)
}

pub fn principal(role: Role, tenant_id: Uuid) -> Principal {
    Principal {
        subject: format!("{}-user", role.as_str()),
        role,
        tenant_id: Some(tenant_id),
    }
}

/// Bearer token signed with the key the test app verifies against.
pub fn token(role: Role, tenant_id: Option<Uuid>) -> String {
    let keys = JwtKeys::from_secret(test_config().jwt_secret_or_dev().as_bytes());
    keys.issue("test-user", role, tenant_id, chrono::Duration::hours(1))
        .expect("token issues")
}

pub fn line(item_id: Uuid, quantity: i64) -> LineRequest {
    LineRequest {
        item_id,
        quantity,
        customizations: Vec::new(),
    }
}

pub fn line_with(item_id: Uuid, quantity: i64, customization_ids: &[Uuid]) -> LineRequest {
    LineRequest {
        item_id,
        quantity,
        customizations: customization_ids
            .iter()
            .map(|id| SelectedCustomization {
                id: *id,
                price: None,
                action: None,
            })
            .collect(),
    }
}

pub fn order_request(tenant_code: &str, table: &str, items: Vec<LineRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        tenant_code: tenant_code.to_string(),
        table_identifier: table.to_string(),
        items,
        note: None,
    }
}

/// Restaurant "1234" with table A1 and a 10.00 burger.
pub struct Fixture {
    pub db: DatabaseConnection,
    pub tenant: tenant::Model,
    pub table: table_identity::Model,
    pub burger: menu_item::Model,
}

pub async fn seeded() -> Result<Fixture> {
    let db = setup_test_db().await?;
    let tenant = create_tenant(&db, "1234", "Corner Bistro").await?;
    let table = create_table(&db, tenant.id, "A1").await?;
    let burger = create_item(&db, tenant.id, "B01", "Burger", Decimal::new(1000, 2), "Mains").await?;
    Ok(Fixture {
        db,
        tenant,
        table,
        burger,
    })
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("router is infallible")
}

pub fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
