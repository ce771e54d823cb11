//! # Menu Item Handlers
//!
//! Staff-side catalogue listing and availability toggles. Items are never
//! deleted from here because past orders keep referencing them.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::auth::{Principal, Role};
use crate::db::with_deadline;
use crate::error::{ApiError, ServiceError};
use crate::handlers::menu::{MenuCustomizationView, categories_of, customizations_by_item};
use crate::pricing::to_money;
use crate::repositories::MenuItemRepository;
use crate::server::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityUpdate {
    /// Whether the item can be ordered
    pub active: Option<bool>,
    /// Whether the item is hidden from the public menu
    pub hidden: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemAvailability {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub hidden: bool,
}

/// Full catalogue of a restaurant as staff see it.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemCatalog {
    pub categories: Vec<String>,
    pub items: Vec<CatalogItem>,
    pub inactive_count: usize,
    pub hidden_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: Uuid,
    pub item_code: String,
    pub name: String,
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
    pub description: Option<String>,
    pub category: String,
    pub active: bool,
    pub hidden: bool,
    pub customizations: Vec<MenuCustomizationView>,
}

/// List every menu item of the caller's restaurant, hidden and inactive ones included
#[utoipa::path(
    get,
    path = "/api/v1/items",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All live menu items", body = ItemCatalog),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Role may not view the catalogue", body = ApiError)
    ),
    tag = "menu"
)]
pub async fn list_items(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ItemCatalog>, ApiError> {
    let tenant_id = principal.tenant_scope(&[Role::Owner, Role::Staff])?;

    let (items, customizations) = with_deadline(state.config.request_timeout(), "list items", async {
        let repo = MenuItemRepository::new(&state.db);
        let items = repo
            .list(tenant_id, true)
            .await
            .map_err(|err| ServiceError::from_db("list items", err))?;
        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let customizations = repo
            .customizations_for(&ids)
            .await
            .map_err(|err| ServiceError::from_db("load customizations", err))?;
        Ok((items, customizations))
    })
    .await?;

    let mut by_item = customizations_by_item(customizations);
    let categories = categories_of(&items);
    let inactive_count = items.iter().filter(|item| !item.active).count();
    let hidden_count = items.iter().filter(|item| item.hidden).count();

    let items = items
        .into_iter()
        .map(|item| CatalogItem {
            customizations: by_item.remove(&item.id).unwrap_or_default(),
            id: item.id,
            item_code: item.item_code,
            name: item.name,
            price: to_money(item.price),
            description: item.description,
            category: item.category,
            active: item.active,
            hidden: item.hidden,
        })
        .collect();

    Ok(Json(ItemCatalog {
        categories,
        items,
        inactive_count,
        hidden_count,
    }))
}

/// Switch a menu item on or off, or hide it
#[utoipa::path(
    patch,
    path = "/api/v1/items/{id}/availability",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Menu item id")),
    request_body = AvailabilityUpdate,
    responses(
        (status = 200, description = "Updated availability", body = ItemAvailability),
        (status = 400, description = "Nothing to update", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Role may not edit the menu", body = ApiError),
        (status = 404, description = "No such item for this restaurant", body = ApiError)
    ),
    tag = "menu"
)]
pub async fn update_availability(
    State(state): State<AppState>,
    principal: Principal,
    Path(item_id): Path<Uuid>,
    payload: Result<Json<AvailabilityUpdate>, JsonRejection>,
) -> Result<Json<ItemAvailability>, ApiError> {
    let Json(update) = payload?;
    let tenant_id = principal.tenant_scope(&[Role::Owner, Role::Staff])?;

    if update.active.is_none() && update.hidden.is_none() {
        return Err(ServiceError::validation("Provide `active` and/or `hidden`").into());
    }

    let item = with_deadline(state.config.request_timeout(), "update item availability", async {
        MenuItemRepository::new(&state.db)
            .set_availability(tenant_id, item_id, update.active, update.hidden)
            .await
            .map_err(|err| ServiceError::from_db("update item availability", err))?
            .ok_or_else(|| ServiceError::not_found("Menu item not found"))
    })
    .await?;

    tracing::info!(
        tenant_id = %tenant_id,
        item_id = %item.id,
        active = item.active,
        hidden = item.hidden,
        "Menu item availability changed"
    );
    state
        .audit
        .record(
            &principal,
            AuditAction::ItemAvailabilityChanged,
            Some(item.id),
            json!({ "active": item.active, "hidden": item.hidden }),
        )
        .await;

    Ok(Json(ItemAvailability {
        id: item.id,
        name: item.name,
        active: item.active,
        hidden: item.hidden,
    }))
}
