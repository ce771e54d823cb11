//! # Public Menu Handler

use std::collections::{BTreeSet, HashMap};

use axum::{
    extract::{Path, State},
    response::Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::with_deadline;
use crate::error::{ApiError, ServiceError};
use crate::models::item_customization::{self, CustomizationAction};
use crate::models::menu_item;
use crate::pricing::to_money;
use crate::repositories::{MenuItemRepository, TenantRepository};
use crate::server::AppState;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuResponse {
    pub tenant_code: String,
    pub tenant_name: String,
    /// Distinct categories of the listed items, sorted
    pub categories: Vec<String>,
    pub items: Vec<MenuItemView>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemView {
    pub id: Uuid,
    pub item_code: String,
    pub name: String,
    #[schema(value_type = String, example = "10.00")]
    pub price: Decimal,
    pub description: Option<String>,
    pub category: String,
    /// False while the item is switched off; it is shown but cannot be ordered
    pub available: bool,
    pub customizations: Vec<MenuCustomizationView>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MenuCustomizationView {
    pub id: Uuid,
    pub name: String,
    #[schema(value_type = String, example = "1.50")]
    pub price: Decimal,
    pub action: CustomizationAction,
}

/// Public menu of a restaurant
#[utoipa::path(
    get,
    path = "/api/v1/menu/{tenant_code}",
    params(("tenant_code" = String, Path, description = "Restaurant public code")),
    responses(
        (status = 200, description = "Visible menu items", body = MenuResponse),
        (status = 404, description = "Unknown restaurant", body = ApiError)
    ),
    tag = "menu"
)]
pub async fn get_menu(
    State(state): State<AppState>,
    Path(tenant_code): Path<String>,
) -> Result<Json<MenuResponse>, ApiError> {
    let menu = with_deadline(state.config.request_timeout(), "load menu", async {
        let tenant = TenantRepository::new(&state.db)
            .find_by_public_code(tenant_code.trim(), false)
            .await
            .map_err(|err| ServiceError::from_db("load tenant", err))?
            .ok_or_else(|| ServiceError::not_found("Tenant not found"))?;

        let repo = MenuItemRepository::new(&state.db);
        let items = repo
            .list(tenant.id, false)
            .await
            .map_err(|err| ServiceError::from_db("load menu", err))?;
        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let customizations = repo
            .customizations_for(&ids)
            .await
            .map_err(|err| ServiceError::from_db("load customizations", err))?;

        Ok(build_menu(tenant.public_code, tenant.name, items, customizations))
    })
    .await?;

    Ok(Json(menu))
}

/// Groups customization options by the item that owns them.
pub(crate) fn customizations_by_item(
    customizations: Vec<item_customization::Model>,
) -> HashMap<Uuid, Vec<MenuCustomizationView>> {
    let mut by_item: HashMap<Uuid, Vec<MenuCustomizationView>> = HashMap::new();
    for customization in customizations {
        // Rows with an unrecognised action cannot be ordered, so they are not offered.
        let action = match customization.action_kind() {
            Ok(action) => action,
            Err(err) => {
                tracing::warn!(customization_id = %customization.id, error = %err, "Skipping customization");
                continue;
            }
        };
        by_item
            .entry(customization.item_id)
            .or_default()
            .push(MenuCustomizationView {
                id: customization.id,
                name: customization.name,
                price: to_money(customization.price),
                action,
            });
    }
    by_item
}

/// Distinct categories of `items`, sorted.
pub(crate) fn categories_of(items: &[menu_item::Model]) -> Vec<String> {
    let categories: BTreeSet<&str> = items.iter().map(|item| item.category.as_str()).collect();
    categories.into_iter().map(str::to_string).collect()
}

fn build_menu(
    tenant_code: String,
    tenant_name: String,
    items: Vec<menu_item::Model>,
    customizations: Vec<item_customization::Model>,
) -> MenuResponse {
    let mut by_item = customizations_by_item(customizations);
    let categories = categories_of(&items);

    let items = items
        .into_iter()
        .map(|item| MenuItemView {
            customizations: by_item.remove(&item.id).unwrap_or_default(),
            id: item.id,
            item_code: item.item_code,
            name: item.name,
            price: to_money(item.price),
            description: item.description,
            category: item.category,
            available: item.active,
        })
        .collect();

    MenuResponse {
        tenant_code,
        tenant_name,
        categories,
        items,
    }
}
