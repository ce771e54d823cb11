//! # Menu Seeding
//!
//! Loads a restaurant's menu from a JSON document so a fresh deployment can
//! take orders without hand-written SQL. Items whose code already exists for
//! the tenant are left untouched, so the same file can be applied twice.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use serde_json::json;

use crate::error::ServiceError;
use crate::models::item_customization::CustomizationAction;
use crate::repositories::{MenuItemRepository, NewCustomization, NewMenuItem, TenantRepository};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSeed {
    pub tenant_code: String,
    pub items: Vec<SeedItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedItem {
    pub item_code: String,
    pub name: String,
    pub price: Decimal,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub customizations: Vec<SeedCustomization>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCustomization {
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
    pub action: CustomizationAction,
}

/// What one seed run changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
}

impl MenuSeed {
    /// Reads and parses a seed document.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn validate(&self) -> Result<(), ServiceError> {
        let mut codes = HashSet::new();
        for (index, item) in self.items.iter().enumerate() {
            let field = |name: &str| format!("items[{index}].{name}");
            if item.item_code.trim().is_empty() {
                return Err(ServiceError::validation_with(
                    "item code is required",
                    json!({ field("itemCode"): "required" }),
                ));
            }
            if !codes.insert(item.item_code.trim()) {
                return Err(ServiceError::validation_with(
                    format!("item code '{}' appears twice", item.item_code.trim()),
                    json!({ field("itemCode"): "duplicate" }),
                ));
            }
            if item.name.trim().is_empty() || item.category.trim().is_empty() {
                return Err(ServiceError::validation_with(
                    "item name and category are required",
                    json!({ field("name"): "required" }),
                ));
            }
            if item.price.is_sign_negative() && !item.price.is_zero() {
                return Err(ServiceError::validation_with(
                    format!("price of '{}' must not be negative", item.name.trim()),
                    json!({ field("price"): "negative" }),
                ));
            }
        }
        Ok(())
    }
}

/// Inserts the seed's items for its tenant in one transaction.
pub async fn seed_menu(db: &DatabaseConnection, seed: &MenuSeed) -> Result<SeedReport, ServiceError> {
    seed.validate()?;

    let tenant = TenantRepository::new(db)
        .find_by_public_code(seed.tenant_code.trim(), false)
        .await
        .map_err(|err| ServiceError::from_db("load tenant", err))?
        .ok_or_else(|| ServiceError::not_found("Tenant not found"))?;

    let txn = db
        .begin()
        .await
        .map_err(|err| ServiceError::from_db("begin seed transaction", err))?;
    let repo = MenuItemRepository::new(&txn);
    let mut report = SeedReport::default();

    for item in &seed.items {
        let code = item.item_code.trim();
        let existing = repo
            .find_by_code(tenant.id, code)
            .await
            .map_err(|err| ServiceError::from_db("look up menu item", err))?;
        if existing.is_some() {
            tracing::debug!(tenant_id = %tenant.id, item_code = code, "Menu item already present");
            report.skipped += 1;
            continue;
        }

        let created = repo
            .create(
                tenant.id,
                NewMenuItem {
                    item_code: code.to_string(),
                    name: item.name.trim().to_string(),
                    price: item.price,
                    description: item.description.clone(),
                    category: item.category.trim().to_string(),
                },
            )
            .await
            .map_err(|err| ServiceError::from_db("insert menu item", err))?;

        for option in &item.customizations {
            repo.add_customization(
                created.id,
                NewCustomization {
                    name: option.name.trim().to_string(),
                    price: option.price,
                    action: option.action,
                },
            )
            .await
            .map_err(|err| ServiceError::from_db("insert customization", err))?;
        }
        report.created += 1;
    }

    txn.commit()
        .await
        .map_err(|err| ServiceError::from_db("commit menu seed", err))?;

    tracing::info!(
        tenant_id = %tenant.id,
        created = report.created,
        skipped = report.skipped,
        "Menu seeded"
    );
    Ok(report)
}
