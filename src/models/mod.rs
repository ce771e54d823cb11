//! # Data Models
//!
//! This module contains all the data models used throughout the ordering service.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod audit_log;
pub mod item_customization;
pub mod menu_item;
pub mod order;
pub mod order_line;
pub mod table_identity;
pub mod tenant;

pub use audit_log::Entity as AuditLog;
pub use item_customization::Entity as ItemCustomization;
pub use menu_item::Entity as MenuItem;
pub use order::Entity as Order;
pub use order_line::Entity as OrderLine;
pub use table_identity::Entity as TableIdentity;
pub use tenant::Entity as Tenant;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "tableside".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
