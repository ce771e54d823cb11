//! # Repository Layer
//!
//! Repositories encapsulate SeaORM operations per table. Each is generic over
//! [`sea_orm::ConnectionTrait`] so services can run them on the pool or inside
//! a transaction. Soft-deletable entities take an explicit `include_deleted` flag.

pub mod audit_log;
pub mod menu_item;
pub mod order;
pub mod table_identity;
pub mod tenant;

pub use audit_log::{AuditLogRepository, NewAuditEntry};
pub use menu_item::{MenuItemRepository, NewCustomization, NewMenuItem};
pub use order::{OrderListFilter, OrderRepository};
pub use table_identity::TableIdentityRepository;
pub use tenant::TenantRepository;
