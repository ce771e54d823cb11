//! Audit trail for privileged mutations.
//!
//! Entries are written after the mutation has committed. A failed audit write
//! is logged and counted but never fails the operation it describes.

use sea_orm::DatabaseConnection;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::Principal;
use crate::repositories::{AuditLogRepository, NewAuditEntry};

/// Audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    OrderStatusChanged,
    TableCreated,
    TableRestored,
    TableDeleted,
    ItemAvailabilityChanged,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::OrderStatusChanged => "order.status_changed",
            AuditAction::TableCreated => "table.created",
            AuditAction::TableRestored => "table.restored",
            AuditAction::TableDeleted => "table.deleted",
            AuditAction::ItemAvailabilityChanged => "menu_item.availability_changed",
        }
    }

    pub fn entity_type(&self) -> &'static str {
        match self {
            AuditAction::OrderStatusChanged => "order",
            AuditAction::TableCreated | AuditAction::TableRestored | AuditAction::TableDeleted => {
                "table_identity"
            }
            AuditAction::ItemAvailabilityChanged => "menu_item",
        }
    }
}

#[derive(Clone)]
pub struct AuditTrail {
    db: DatabaseConnection,
}

impl AuditTrail {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        principal: &Principal,
        action: AuditAction,
        entity_id: Option<Uuid>,
        details: Value,
    ) {
        let entry = NewAuditEntry {
            tenant_id: principal.tenant_id,
            actor_role: principal.role.as_str().to_string(),
            actor_id: principal.subject.clone(),
            action: action.as_str().to_string(),
            entity_type: action.entity_type().to_string(),
            entity_id,
            details: (!details.is_null()).then_some(details),
        };

        if let Err(err) = AuditLogRepository::new(&self.db).insert(entry).await {
            metrics::counter!("audit_write_failures_total", "action" => action.as_str())
                .increment(1);
            tracing::warn!(
                action = action.as_str(),
                entity_id = ?entity_id,
                error = %err,
                "Failed to write audit entry"
            );
        }
    }
}
