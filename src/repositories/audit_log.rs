//! # Audit Log Repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::models::audit_log::{ActiveModel as AuditLogActiveModel, Column, Entity as AuditLog, Model};

/// One audit entry to be written.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub tenant_id: Option<Uuid>,
    pub actor_role: String,
    pub actor_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: Option<serde_json::Value>,
}

pub struct AuditLogRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> AuditLogRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn insert(&self, entry: NewAuditEntry) -> Result<Model, DbErr> {
        AuditLogActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(entry.tenant_id),
            actor_role: Set(entry.actor_role),
            actor_id: Set(entry.actor_id),
            action: Set(entry.action),
            entity_type: Set(entry.entity_type),
            entity_id: Set(entry.entity_id),
            details: Set(entry.details),
            created_at: Set(Utc::now().into()),
        }
        .insert(self.db)
        .await
    }

    /// Entries recorded for one entity, oldest first.
    pub async fn for_entity(&self, entity_id: Uuid) -> Result<Vec<Model>, DbErr> {
        AuditLog::find()
            .filter(Column::EntityId.eq(entity_id))
            .order_by_asc(Column::CreatedAt)
            .all(self.db)
            .await
    }
}
