//! Audit log entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Option<Uuid>,

    /// owner, staff or admin
    pub actor_role: String,

    /// Principal subject
    pub actor_id: String,

    /// e.g. `order.status_changed`, `table.restored`
    pub action: String,

    pub entity_type: String,

    pub entity_id: Option<Uuid>,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub details: Option<JsonValue>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
