//! Order entity model
//!
//! Orders are a frozen financial record: `total` is fixed at creation and only
//! `status`, `updated_at` and `done_at` change afterwards.

use rust_decimal::Decimal;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    /// Table identity the order was placed from
    pub table_id: Uuid,

    /// Table label at order time
    pub table_identifier: String,

    /// Position of this order within the tenant's calendar day, starting at 1
    pub daily_sequence: i32,

    /// Calendar day the sequence belongs to
    pub sequence_date: Date,

    /// `{tenantCode}-{table}-{sequence:04}`
    pub display_code: String,

    /// One of NEW, PREPARING, READY, COMPLETED, CANCELLED
    pub status: String,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total: Decimal,

    pub customer_note: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    /// Set exactly once, when the order reaches COMPLETED
    pub done_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
    #[sea_orm(
        belongs_to = "super::table_identity::Entity",
        from = "Column::TableId",
        to = "super::table_identity::Column::Id"
    )]
    TableIdentity,
    #[sea_orm(has_many = "super::order_line::Entity")]
    Lines,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::table_identity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TableIdentity.def()
    }
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
