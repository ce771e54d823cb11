//! Menu item entity model
//!
//! Items are never hard-deleted once referenced by an order; `active` and
//! `hidden` govern whether they can be sold and whether customers see them.

use rust_decimal::Decimal;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "menu_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Tenant-scoped short code shown on menus
    pub item_code: String,

    pub name: String,

    /// Unit price, never negative
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,

    pub description: Option<String>,

    pub category: String,

    /// Whether the item can currently be ordered
    pub active: bool,

    /// Whether the item is hidden from the public menu
    pub hidden: bool,

    pub created_at: DateTimeWithTimeZone,

    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenant::Entity",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
    #[sea_orm(has_many = "super::item_customization::Entity")]
    Customizations,
}

impl Related<super::tenant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::item_customization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customizations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
