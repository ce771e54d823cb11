//! Order line entity model
//!
//! Name, unit price and customizations are copied by value when the order is
//! placed and never rewritten.

use rust_decimal::Decimal;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub order_id: Uuid,

    /// Referenced menu item; its live values are not read back for display
    pub item_id: Uuid,

    /// Zero-based position in the submitted cart
    pub position: i32,

    pub quantity: i32,

    /// Array of customization snapshots (id, name, price, action)
    #[sea_orm(column_type = "JsonBinary")]
    pub customizations: JsonValue,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub subtotal: Decimal,

    pub item_name_snapshot: String,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub item_price_snapshot: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
