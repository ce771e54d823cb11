//! Item customization entity model
//!
//! A customization is an option owned by a menu item. Its `action` decides how
//! it may be selected; see [`CustomizationAction`].

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "item_customizations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Menu item that owns this option
    pub item_id: Uuid,

    pub name: String,

    /// Per-unit price delta; may be negative
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,

    /// One of ADD, REMOVE, CHANGE, CHOOSE
    pub action: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::menu_item::Entity",
        from = "Column::ItemId",
        to = "super::menu_item::Column::Id"
    )]
    MenuItem,
}

impl Related<super::menu_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MenuItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// How a customization may be selected on an order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomizationAction {
    /// Multi-select, additive
    Add,
    /// Multi-select, usually free or a discount
    Remove,
    /// Single-select, required when the item offers any
    Change,
    /// Single-select, optional
    Choose,
}

impl CustomizationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomizationAction::Add => "ADD",
            CustomizationAction::Remove => "REMOVE",
            CustomizationAction::Change => "CHANGE",
            CustomizationAction::Choose => "CHOOSE",
        }
    }

    /// Whether at most one option of this kind may be picked per line.
    pub fn is_single_select(&self) -> bool {
        matches!(self, CustomizationAction::Change | CustomizationAction::Choose)
    }
}

impl fmt::Display for CustomizationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomizationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD" => Ok(CustomizationAction::Add),
            "REMOVE" => Ok(CustomizationAction::Remove),
            "CHANGE" => Ok(CustomizationAction::Change),
            "CHOOSE" => Ok(CustomizationAction::Choose),
            other => Err(format!("unknown customization action '{other}'")),
        }
    }
}

impl Model {
    /// Parsed action; unknown stored values are reported to the caller.
    pub fn action_kind(&self) -> Result<CustomizationAction, String> {
        self.action.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_str() {
        for action in [
            CustomizationAction::Add,
            CustomizationAction::Remove,
            CustomizationAction::Change,
            CustomizationAction::Choose,
        ] {
            assert_eq!(action.as_str().parse::<CustomizationAction>(), Ok(action));
        }
        assert!("add".parse::<CustomizationAction>().is_err());
    }

    #[test]
    fn single_select_kinds() {
        assert!(CustomizationAction::Change.is_single_select());
        assert!(CustomizationAction::Choose.is_single_select());
        assert!(!CustomizationAction::Add.is_single_select());
        assert!(!CustomizationAction::Remove.is_single_select());
    }
}
