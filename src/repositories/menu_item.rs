//! # Menu Item Repository
//!
//! Menu items are never purged while orders reference them, so this
//! repository only exposes creation and flag or detail updates.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::models::item_customization::{
    self, ActiveModel as CustomizationActiveModel, CustomizationAction,
    Entity as ItemCustomization,
};
use crate::models::menu_item::{self, ActiveModel as MenuItemActiveModel, Column, Entity as MenuItem};

/// Fields for a new menu item.
#[derive(Debug, Clone)]
pub struct NewMenuItem {
    pub item_code: String,
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub category: String,
}

/// Fields for a new customization option.
#[derive(Debug, Clone)]
pub struct NewCustomization {
    pub name: String,
    pub price: Decimal,
    pub action: CustomizationAction,
}

pub struct MenuItemRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> MenuItemRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn create(&self, tenant_id: Uuid, item: NewMenuItem) -> Result<menu_item::Model, DbErr> {
        MenuItemActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            item_code: Set(item.item_code),
            name: Set(item.name),
            price: Set(item.price),
            description: Set(item.description),
            category: Set(item.category),
            active: Set(true),
            hidden: Set(false),
            created_at: Set(Utc::now().into()),
            deleted_at: Set(None),
        }
        .insert(self.db)
        .await
    }

    pub async fn add_customization(
        &self,
        item_id: Uuid,
        customization: NewCustomization,
    ) -> Result<item_customization::Model, DbErr> {
        CustomizationActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item_id),
            name: Set(customization.name),
            price: Set(customization.price),
            action: Set(customization.action.as_str().to_string()),
        }
        .insert(self.db)
        .await
    }

    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        include_deleted: bool,
    ) -> Result<Option<menu_item::Model>, DbErr> {
        let mut query = MenuItem::find_by_id(item_id).filter(Column::TenantId.eq(tenant_id));
        if !include_deleted {
            query = query.filter(Column::DeletedAt.is_null());
        }
        query.one(self.db).await
    }

    /// Live item carrying the tenant's public item code.
    pub async fn find_by_code(
        &self,
        tenant_id: Uuid,
        item_code: &str,
    ) -> Result<Option<menu_item::Model>, DbErr> {
        MenuItem::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::ItemCode.eq(item_code))
            .filter(Column::DeletedAt.is_null())
            .one(self.db)
            .await
    }

    /// Loads the tenant's items among `item_ids`; ids belonging to other tenants are omitted.
    pub async fn find_many(
        &self,
        tenant_id: Uuid,
        item_ids: &[Uuid],
        include_deleted: bool,
    ) -> Result<Vec<menu_item::Model>, DbErr> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = MenuItem::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Id.is_in(item_ids.iter().copied()));
        if !include_deleted {
            query = query.filter(Column::DeletedAt.is_null());
        }
        query.all(self.db).await
    }

    /// All customization options owned by the given items.
    pub async fn customizations_for(
        &self,
        item_ids: &[Uuid],
    ) -> Result<Vec<item_customization::Model>, DbErr> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }
        ItemCustomization::find()
            .filter(item_customization::Column::ItemId.is_in(item_ids.iter().copied()))
            .order_by_asc(item_customization::Column::Name)
            .all(self.db)
            .await
    }

    /// Live items of a tenant ordered by category then name. Hidden items are
    /// left out unless `include_hidden` is set; inactive items are always listed.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        include_hidden: bool,
    ) -> Result<Vec<menu_item::Model>, DbErr> {
        let mut query = MenuItem::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::DeletedAt.is_null());
        if !include_hidden {
            query = query.filter(Column::Hidden.eq(false));
        }
        query
            .order_by_asc(Column::Category)
            .order_by_asc(Column::Name)
            .all(self.db)
            .await
    }

    /// Updates the availability flags of a live item; `None` leaves a flag unchanged.
    pub async fn set_availability(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        active: Option<bool>,
        hidden: Option<bool>,
    ) -> Result<Option<menu_item::Model>, DbErr> {
        let Some(item) = self.find_by_id(tenant_id, item_id, false).await? else {
            return Ok(None);
        };

        let mut model: MenuItemActiveModel = item.into();
        if let Some(active) = active {
            model.active = Set(active);
        }
        if let Some(hidden) = hidden {
            model.hidden = Set(hidden);
        }
        model.update(self.db).await.map(Some)
    }

    /// Edits the live name and price. Existing order snapshots are unaffected.
    pub async fn update_details(
        &self,
        tenant_id: Uuid,
        item_id: Uuid,
        name: &str,
        price: Decimal,
    ) -> Result<Option<menu_item::Model>, DbErr> {
        let Some(item) = self.find_by_id(tenant_id, item_id, false).await? else {
            return Ok(None);
        };

        let mut model: MenuItemActiveModel = item.into();
        model.name = Set(name.to_string());
        model.price = Set(price);
        model.update(self.db).await.map(Some)
    }
}
