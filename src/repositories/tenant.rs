//! # Tenant Repository
//!
//! Storage access for restaurant accounts. Reads take an explicit
//! `include_deleted` flag; soft deletion and purging are separate operations.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::models::tenant::{ActiveModel as TenantActiveModel, Column, Entity as Tenant, Model};

/// Repository for Tenant database operations
pub struct TenantRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TenantRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Inserts a new tenant; a live tenant with the same public code yields a unique violation.
    pub async fn create(&self, public_code: &str, name: &str) -> Result<Model, DbErr> {
        TenantActiveModel {
            id: Set(Uuid::new_v4()),
            public_code: Set(public_code.to_string()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
            deleted_at: Set(None),
        }
        .insert(self.db)
        .await
    }

    pub async fn find_by_id(&self, id: Uuid, include_deleted: bool) -> Result<Option<Model>, DbErr> {
        let mut query = Tenant::find_by_id(id);
        if !include_deleted {
            query = query.filter(Column::DeletedAt.is_null());
        }
        query.one(self.db).await
    }

    pub async fn find_by_public_code(
        &self,
        public_code: &str,
        include_deleted: bool,
    ) -> Result<Option<Model>, DbErr> {
        let mut query = Tenant::find().filter(Column::PublicCode.eq(public_code));
        if !include_deleted {
            query = query.filter(Column::DeletedAt.is_null());
        }
        query.one(self.db).await
    }

    /// Marks the tenant deleted. Returns false when it was not live.
    pub async fn soft_delete(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = Tenant::update_many()
            .col_expr(
                Column::DeletedAt,
                sea_orm::sea_query::Expr::value(Some(sea_orm::prelude::DateTimeWithTimeZone::from(
                    Utc::now(),
                ))),
            )
            .filter(Column::Id.eq(id))
            .filter(Column::DeletedAt.is_null())
            .exec(self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Permanently removes the row.
    pub async fn purge(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = Tenant::delete_by_id(id).exec(self.db).await?;
        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, DatabaseConnection};

    async fn setup() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn soft_deleted_tenants_are_hidden_unless_requested() {
        let db = setup().await;
        let repo = TenantRepository::new(&db);
        let tenant = repo.create("1234", "Bistro").await.unwrap();

        assert!(repo.find_by_public_code("1234", false).await.unwrap().is_some());
        assert!(repo.soft_delete(tenant.id).await.unwrap());
        assert!(!repo.soft_delete(tenant.id).await.unwrap());

        assert!(repo.find_by_public_code("1234", false).await.unwrap().is_none());
        assert!(repo.find_by_id(tenant.id, false).await.unwrap().is_none());
        let deleted = repo.find_by_id(tenant.id, true).await.unwrap().unwrap();
        assert!(deleted.deleted_at.is_some());
    }

    #[tokio::test]
    async fn public_code_is_unique_among_live_tenants() {
        let db = setup().await;
        let repo = TenantRepository::new(&db);
        let first = repo.create("5555", "First").await.unwrap();

        let err = repo.create("5555", "Second").await.unwrap_err();
        assert!(crate::error::is_unique_violation(&err));

        repo.soft_delete(first.id).await.unwrap();
        let second = repo.create("5555", "Second").await.unwrap();
        assert_ne!(second.id, first.id);

        assert!(repo.purge(first.id).await.unwrap());
        assert!(repo.find_by_id(first.id, true).await.unwrap().is_none());
    }
}
