//! # Table Identity Repository

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use uuid::Uuid;

use crate::models::table_identity::{
    ActiveModel as TableIdentityActiveModel, Column, Entity as TableIdentity, Model,
};

pub struct TableIdentityRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> TableIdentityRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Looks up a table by its normalized identifier.
    pub async fn find_by_identifier(
        &self,
        tenant_id: Uuid,
        identifier: &str,
        include_deleted: bool,
    ) -> Result<Option<Model>, DbErr> {
        let mut query = TableIdentity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::TableIdentifier.eq(identifier));
        if !include_deleted {
            query = query.filter(Column::DeletedAt.is_null());
        }
        // Prefer the live row if one exists alongside deleted history.
        query
            .order_by_asc(Column::DeletedAt.is_not_null())
            .order_by_asc(Column::CreatedAt)
            .one(self.db)
            .await
    }

    /// All rows matching any of `identifiers`.
    pub async fn find_by_identifiers(
        &self,
        tenant_id: Uuid,
        identifiers: &[String],
        include_deleted: bool,
    ) -> Result<Vec<Model>, DbErr> {
        if identifiers.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = TableIdentity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::TableIdentifier.is_in(identifiers.iter().cloned()));
        if !include_deleted {
            query = query.filter(Column::DeletedAt.is_null());
        }
        query.order_by_asc(Column::CreatedAt).all(self.db).await
    }

    pub async fn list(&self, tenant_id: Uuid, include_deleted: bool) -> Result<Vec<Model>, DbErr> {
        let mut query = TableIdentity::find().filter(Column::TenantId.eq(tenant_id));
        if !include_deleted {
            query = query.filter(Column::DeletedAt.is_null());
        }
        query
            .order_by_asc(Column::TableIdentifier)
            .all(self.db)
            .await
    }

    pub async fn insert(&self, tenant_id: Uuid, identifier: &str) -> Result<Model, DbErr> {
        TableIdentityActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            table_identifier: Set(identifier.to_string()),
            created_at: Set(Utc::now().into()),
            deleted_at: Set(None),
        }
        .insert(self.db)
        .await
    }

    /// Clears the deletion marker, keeping the durable id.
    pub async fn restore(&self, row: Model) -> Result<Model, DbErr> {
        let mut model: TableIdentityActiveModel = row.into();
        model.deleted_at = Set(None);
        model.update(self.db).await
    }

    /// Marks a live table deleted. Returns false when no live row matched.
    pub async fn soft_delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbErr> {
        let result = TableIdentity::update_many()
            .col_expr(
                Column::DeletedAt,
                Expr::value(Some(DateTimeWithTimeZone::from(Utc::now()))),
            )
            .filter(Column::Id.eq(id))
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::DeletedAt.is_null())
            .exec(self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Permanently removes the row. Fails while orders still reference it.
    pub async fn purge(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, DbErr> {
        let result = TableIdentity::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::TenantId.eq(tenant_id))
            .exec(self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use rust_decimal::Decimal;
    use sea_orm::{Database, DatabaseConnection};

    use crate::models::order;
    use crate::repositories::{OrderRepository, TenantRepository, order::to_db_time};

    async fn setup() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn order_for(table: &Model) -> order::ActiveModel {
        let now = to_db_time(Utc::now());
        order::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(table.tenant_id),
            table_id: Set(table.id),
            table_identifier: Set(table.table_identifier.clone()),
            daily_sequence: Set(1),
            sequence_date: Set(Utc::now().date_naive()),
            display_code: Set(format!("1234-{}-0001", table.table_identifier)),
            status: Set("NEW".to_string()),
            total: Set(Decimal::TEN),
            customer_note: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            done_at: Set(None),
        }
    }

    #[tokio::test]
    async fn purge_is_separate_from_soft_delete() {
        let db = setup().await;
        let tenant = TenantRepository::new(&db).create("1234", "Bistro").await.unwrap();
        let other = TenantRepository::new(&db).create("5678", "Grill").await.unwrap();
        let repo = TableIdentityRepository::new(&db);
        let table = repo.insert(tenant.id, "A1").await.unwrap();

        assert!(repo.soft_delete(tenant.id, table.id).await.unwrap());
        assert_eq!(repo.list(tenant.id, true).await.unwrap().len(), 1);

        assert!(!repo.purge(other.id, table.id).await.unwrap());
        assert!(repo.purge(tenant.id, table.id).await.unwrap());
        assert!(repo.list(tenant.id, true).await.unwrap().is_empty());
        assert!(!repo.purge(tenant.id, table.id).await.unwrap());
    }

    #[tokio::test]
    async fn purge_fails_while_orders_reference_the_table() {
        let db = setup().await;
        let tenant = TenantRepository::new(&db).create("1234", "Bistro").await.unwrap();
        let repo = TableIdentityRepository::new(&db);
        let table = repo.insert(tenant.id, "A1").await.unwrap();
        OrderRepository::new(&db)
            .insert_with_lines(order_for(&table), Vec::new())
            .await
            .unwrap();

        assert!(repo.purge(tenant.id, table.id).await.is_err());
        let rows = repo.list(tenant.id, true).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, table.id);
    }
}
