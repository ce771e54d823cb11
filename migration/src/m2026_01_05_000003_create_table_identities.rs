//! Migration to create the table_identities table.
//!
//! A table identity is the durable row behind a printed QR code. Rows are only
//! ever soft-deleted so the id embedded in the QR target stays valid on restore.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TableIdentities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TableIdentities::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TableIdentities::TenantId).uuid().not_null())
                    .col(
                        ColumnDef::new(TableIdentities::TableIdentifier)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TableIdentities::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(TableIdentities::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_table_identities_tenant_id")
                            .from(TableIdentities::Table, TableIdentities::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookup index covering soft-deleted rows for the restore path.
        manager
            .create_index(
                Index::create()
                    .name("idx_table_identities_tenant_identifier")
                    .table(TableIdentities::Table)
                    .col(TableIdentities::TenantId)
                    .col(TableIdentities::TableIdentifier)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_table_identities_live \
                 ON table_identities (tenant_id, table_identifier) WHERE deleted_at IS NULL"
                    .to_string(),
            ))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "DROP INDEX IF EXISTS idx_table_identities_live".to_string(),
            ))
            .await?;

        manager
            .drop_table(Table::drop().table(TableIdentities::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TableIdentities {
    Table,
    Id,
    TenantId,
    TableIdentifier,
    CreatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
