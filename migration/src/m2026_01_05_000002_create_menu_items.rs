//! Migration to create the menu_items and item_customizations tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MenuItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MenuItems::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(MenuItems::TenantId).uuid().not_null())
                    .col(ColumnDef::new(MenuItems::ItemCode).text().not_null())
                    .col(ColumnDef::new(MenuItems::Name).text().not_null())
                    .col(
                        ColumnDef::new(MenuItems::Price)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MenuItems::Description).text().null())
                    .col(ColumnDef::new(MenuItems::Category).text().not_null())
                    .col(
                        ColumnDef::new(MenuItems::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(MenuItems::Hidden)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(MenuItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MenuItems::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_menu_items_tenant_id")
                            .from(MenuItems::Table, MenuItems::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_menu_items_tenant_category")
                    .table(MenuItems::Table)
                    .col(MenuItems::TenantId)
                    .col(MenuItems::Category)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ItemCustomizations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ItemCustomizations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ItemCustomizations::ItemId).uuid().not_null())
                    .col(ColumnDef::new(ItemCustomizations::Name).text().not_null())
                    .col(
                        ColumnDef::new(ItemCustomizations::Price)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ItemCustomizations::Action).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_item_customizations_item_id")
                            .from(ItemCustomizations::Table, ItemCustomizations::ItemId)
                            .to(MenuItems::Table, MenuItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_item_customizations_item_id")
                    .table(ItemCustomizations::Table)
                    .col(ItemCustomizations::ItemId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ItemCustomizations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MenuItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MenuItems {
    Table,
    Id,
    TenantId,
    ItemCode,
    Name,
    Price,
    Description,
    Category,
    Active,
    Hidden,
    CreatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum ItemCustomizations {
    Table,
    Id,
    ItemId,
    Name,
    Price,
    Action,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}
