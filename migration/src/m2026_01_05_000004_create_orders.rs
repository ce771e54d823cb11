//! Migration to create the orders and order_lines tables.
//!
//! The unique `(tenant_id, sequence_date, daily_sequence)` index is what makes
//! daily sequence allocation race-free: a concurrent writer that read the same
//! last sequence fails on insert and retries.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Orders::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Orders::TableId).uuid().not_null())
                    .col(ColumnDef::new(Orders::TableIdentifier).text().not_null())
                    .col(ColumnDef::new(Orders::DailySequence).integer().not_null())
                    .col(ColumnDef::new(Orders::SequenceDate).date().not_null())
                    .col(ColumnDef::new(Orders::DisplayCode).text().not_null())
                    .col(
                        ColumnDef::new(Orders::Status)
                            .text()
                            .not_null()
                            .default("NEW"),
                    )
                    .col(ColumnDef::new(Orders::Total).decimal_len(12, 2).not_null())
                    .col(ColumnDef::new(Orders::CustomerNote).text().null())
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Orders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Orders::DoneAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_tenant_id")
                            .from(Orders::Table, Orders::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_table_id")
                            .from(Orders::Table, Orders::TableId)
                            .to(TableIdentities::Table, TableIdentities::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_orders_tenant_sequence_unique")
                    .table(Orders::Table)
                    .col(Orders::TenantId)
                    .col(Orders::SequenceDate)
                    .col(Orders::DailySequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Live feed queries: active orders per tenant, newest first.
        manager
            .create_index(
                Index::create()
                    .name("idx_orders_tenant_status_created")
                    .table(Orders::Table)
                    .col(Orders::TenantId)
                    .col(Orders::Status)
                    .col(Orders::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderLines::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OrderLines::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(OrderLines::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderLines::ItemId).uuid().not_null())
                    .col(ColumnDef::new(OrderLines::Position).integer().not_null())
                    .col(ColumnDef::new(OrderLines::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(OrderLines::Customizations)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderLines::Subtotal)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderLines::ItemNameSnapshot)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderLines::ItemPriceSnapshot)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_lines_order_id")
                            .from(OrderLines::Table, OrderLines::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_lines_item_id")
                            .from(OrderLines::Table, OrderLines::ItemId)
                            .to(MenuItems::Table, MenuItems::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_order_lines_order_id")
                    .table(OrderLines::Table)
                    .col(OrderLines::OrderId)
                    .col(OrderLines::Position)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderLines::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    TenantId,
    TableId,
    TableIdentifier,
    DailySequence,
    SequenceDate,
    DisplayCode,
    Status,
    Total,
    CustomerNote,
    CreatedAt,
    UpdatedAt,
    DoneAt,
}

#[derive(DeriveIden)]
enum OrderLines {
    Table,
    Id,
    OrderId,
    ItemId,
    Position,
    Quantity,
    Customizations,
    Subtotal,
    ItemNameSnapshot,
    ItemPriceSnapshot,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum TableIdentities {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum MenuItems {
    Table,
    Id,
}
