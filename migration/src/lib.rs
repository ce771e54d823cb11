//! Database migrations for the Tableside ordering service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_01_05_000001_create_tenants;
mod m2026_01_05_000002_create_menu_items;
mod m2026_01_05_000003_create_table_identities;
mod m2026_01_05_000004_create_orders;
mod m2026_01_05_000005_create_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_05_000001_create_tenants::Migration),
            Box::new(m2026_01_05_000002_create_menu_items::Migration),
            Box::new(m2026_01_05_000003_create_table_identities::Migration),
            Box::new(m2026_01_05_000004_create_orders::Migration),
            Box::new(m2026_01_05_000005_create_audit_logs::Migration),
        ]
    }
}
