//! Database migrations for the change event store.

pub use sea_orm_migration::prelude::*;

mod m2025_11_10_090000_create_connections;
mod m2025_11_10_090100_create_change_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_11_10_090000_create_connections::Migration),
            Box::new(m2025_11_10_090100_create_change_events::Migration),
        ]
    }
}
