pub use sea_orm_migration::prelude::*;

mod m20251019_000001_create_users_and_transactions;
mod m20251019_000002_create_promotions;
mod m20251019_000003_create_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251019_000001_create_users_and_transactions::Migration),
            Box::new(m20251019_000002_create_promotions::Migration),
            Box::new(m20251019_000003_create_events::Migration),
        ]
    }
}
