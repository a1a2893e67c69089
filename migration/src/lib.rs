pub use sea_orm_migration::prelude::*;

mod m20260205_000001_create_auctions;
mod m20260205_000002_create_bids;
mod m20260212_000001_create_purchases;
mod m20260212_000002_create_user_penalties;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260205_000001_create_auctions::Migration),
            Box::new(m20260205_000002_create_bids::Migration),
            Box::new(m20260212_000001_create_purchases::Migration),
            Box::new(m20260212_000002_create_user_penalties::Migration),
        ]
    }
}
