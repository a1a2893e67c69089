use std::env;
use std::sync::Arc;

use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auctionhouse_backend::Engine;
use auctionhouse_backend::clock::SystemClock;
use auctionhouse_backend::config::EngineConfig;
use auctionhouse_backend::jobs::{
    auction_sweep::start_auction_sweep_job, ban_sweep::start_ban_sweep_job,
    payment_sweep::start_payment_sweep_job,
};
use auctionhouse_backend::repository::postgres::PostgresStore;
use auctionhouse_backend::services::collaborators::{
    InMemoryUserDirectory, MockPaymentGateway, NoopNotificationSink,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,auctionhouse_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let config = EngineConfig::from_env();
    tracing::info!(?config, "Engine configuration loaded");

    // The user and payment-method subsystems are external; until they are
    // attached the engine runs with the permissive in-memory collaborators.
    let engine = Engine::new(
        Arc::new(PostgresStore::new(db)),
        Arc::new(InMemoryUserDirectory::new()),
        Arc::new(MockPaymentGateway::permissive()),
        Arc::new(NoopNotificationSink),
        Arc::new(SystemClock),
        config,
    );

    // Background sweeps
    start_auction_sweep_job(
        engine.auctions.clone(),
        engine.config.auction_sweep_interval_secs,
    );
    start_payment_sweep_job(
        engine.purchases.clone(),
        engine.config.payment_sweep_interval_secs,
    );
    start_ban_sweep_job(
        engine.purchases.clone(),
        engine.config.ban_sweep_interval_secs,
    );

    tracing::info!("Auction engine running, press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");

    tracing::info!("Shutting down");
}
