// src/lib.rs

use std::sync::Arc;

use clock::Clock;
use config::EngineConfig;
use repository::{AuctionRepository, BidRepository, PenaltyRepository, PurchaseRepository};
use services::auctions::AuctionService;
use services::bidding::BidService;
use services::collaborators::{NotificationSink, PaymentMethodGateway, UserDirectory};
use services::purchases::PurchaseService;

pub mod entities {
    pub mod prelude;
    pub mod auctions;
    pub mod bids;
    pub mod purchases;
    pub mod user_penalties;
}

pub mod services {
    pub mod auctions;
    pub mod bidding;
    pub mod collaborators;
    pub mod purchases;
}

pub mod clock;
pub mod config;
pub mod jobs;
pub mod models;
pub mod repository;

/// Fully wired auction engine: the three services sharing one store, one
/// clock and one set of collaborators.
#[derive(Clone)]
pub struct Engine {
    pub config: EngineConfig,
    pub bids: Arc<BidService>,
    pub auctions: Arc<AuctionService>,
    pub purchases: Arc<PurchaseService>,
}

impl Engine {
    pub fn new<S>(
        store: Arc<S>,
        users: Arc<dyn UserDirectory>,
        gateway: Arc<dyn PaymentMethodGateway>,
        notifications: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self
    where
        S: AuctionRepository
            + BidRepository
            + PurchaseRepository
            + PenaltyRepository
            + Send
            + Sync
            + 'static,
    {
        let auction_repo: Arc<dyn AuctionRepository> = store.clone();
        let bid_repo: Arc<dyn BidRepository> = store.clone();
        let purchase_repo: Arc<dyn PurchaseRepository> = store.clone();
        let penalty_repo: Arc<dyn PenaltyRepository> = store;

        let purchases = Arc::new(PurchaseService::new(
            purchase_repo,
            bid_repo.clone(),
            penalty_repo,
            gateway,
            notifications,
            clock.clone(),
            &config,
        ));
        let auctions = Arc::new(AuctionService::new(
            auction_repo.clone(),
            bid_repo.clone(),
            purchases.clone(),
            clock.clone(),
        ));
        let bids = Arc::new(BidService::new(
            auction_repo,
            bid_repo,
            users,
            clock,
            config.max_bid_attempts,
        ));

        Self {
            config,
            bids,
            auctions,
            purchases,
        }
    }
}
