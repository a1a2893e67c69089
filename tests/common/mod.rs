#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use auctionhouse_backend::Engine;
use auctionhouse_backend::clock::{Clock, ManualClock};
use auctionhouse_backend::config::EngineConfig;
use auctionhouse_backend::models::{Auction, NewAuction, Purchase};
use auctionhouse_backend::repository::memory::MemoryStore;
use auctionhouse_backend::services::collaborators::{
    InMemoryUserDirectory, MockPaymentGateway, NoopNotificationSink,
};

/// Fixed start instant so every test works with deterministic time.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Engine over the in-memory store with a manually driven clock.
pub struct Harness {
    pub engine: Engine,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub users: Arc<InMemoryUserDirectory>,
    pub gateway: Arc<MockPaymentGateway>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let store = Arc::new(MemoryStore::new());
        let users = Arc::new(InMemoryUserDirectory::with_users(1..=20));
        let gateway = Arc::new(MockPaymentGateway::new());

        let engine = Engine::new(
            store.clone(),
            users.clone(),
            gateway.clone(),
            Arc::new(NoopNotificationSink),
            clock.clone(),
            config,
        );

        Self {
            engine,
            clock,
            store,
            users,
            gateway,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// An already-running auction ending one hour from now, no anti-snipe.
    pub async fn create_active_auction(&self, owner_id: i64, starting_price: Decimal) -> Auction {
        self.engine
            .auctions
            .create_auction(NewAuction {
                title: "test auction".into(),
                description: "integration fixture".into(),
                starting_price,
                start_time: self.now() - Duration::minutes(5),
                end_time: self.now() + Duration::hours(1),
                owner_id,
                anti_snipe_minutes: None,
                anti_snipe_threshold_secs: 300,
            })
            .await
            .expect("create auction")
    }

    /// An auction with anti-snipe enabled, ending `end_in` from now.
    pub async fn create_anti_snipe_auction(
        &self,
        owner_id: i64,
        starting_price: Decimal,
        end_in: Duration,
        threshold_secs: i64,
        extension_minutes: i64,
    ) -> Auction {
        self.engine
            .auctions
            .create_auction(NewAuction {
                title: "anti-snipe auction".into(),
                description: "integration fixture".into(),
                starting_price,
                start_time: self.now() - Duration::minutes(5),
                end_time: self.now() + end_in,
                owner_id,
                anti_snipe_minutes: Some(extension_minutes),
                anti_snipe_threshold_secs: threshold_secs,
            })
            .await
            .expect("create auction")
    }

    /// Run an auction to a sale: one bid, clock past the end, expiry sweep.
    /// Returns the resulting purchase.
    pub async fn sold_purchase(
        &self,
        owner_id: i64,
        buyer_id: i64,
        amount: Decimal,
    ) -> Purchase {
        let auction = self
            .create_active_auction(owner_id, Decimal::from(10))
            .await;
        self.engine
            .bids
            .place_bid(auction.id, buyer_id, amount)
            .await
            .expect("place winning bid");

        self.clock.advance(Duration::hours(1) + Duration::seconds(1));
        self.engine.auctions.process_expired_auctions().await;

        use auctionhouse_backend::repository::PurchaseRepository;
        self.store
            .purchase_for_auction(auction.id)
            .await
            .expect("query purchase")
            .expect("purchase created for sold auction")
    }
}
