//! Repository traits for the persisted auction, bid, purchase and penalty
//! records
//!
//! Services talk to these traits only; the Postgres implementation backs the
//! running service, the in-memory implementation backs tests. The write
//! methods encode the concurrency protocol: auction writes are conditional
//! on the version the caller read, purchase writes on the status the caller
//! read.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Auction, Bid, NewBid, NewPurchase, PenaltyState, Purchase, PurchaseStatus};

#[derive(Debug)]
pub enum RepositoryError {
    /// Conditional auction write lost an optimistic-version race.
    VersionConflict { auction_id: i64, expected_version: i64 },
    /// A purchase already exists for this auction.
    DuplicatePurchase { auction_id: i64 },
    /// Conditional purchase write found a different status than expected.
    StalePurchaseStatus { purchase_id: i64 },
    Backend(String),
}

impl RepositoryError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        RepositoryError::Backend(err.to_string())
    }
}

impl std::fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepositoryError::VersionConflict {
                auction_id,
                expected_version,
            } => write!(
                f,
                "version conflict on auction {} (expected version {})",
                auction_id, expected_version
            ),
            RepositoryError::DuplicatePurchase { auction_id } => {
                write!(f, "purchase already exists for auction {}", auction_id)
            }
            RepositoryError::StalePurchaseStatus { purchase_id } => {
                write!(f, "purchase {} was modified concurrently", purchase_id)
            }
            RepositoryError::Backend(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for RepositoryError {}

/// Persisted auction records with optimistic version tokens.
///
/// For `update_checked` and `commit_bid` the passed auction must carry the
/// version it was read at; the repository persists it with `version + 1` and
/// returns the stored copy. A mismatch against the stored version yields
/// [`RepositoryError::VersionConflict`] and writes nothing.
#[async_trait]
pub trait AuctionRepository: Send + Sync {
    /// Insert a new auction record; `auction.id` is ignored and assigned by
    /// the store.
    async fn insert_auction(&self, auction: Auction) -> Result<Auction, RepositoryError>;

    async fn auction_by_id(&self, id: i64) -> Result<Option<Auction>, RepositoryError>;

    /// Version-checked write used for lifecycle transitions and pre-bid
    /// edits.
    async fn update_checked(&self, auction: &Auction) -> Result<Auction, RepositoryError>;

    /// Atomically write the auction's new price (and any anti-snipe
    /// extension) and append the bid, conditional on the auction version.
    /// This is the only way a bid enters the ledger.
    async fn commit_bid(
        &self,
        auction: &Auction,
        bid: NewBid,
    ) -> Result<(Auction, Bid), RepositoryError>;

    /// Pending auctions whose start time has been reached.
    async fn due_for_activation(&self, now: DateTime<Utc>)
        -> Result<Vec<Auction>, RepositoryError>;

    /// Active auctions whose end time has passed.
    async fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<Auction>, RepositoryError>;

    /// Sold auctions with no purchase row. Normally empty: the set is only
    /// populated when a purchase insert failed after the sold transition
    /// committed, and the sweep drains it by retrying the creation.
    async fn sold_without_purchase(&self) -> Result<Vec<Auction>, RepositoryError>;

    /// Active auctions still open for bidding (listing query).
    async fn active_auctions(&self, now: DateTime<Utc>) -> Result<Vec<Auction>, RepositoryError>;

    async fn auctions_by_owner(&self, owner_id: i64) -> Result<Vec<Auction>, RepositoryError>;

    /// Delete an auction and cascade its bids. Only legal for unsold
    /// auctions; the service layer enforces that.
    async fn delete_auction(&self, id: i64) -> Result<(), RepositoryError>;
}

/// Read access to the append-only bid ledger.
#[async_trait]
pub trait BidRepository: Send + Sync {
    /// All bids on an auction in arrival order.
    async fn bids_for_auction(&self, auction_id: i64) -> Result<Vec<Bid>, RepositoryError>;

    async fn bids_by_bidder(&self, bidder_id: i64) -> Result<Vec<Bid>, RepositoryError>;

    /// Highest bid by amount; equal amounts resolve to the earliest bid.
    /// The arbiter's strict greater-than rule makes true ties impossible,
    /// the tie-break is purely defensive.
    async fn highest_bid(&self, auction_id: i64) -> Result<Option<Bid>, RepositoryError>;

    async fn bid_count(&self, auction_id: i64) -> Result<u64, RepositoryError>;
}

/// Persisted purchase obligations, at most one per auction.
#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    async fn purchase_by_id(&self, id: i64) -> Result<Option<Purchase>, RepositoryError>;

    async fn purchase_for_auction(
        &self,
        auction_id: i64,
    ) -> Result<Option<Purchase>, RepositoryError>;

    /// Insert a purchase; fails with [`RepositoryError::DuplicatePurchase`]
    /// if one already exists for the auction.
    async fn insert_purchase(&self, purchase: NewPurchase) -> Result<Purchase, RepositoryError>;

    /// Write the purchase conditional on its stored status still being
    /// `expected`; a mismatch yields
    /// [`RepositoryError::StalePurchaseStatus`].
    async fn update_purchase_if_status(
        &self,
        purchase: &Purchase,
        expected: PurchaseStatus,
    ) -> Result<Purchase, RepositoryError>;

    /// Pending-payment purchases past their deadline and not yet defaulted.
    async fn overdue_pending(&self, now: DateTime<Utc>) -> Result<Vec<Purchase>, RepositoryError>;

    async fn purchases_by_buyer(&self, buyer_id: i64) -> Result<Vec<Purchase>, RepositoryError>;

    async fn purchases_by_seller(&self, seller_id: i64)
        -> Result<Vec<Purchase>, RepositoryError>;

    async fn purchases_with_status(
        &self,
        status: PurchaseStatus,
    ) -> Result<Vec<Purchase>, RepositoryError>;
}

/// Per-user penalty bookkeeping.
#[async_trait]
pub trait PenaltyRepository: Send + Sync {
    /// Penalty state for a user; a user with no recorded defaults gets the
    /// empty state.
    async fn penalty_for_user(&self, user_id: i64) -> Result<PenaltyState, RepositoryError>;

    /// Upsert the penalty state.
    async fn save_penalty(
        &self,
        state: &PenaltyState,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Non-permanent bans whose banned_until has passed.
    async fn expired_bans(&self, now: DateTime<Utc>) -> Result<Vec<PenaltyState>, RepositoryError>;
}
