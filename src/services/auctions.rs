//! Auction lifecycle and management
//!
//! Owns every status transition: Pending -> Active when the start time is
//! reached, Active -> Sold/Inactive when the end time passes, and the
//! administrative Archived state. Transitions go through the same
//! version-checked write as bid commits, so a bid that extends an auction in
//! the same instant the expiry sweep runs forces the sweep to skip it and
//! look again next tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::models::{Auction, AuctionStatus, ErrorKind, NewAuction};
use crate::repository::{AuctionRepository, BidRepository, RepositoryError};
use crate::services::purchases::PurchaseService;

#[derive(Debug)]
pub enum AuctionError {
    NotFound(i64),
    NotOwner,
    HasBids,
    Ended,
    InvalidTimeRange,
    InvalidStartingPrice(Decimal),
    InvalidAntiSnipeConfig,
    WrongState {
        auction_id: i64,
        status: AuctionStatus,
    },
    ConcurrentlyModified(i64),
    Repository(RepositoryError),
}

impl AuctionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuctionError::NotFound(_) => ErrorKind::NotFound,
            AuctionError::NotOwner => ErrorKind::Unauthorized,
            AuctionError::HasBids | AuctionError::Ended | AuctionError::WrongState { .. } => {
                ErrorKind::WrongState
            }
            AuctionError::InvalidTimeRange
            | AuctionError::InvalidStartingPrice(_)
            | AuctionError::InvalidAntiSnipeConfig => ErrorKind::Validation,
            AuctionError::ConcurrentlyModified(_) => ErrorKind::ConcurrentConflict,
            AuctionError::Repository(_) => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for AuctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionError::NotFound(id) => write!(f, "auction {} not found", id),
            AuctionError::NotOwner => write!(f, "you can only manage your own auctions"),
            AuctionError::HasBids => write!(f, "auction already has bids"),
            AuctionError::Ended => write!(f, "auction has already ended"),
            AuctionError::InvalidTimeRange => {
                write!(f, "auction end time must be after its start time")
            }
            AuctionError::InvalidStartingPrice(price) => {
                write!(f, "starting price must be positive, got {}", price)
            }
            AuctionError::InvalidAntiSnipeConfig => {
                write!(f, "anti-snipe extension and threshold must be positive")
            }
            AuctionError::WrongState { auction_id, status } => {
                write!(f, "auction {} is in state {}", auction_id, status)
            }
            AuctionError::ConcurrentlyModified(id) => {
                write!(f, "auction {} was modified concurrently, please retry", id)
            }
            AuctionError::Repository(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AuctionError {}

impl From<RepositoryError> for AuctionError {
    fn from(err: RepositoryError) -> Self {
        AuctionError::Repository(err)
    }
}

/// Mutable fields of an auction; only applicable before the first bid.
#[derive(Debug, Clone)]
pub struct AuctionUpdate {
    pub title: String,
    pub description: String,
    pub starting_price: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Aggregate result of one expiry sweep run.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuctionSweepStats {
    pub activated: u64,
    pub sold: u64,
    pub closed_without_sale: u64,
    /// Lost version races (a bid landed between scan and transition);
    /// reprocessed on the next run.
    pub skipped: u64,
    /// Purchases created on retry for sold auctions whose initial creation
    /// failed.
    pub purchases_recovered: u64,
    pub failures: u64,
}

pub struct AuctionService {
    auctions: Arc<dyn AuctionRepository>,
    bids: Arc<dyn BidRepository>,
    purchases: Arc<PurchaseService>,
    clock: Arc<dyn Clock>,
}

impl AuctionService {
    pub fn new(
        auctions: Arc<dyn AuctionRepository>,
        bids: Arc<dyn BidRepository>,
        purchases: Arc<PurchaseService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            auctions,
            bids,
            purchases,
            clock,
        }
    }

    /// Create a new auction. Starts Active when the start time has already
    /// been reached, Pending otherwise.
    pub async fn create_auction(&self, request: NewAuction) -> Result<Auction, AuctionError> {
        if request.end_time <= request.start_time {
            return Err(AuctionError::InvalidTimeRange);
        }
        if request.starting_price <= Decimal::ZERO {
            return Err(AuctionError::InvalidStartingPrice(request.starting_price));
        }
        if request.anti_snipe_minutes.is_some_and(|m| m <= 0)
            || request.anti_snipe_threshold_secs <= 0
        {
            return Err(AuctionError::InvalidAntiSnipeConfig);
        }

        let now = self.clock.now();
        let status = if request.start_time <= now {
            AuctionStatus::Active
        } else {
            AuctionStatus::Pending
        };

        let auction = self
            .auctions
            .insert_auction(Auction {
                id: 0,
                title: request.title,
                description: request.description,
                starting_price: request.starting_price,
                current_price: request.starting_price,
                start_time: request.start_time,
                end_time: request.end_time,
                status,
                owner_id: request.owner_id,
                anti_snipe_minutes: request.anti_snipe_minutes,
                anti_snipe_threshold_secs: request.anti_snipe_threshold_secs,
                original_end_time: None,
                extension_count: 0,
                version: 0,
                created_at: now,
                updated_at: now,
            })
            .await?;

        info!(
            auction_id = auction.id,
            owner_id = auction.owner_id,
            status = %auction.status,
            "auction created"
        );
        Ok(auction)
    }

    pub async fn auction_by_id(&self, id: i64) -> Result<Auction, AuctionError> {
        self.auctions
            .auction_by_id(id)
            .await?
            .ok_or(AuctionError::NotFound(id))
    }

    /// Active auctions still open for bidding.
    pub async fn active_auctions(&self) -> Result<Vec<Auction>, AuctionError> {
        Ok(self.auctions.active_auctions(self.clock.now()).await?)
    }

    pub async fn auctions_by_owner(&self, owner_id: i64) -> Result<Vec<Auction>, AuctionError> {
        Ok(self.auctions.auctions_by_owner(owner_id).await?)
    }

    /// Update an auction's listing fields. Only the owner may update, and
    /// only while the auction has no bids and has not ended; after the first
    /// bid the record is frozen.
    pub async fn update_auction(
        &self,
        id: i64,
        update: AuctionUpdate,
        user_id: i64,
    ) -> Result<Auction, AuctionError> {
        let auction = self.auction_by_id(id).await?;

        if auction.owner_id != user_id {
            return Err(AuctionError::NotOwner);
        }
        if self.bids.bid_count(id).await? > 0 {
            return Err(AuctionError::HasBids);
        }
        let now = self.clock.now();
        if auction.has_ended(now) {
            return Err(AuctionError::Ended);
        }
        if update.end_time <= update.start_time {
            return Err(AuctionError::InvalidTimeRange);
        }
        if update.starting_price <= Decimal::ZERO {
            return Err(AuctionError::InvalidStartingPrice(update.starting_price));
        }

        let mut updated = auction;
        updated.title = update.title;
        updated.description = update.description;
        updated.starting_price = update.starting_price;
        // no bids yet, the current price simply tracks the starting price
        updated.current_price = update.starting_price;
        updated.start_time = update.start_time;
        updated.end_time = update.end_time;
        updated.updated_at = now;

        match self.auctions.update_checked(&updated).await {
            Ok(saved) => {
                info!(auction_id = id, "auction updated");
                Ok(saved)
            }
            Err(RepositoryError::VersionConflict { .. }) => {
                Err(AuctionError::ConcurrentlyModified(id))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Delete an auction. Owners may only delete auctions without bids;
    /// admins may delete any unsold auction, cascading its bids.
    pub async fn delete_auction(
        &self,
        id: i64,
        user_id: i64,
        is_admin: bool,
    ) -> Result<(), AuctionError> {
        let auction = self.auction_by_id(id).await?;

        if !is_admin && auction.owner_id != user_id {
            return Err(AuctionError::NotOwner);
        }
        if auction.status == AuctionStatus::Sold {
            // a sale produced a purchase obligation; the record must stay
            return Err(AuctionError::WrongState {
                auction_id: id,
                status: auction.status,
            });
        }
        if !is_admin && self.bids.bid_count(id).await? > 0 {
            return Err(AuctionError::HasBids);
        }

        self.auctions.delete_auction(id).await?;
        info!(auction_id = id, user_id, is_admin, "auction deleted");
        Ok(())
    }

    /// Administrative archive of any non-terminal auction.
    pub async fn archive_auction(&self, id: i64) -> Result<Auction, AuctionError> {
        let auction = self.auction_by_id(id).await?;

        if auction.status.is_terminal() {
            return Err(AuctionError::WrongState {
                auction_id: id,
                status: auction.status,
            });
        }

        let mut updated = auction;
        updated.status = AuctionStatus::Archived;
        updated.updated_at = self.clock.now();

        match self.auctions.update_checked(&updated).await {
            Ok(saved) => {
                info!(auction_id = id, "auction archived");
                Ok(saved)
            }
            Err(RepositoryError::VersionConflict { .. }) => {
                Err(AuctionError::ConcurrentlyModified(id))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// One sweep pass: activate due Pending auctions and close expired
    /// Active ones. Each auction is handled independently; a failure on one
    /// is logged and counted, never propagated.
    pub async fn process_expired_auctions(&self) -> AuctionSweepStats {
        let now = self.clock.now();
        let mut stats = AuctionSweepStats::default();

        match self.auctions.due_for_activation(now).await {
            Ok(pending) => {
                for auction in pending {
                    match self.activate(auction).await {
                        Ok(true) => stats.activated += 1,
                        Ok(false) => stats.skipped += 1,
                        Err(err) => {
                            stats.failures += 1;
                            error!(error = %err, "failed to activate auction");
                        }
                    }
                }
            }
            Err(err) => {
                stats.failures += 1;
                error!(error = %err, "activation scan failed");
            }
        }

        match self.auctions.expired_active(now).await {
            Ok(expired) => {
                for auction in expired {
                    let auction_id = auction.id;
                    match self.close(auction, now).await {
                        Ok(CloseOutcome::Sold) => stats.sold += 1,
                        Ok(CloseOutcome::NoBids) => stats.closed_without_sale += 1,
                        Ok(CloseOutcome::Skipped) => stats.skipped += 1,
                        Err(err) => {
                            stats.failures += 1;
                            error!(auction_id, error = %err, "failed to close expired auction");
                        }
                    }
                }
            }
            Err(err) => {
                stats.failures += 1;
                error!(error = %err, "expiry scan failed");
            }
        }

        // a sold transition that committed but then failed to create its
        // purchase leaves the auction sold without a row; creation is
        // idempotent, so retry until it lands
        match self.auctions.sold_without_purchase().await {
            Ok(orphaned) => {
                for auction in orphaned {
                    let auction_id = auction.id;
                    match self.purchases.create_purchase_for_auction(&auction).await {
                        Ok(_) => {
                            stats.purchases_recovered += 1;
                            info!(auction_id, "purchase created for sold auction on retry");
                        }
                        Err(err) => {
                            stats.failures += 1;
                            error!(auction_id, error = %err, "failed to create purchase for sold auction");
                        }
                    }
                }
            }
            Err(err) => {
                stats.failures += 1;
                error!(error = %err, "sold-without-purchase scan failed");
            }
        }

        if stats.activated
            + stats.sold
            + stats.closed_without_sale
            + stats.skipped
            + stats.purchases_recovered
            + stats.failures
            > 0
        {
            info!(
                activated = stats.activated,
                sold = stats.sold,
                closed_without_sale = stats.closed_without_sale,
                skipped = stats.skipped,
                purchases_recovered = stats.purchases_recovered,
                failures = stats.failures,
                "auction sweep finished"
            );
        }
        stats
    }

    /// Pending -> Active. Returns false when the version race was lost.
    async fn activate(&self, auction: Auction) -> Result<bool, AuctionError> {
        let auction_id = auction.id;
        let mut updated = auction;
        updated.status = AuctionStatus::Active;
        updated.updated_at = self.clock.now();

        match self.auctions.update_checked(&updated).await {
            Ok(_) => {
                info!(auction_id, "auction activated");
                Ok(true)
            }
            Err(RepositoryError::VersionConflict { .. }) => {
                debug!(auction_id, "activation lost version race, will retry");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Active -> Sold (with purchase) or Active -> Inactive. The conditional
    /// write happens before the purchase is created: if a late bid extended
    /// the auction concurrently, the version check fails, nothing is
    /// written, and the auction is re-examined on the next sweep. If the
    /// purchase insert fails after the sold write landed, the
    /// sold-without-purchase scan retries it.
    async fn close(&self, auction: Auction, now: DateTime<Utc>) -> Result<CloseOutcome, AuctionError> {
        let auction_id = auction.id;
        let bid_count = self.bids.bid_count(auction_id).await?;

        let mut updated = auction;
        updated.status = if bid_count > 0 {
            AuctionStatus::Sold
        } else {
            AuctionStatus::Inactive
        };
        updated.updated_at = now;

        let saved = match self.auctions.update_checked(&updated).await {
            Ok(saved) => saved,
            Err(RepositoryError::VersionConflict { .. }) => {
                debug!(auction_id, "close lost version race, will retry");
                return Ok(CloseOutcome::Skipped);
            }
            Err(err) => return Err(err.into()),
        };

        if saved.status == AuctionStatus::Sold {
            info!(auction_id, "auction ended - sold");
            self.purchases
                .create_purchase_for_auction(&saved)
                .await
                .map_err(|err| {
                    AuctionError::Repository(RepositoryError::Backend(err.to_string()))
                })?;
            Ok(CloseOutcome::Sold)
        } else {
            info!(auction_id, "auction ended - no bids");
            Ok(CloseOutcome::NoBids)
        }
    }
}

enum CloseOutcome {
    Sold,
    NoBids,
    Skipped,
}
