//! Bid arbitration
//!
//! Validates and accepts bids against the auction's current state. The
//! commit is a compare-and-swap on the auction's version token: when two
//! bidders race, exactly one commit succeeds and the loser re-validates
//! against the now-current price before retrying, so no two accepted bids
//! can ever be based on the same stale price. Any anti-snipe extension is
//! folded into the same commit.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::models::{Auction, AuctionStatus, Bid, ErrorKind, NewBid};
use crate::repository::{AuctionRepository, BidRepository, RepositoryError};
use crate::services::collaborators::UserDirectory;

/// Minimum-increment policy: (inclusive upper price bound, increment).
/// Prices above the last bound use `TOP_INCREMENT`.
const INCREMENT_TIERS: [(Decimal, Decimal); 3] = [
    (dec!(100), dec!(1.00)),
    (dec!(1000), dec!(5.00)),
    (dec!(10000), dec!(25.00)),
];

const TOP_INCREMENT: Decimal = dec!(100.00);

/// Minimum amount a bid must add on top of the current price.
pub fn minimum_increment(current_price: Decimal) -> Decimal {
    for (bound, increment) in INCREMENT_TIERS {
        if current_price <= bound {
            return increment;
        }
    }
    TOP_INCREMENT
}

#[derive(Debug)]
pub enum BidError {
    AuctionNotFound(i64),
    BidderNotFound(i64),
    NotStarted,
    Ended,
    NotActive(AuctionStatus),
    OwnAuction,
    TooLow { current_price: Decimal },
    BelowMinimumIncrement { required: Decimal },
    AuctionNotSold(i64),
    ConcurrentConflict { attempts: u32 },
    Repository(RepositoryError),
}

impl BidError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BidError::AuctionNotFound(_) | BidError::BidderNotFound(_) => ErrorKind::NotFound,
            BidError::NotStarted | BidError::NotActive(_) | BidError::AuctionNotSold(_) => {
                ErrorKind::WrongState
            }
            BidError::Ended => ErrorKind::DeadlinePassed,
            BidError::OwnAuction
            | BidError::TooLow { .. }
            | BidError::BelowMinimumIncrement { .. } => ErrorKind::Validation,
            BidError::ConcurrentConflict { .. } => ErrorKind::ConcurrentConflict,
            BidError::Repository(_) => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for BidError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BidError::AuctionNotFound(id) => write!(f, "auction {} not found", id),
            BidError::BidderNotFound(id) => write!(f, "bidder {} not found", id),
            BidError::NotStarted => write!(f, "this auction has not started yet"),
            BidError::Ended => write!(f, "this auction has ended, bidding is no longer allowed"),
            BidError::NotActive(status) => {
                write!(f, "this auction is not active (current status: {})", status)
            }
            BidError::OwnAuction => write!(f, "you cannot bid on your own auction"),
            BidError::TooLow { current_price } => write!(
                f,
                "bid amount must be higher than the current price of {}",
                current_price
            ),
            BidError::BelowMinimumIncrement { required } => {
                write!(f, "minimum bid is {}", required)
            }
            BidError::AuctionNotSold(id) => write!(f, "auction {} has not been sold", id),
            BidError::ConcurrentConflict { attempts } => write!(
                f,
                "bid lost {} concurrent update races, please retry",
                attempts
            ),
            BidError::Repository(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BidError {}

impl From<RepositoryError> for BidError {
    fn from(err: RepositoryError) -> Self {
        BidError::Repository(err)
    }
}

/// Bid arbiter and ledger queries.
pub struct BidService {
    auctions: Arc<dyn AuctionRepository>,
    bids: Arc<dyn BidRepository>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl BidService {
    pub fn new(
        auctions: Arc<dyn AuctionRepository>,
        bids: Arc<dyn BidRepository>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
        max_attempts: u32,
    ) -> Self {
        Self {
            auctions,
            bids,
            users,
            clock,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Place a bid on an auction.
    ///
    /// Preconditions are checked in a fixed order so each rejection reports
    /// the first failing condition: auction exists, bidder is known, auction
    /// started, auction not ended, status ACTIVE, bidder is not the owner,
    /// amount beats the
    /// current price, amount meets the minimum increment. The time checks
    /// run against the wall clock independently of the status so a bid
    /// cannot slip into an auction the expiry sweep has not visited yet.
    pub async fn place_bid(
        &self,
        auction_id: i64,
        bidder_id: i64,
        amount: Decimal,
    ) -> Result<Bid, BidError> {
        for attempt in 1..=self.max_attempts {
            let auction = self
                .auctions
                .auction_by_id(auction_id)
                .await?
                .ok_or(BidError::AuctionNotFound(auction_id))?;

            if !self.users.exists(bidder_id).await {
                return Err(BidError::BidderNotFound(bidder_id));
            }

            let now = self.clock.now();
            self.validate(&auction, bidder_id, amount, now)?;

            let mut updated = auction.clone();
            updated.current_price = amount;
            updated.updated_at = now;
            let extended = auction.within_anti_snipe_window(now);
            if extended {
                updated.extend_end_time();
            }

            let new_bid = NewBid {
                auction_id,
                bidder_id,
                amount,
                placed_at: now,
            };

            match self.auctions.commit_bid(&updated, new_bid).await {
                Ok((_, bid)) => {
                    info!(
                        auction_id,
                        bidder_id,
                        amount = %amount,
                        extended,
                        "bid accepted"
                    );
                    return Ok(bid);
                }
                Err(RepositoryError::VersionConflict { .. }) => {
                    // lost the race; re-validate against the fresh price
                    warn!(
                        auction_id,
                        bidder_id, attempt, "bid commit lost version race, retrying"
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(BidError::ConcurrentConflict {
            attempts: self.max_attempts,
        })
    }

    fn validate(
        &self,
        auction: &Auction,
        bidder_id: i64,
        amount: Decimal,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), BidError> {
        if !auction.has_started(now) {
            return Err(BidError::NotStarted);
        }
        if auction.has_ended(now) {
            return Err(BidError::Ended);
        }
        if auction.status != AuctionStatus::Active {
            return Err(BidError::NotActive(auction.status));
        }
        if bidder_id == auction.owner_id {
            return Err(BidError::OwnAuction);
        }
        if amount <= auction.current_price {
            return Err(BidError::TooLow {
                current_price: auction.current_price,
            });
        }
        let required = auction.current_price + minimum_increment(auction.current_price);
        if amount < required {
            return Err(BidError::BelowMinimumIncrement { required });
        }
        Ok(())
    }

    /// All bids on an auction in arrival order.
    pub async fn bids_for_auction(&self, auction_id: i64) -> Result<Vec<Bid>, BidError> {
        Ok(self.bids.bids_for_auction(auction_id).await?)
    }

    /// All bids a user has placed.
    pub async fn bids_by_user(&self, bidder_id: i64) -> Result<Vec<Bid>, BidError> {
        Ok(self.bids.bids_by_bidder(bidder_id).await?)
    }

    pub async fn highest_bid(&self, auction_id: i64) -> Result<Option<Bid>, BidError> {
        Ok(self.bids.highest_bid(auction_id).await?)
    }

    /// The winning bid of a sold auction.
    pub async fn winning_bid(&self, auction_id: i64) -> Result<Option<Bid>, BidError> {
        let auction = self
            .auctions
            .auction_by_id(auction_id)
            .await?
            .ok_or(BidError::AuctionNotFound(auction_id))?;

        if auction.status != AuctionStatus::Sold {
            return Err(BidError::AuctionNotSold(auction_id));
        }

        Ok(self.bids.highest_bid(auction_id).await?)
    }

    pub async fn bid_count(&self, auction_id: i64) -> Result<u64, BidError> {
        Ok(self.bids.bid_count(auction_id).await?)
    }
}
