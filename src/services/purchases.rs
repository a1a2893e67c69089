//! Purchase obligations and payment enforcement
//!
//! A purchase is created exactly once when an auction sells, then either
//! paid before its deadline or defaulted by the overdue-payment sweep.
//! Defaults escalate to the buyer's penalty record; repeated defaults ban
//! the buyer for a configured period.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::models::{Auction, AuctionStatus, ErrorKind, NewPurchase, Purchase, PurchaseStatus};
use crate::repository::{BidRepository, PenaltyRepository, PurchaseRepository, RepositoryError};
use crate::services::collaborators::{NotificationSink, PaymentMethodGateway};

#[derive(Debug)]
pub enum PurchaseError {
    NotFound(i64),
    NotBuyer,
    Unauthorized,
    WrongState(PurchaseStatus),
    DeadlinePassed,
    PaymentMethodRejected,
    AuctionNotSold(i64),
    NoWinningBid(i64),
    CannotCancelCompleted(i64),
    Repository(RepositoryError),
}

impl PurchaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PurchaseError::NotFound(_) => ErrorKind::NotFound,
            PurchaseError::NotBuyer | PurchaseError::Unauthorized => ErrorKind::Unauthorized,
            PurchaseError::WrongState(_)
            | PurchaseError::AuctionNotSold(_)
            | PurchaseError::NoWinningBid(_)
            | PurchaseError::CannotCancelCompleted(_) => ErrorKind::WrongState,
            PurchaseError::DeadlinePassed => ErrorKind::DeadlinePassed,
            PurchaseError::PaymentMethodRejected => ErrorKind::Validation,
            PurchaseError::Repository(_) => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for PurchaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PurchaseError::NotFound(id) => write!(f, "purchase {} not found", id),
            PurchaseError::NotBuyer => write!(f, "you are not the buyer of this purchase"),
            PurchaseError::Unauthorized => write!(f, "you do not have access to this purchase"),
            PurchaseError::WrongState(status) => {
                write!(f, "this purchase is not awaiting payment (status: {})", status)
            }
            PurchaseError::DeadlinePassed => write!(f, "payment deadline has passed"),
            PurchaseError::PaymentMethodRejected => {
                write!(f, "payment method must be verified and owned by the buyer")
            }
            PurchaseError::AuctionNotSold(id) => {
                write!(f, "cannot create purchase for auction {} that is not sold", id)
            }
            PurchaseError::NoWinningBid(id) => {
                write!(f, "no bids found for sold auction {}", id)
            }
            PurchaseError::CannotCancelCompleted(id) => {
                write!(f, "cannot cancel completed purchase {}, use refund instead", id)
            }
            PurchaseError::Repository(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PurchaseError {}

impl From<RepositoryError> for PurchaseError {
    fn from(err: RepositoryError) -> Self {
        PurchaseError::Repository(err)
    }
}

/// Aggregate result of one overdue-payment sweep run.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentSweepStats {
    pub defaulted: u64,
    pub bans_issued: u64,
    /// Purchases that were paid or cancelled between scan and write.
    pub skipped: u64,
    pub failures: u64,
}

/// Aggregate result of one ban-expiry sweep run.
#[derive(Debug, Default, Clone, Copy)]
pub struct BanSweepStats {
    pub cleared: u64,
    pub failures: u64,
}

pub struct PurchaseService {
    purchases: Arc<dyn PurchaseRepository>,
    bids: Arc<dyn BidRepository>,
    penalties: Arc<dyn PenaltyRepository>,
    gateway: Arc<dyn PaymentMethodGateway>,
    notifications: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    payment_window: Duration,
    max_failed_payments: u32,
    ban_duration: Duration,
}

impl PurchaseService {
    pub fn new(
        purchases: Arc<dyn PurchaseRepository>,
        bids: Arc<dyn BidRepository>,
        penalties: Arc<dyn PenaltyRepository>,
        gateway: Arc<dyn PaymentMethodGateway>,
        notifications: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            purchases,
            bids,
            penalties,
            gateway,
            notifications,
            clock,
            payment_window: Duration::hours(config.payment_window_hours),
            max_failed_payments: config.max_failed_payments,
            ban_duration: Duration::days(config.ban_duration_days),
        }
    }

    /// Create the purchase obligation for a sold auction. Idempotent: a
    /// second call (or a concurrent duplicate trigger) finds the existing
    /// record and returns it instead of erroring.
    pub async fn create_purchase_for_auction(
        &self,
        auction: &Auction,
    ) -> Result<Purchase, PurchaseError> {
        if auction.status != AuctionStatus::Sold {
            return Err(PurchaseError::AuctionNotSold(auction.id));
        }

        if let Some(existing) = self.purchases.purchase_for_auction(auction.id).await? {
            debug!(
                auction_id = auction.id,
                purchase_id = existing.id,
                "purchase already exists"
            );
            return Ok(existing);
        }

        let winning_bid = self
            .bids
            .highest_bid(auction.id)
            .await?
            .ok_or(PurchaseError::NoWinningBid(auction.id))?;

        let now = self.clock.now();
        let result = self
            .purchases
            .insert_purchase(NewPurchase {
                auction_id: auction.id,
                seller_id: auction.owner_id,
                buyer_id: winning_bid.bidder_id,
                amount: winning_bid.amount,
                purchase_date: now,
                payment_deadline: now + self.payment_window,
            })
            .await;

        let purchase = match result {
            Ok(purchase) => purchase,
            // expected race under retrying sweeps: someone else inserted
            // between our lookup and write
            Err(RepositoryError::DuplicatePurchase { .. }) => {
                return self
                    .purchases
                    .purchase_for_auction(auction.id)
                    .await?
                    .ok_or(PurchaseError::NotFound(auction.id));
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            purchase_id = purchase.id,
            auction_id = auction.id,
            buyer_id = purchase.buyer_id,
            amount = %purchase.amount,
            deadline = %purchase.payment_deadline,
            "purchase created"
        );
        self.notifications
            .auction_sold(auction.id, purchase.buyer_id)
            .await;
        Ok(purchase)
    }

    /// Submit payment for a purchase. The status write is conditional on the
    /// purchase still being PendingPayment, so a sweep that defaulted it
    /// first wins and the submission fails with the defaulted state.
    pub async fn submit_payment(
        &self,
        purchase_id: i64,
        buyer_id: i64,
        payment_method_id: i64,
    ) -> Result<Purchase, PurchaseError> {
        let purchase = self
            .purchases
            .purchase_by_id(purchase_id)
            .await?
            .ok_or(PurchaseError::NotFound(purchase_id))?;

        if purchase.buyer_id != buyer_id {
            return Err(PurchaseError::NotBuyer);
        }
        if purchase.status != PurchaseStatus::PendingPayment {
            return Err(PurchaseError::WrongState(purchase.status));
        }
        let now = self.clock.now();
        if now >= purchase.payment_deadline {
            return Err(PurchaseError::DeadlinePassed);
        }
        if !self
            .gateway
            .is_verified_and_usable(payment_method_id, buyer_id)
            .await
        {
            return Err(PurchaseError::PaymentMethodRejected);
        }

        let mut updated = purchase;
        updated.status = PurchaseStatus::Completed;
        updated.completed_date = Some(now);

        match self
            .purchases
            .update_purchase_if_status(&updated, PurchaseStatus::PendingPayment)
            .await
        {
            Ok(saved) => {
                info!(purchase_id, buyer_id, "payment completed");
                Ok(saved)
            }
            Err(RepositoryError::StalePurchaseStatus { .. }) => {
                // the sweep got there first; report whatever state won
                let current = self
                    .purchases
                    .purchase_by_id(purchase_id)
                    .await?
                    .ok_or(PurchaseError::NotFound(purchase_id))?;
                Err(PurchaseError::WrongState(current.status))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// One sweep pass over overdue pending payments. Each purchase is
    /// defaulted independently; failures are logged and counted, never
    /// propagated.
    pub async fn process_overdue_payments(&self) -> PaymentSweepStats {
        let now = self.clock.now();
        let mut stats = PaymentSweepStats::default();

        let overdue = match self.purchases.overdue_pending(now).await {
            Ok(overdue) => overdue,
            Err(err) => {
                error!(error = %err, "overdue payment scan failed");
                stats.failures += 1;
                return stats;
            }
        };

        for purchase in overdue {
            let purchase_id = purchase.id;
            match self.default_purchase(purchase).await {
                Ok(DefaultOutcome::Defaulted { banned }) => {
                    stats.defaulted += 1;
                    if banned {
                        stats.bans_issued += 1;
                    }
                }
                Ok(DefaultOutcome::Skipped) => stats.skipped += 1,
                Err(err) => {
                    stats.failures += 1;
                    error!(purchase_id, error = %err, "failed to process payment default");
                }
            }
        }

        if stats.defaulted + stats.skipped + stats.failures > 0 {
            info!(
                defaulted = stats.defaulted,
                bans_issued = stats.bans_issued,
                skipped = stats.skipped,
                failures = stats.failures,
                "overdue payment sweep finished"
            );
        }
        stats
    }

    async fn default_purchase(
        &self,
        purchase: Purchase,
    ) -> Result<DefaultOutcome, PurchaseError> {
        let purchase_id = purchase.id;
        let buyer_id = purchase.buyer_id;

        let mut defaulted = purchase;
        defaulted.status = PurchaseStatus::PaymentFailed;
        defaulted.payment_defaulted = true;

        match self
            .purchases
            .update_purchase_if_status(&defaulted, PurchaseStatus::PendingPayment)
            .await
        {
            Ok(_) => {}
            Err(RepositoryError::StalePurchaseStatus { .. }) => {
                // paid or cancelled between scan and write
                debug!(purchase_id, "purchase no longer pending, skipping default");
                return Ok(DefaultOutcome::Skipped);
            }
            Err(err) => return Err(err.into()),
        }

        warn!(purchase_id, buyer_id, "payment default recorded");
        self.notifications.payment_failed(purchase_id, buyer_id).await;

        let mut penalty = self.penalties.penalty_for_user(buyer_id).await?;
        penalty.non_payment_count += 1;
        info!(
            buyer_id,
            non_payment_count = penalty.non_payment_count,
            "non-payment count incremented"
        );

        let mut banned = false;
        // a permanent ban is never replaced by a temporary one, and an
        // existing longer ban is never shortened
        if !penalty.permanent_ban && penalty.non_payment_count >= self.max_failed_payments {
            let now = self.clock.now();
            let until = now + self.ban_duration;
            if penalty.banned_until.is_none_or(|current| until > current) {
                let reason = format!(
                    "Automatic ban: {} failed payments. Last failed purchase: #{}",
                    penalty.non_payment_count, purchase_id
                );
                penalty.banned_until = Some(until);
                penalty.ban_reason = Some(reason.clone());
                banned = true;
                warn!(buyer_id, banned_until = %until, "user banned for repeated payment defaults");
                self.notifications.user_banned(buyer_id, &reason).await;
            }
        }

        self.penalties
            .save_penalty(&penalty, self.clock.now())
            .await?;

        Ok(DefaultOutcome::Defaulted { banned })
    }

    /// One sweep pass clearing expired temporary bans. The non-payment
    /// count is retained; only the ban itself lapses.
    pub async fn clear_expired_bans(&self) -> BanSweepStats {
        let now = self.clock.now();
        let mut stats = BanSweepStats::default();

        let expired = match self.penalties.expired_bans(now).await {
            Ok(expired) => expired,
            Err(err) => {
                error!(error = %err, "expired ban scan failed");
                stats.failures += 1;
                return stats;
            }
        };

        for mut penalty in expired {
            let user_id = penalty.user_id;
            penalty.banned_until = None;
            penalty.ban_reason = None;
            match self.penalties.save_penalty(&penalty, now).await {
                Ok(()) => {
                    stats.cleared += 1;
                    info!(user_id, "temporary ban expired and cleared");
                }
                Err(err) => {
                    stats.failures += 1;
                    error!(user_id, error = %err, "failed to clear expired ban");
                }
            }
        }

        stats
    }

    /// Administrative cancellation; not allowed once the purchase completed.
    pub async fn cancel_purchase(
        &self,
        purchase_id: i64,
        reason: &str,
    ) -> Result<Purchase, PurchaseError> {
        let purchase = self
            .purchases
            .purchase_by_id(purchase_id)
            .await?
            .ok_or(PurchaseError::NotFound(purchase_id))?;

        if purchase.status == PurchaseStatus::Completed {
            return Err(PurchaseError::CannotCancelCompleted(purchase_id));
        }

        let expected = purchase.status;
        let mut updated = purchase;
        updated.status = PurchaseStatus::Cancelled;

        match self
            .purchases
            .update_purchase_if_status(&updated, expected)
            .await
        {
            Ok(saved) => {
                info!(purchase_id, reason, "purchase cancelled");
                Ok(saved)
            }
            Err(RepositoryError::StalePurchaseStatus { .. }) => {
                let current = self
                    .purchases
                    .purchase_by_id(purchase_id)
                    .await?
                    .ok_or(PurchaseError::NotFound(purchase_id))?;
                Err(PurchaseError::WrongState(current.status))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// A purchase visible to its buyer, its seller, or an admin.
    pub async fn purchase_by_id(
        &self,
        purchase_id: i64,
        user_id: i64,
        is_admin: bool,
    ) -> Result<Purchase, PurchaseError> {
        let purchase = self
            .purchases
            .purchase_by_id(purchase_id)
            .await?
            .ok_or(PurchaseError::NotFound(purchase_id))?;

        if purchase.buyer_id != user_id && purchase.seller_id != user_id && !is_admin {
            return Err(PurchaseError::Unauthorized);
        }
        Ok(purchase)
    }

    pub async fn purchases_by_buyer(&self, buyer_id: i64) -> Result<Vec<Purchase>, PurchaseError> {
        Ok(self.purchases.purchases_by_buyer(buyer_id).await?)
    }

    pub async fn sales_by_seller(&self, seller_id: i64) -> Result<Vec<Purchase>, PurchaseError> {
        Ok(self.purchases.purchases_by_seller(seller_id).await?)
    }

    /// All purchases awaiting payment (admin view).
    pub async fn pending_payments(&self) -> Result<Vec<Purchase>, PurchaseError> {
        Ok(self
            .purchases
            .purchases_with_status(PurchaseStatus::PendingPayment)
            .await?)
    }
}

enum DefaultOutcome {
    Defaulted { banned: bool },
    Skipped,
}
