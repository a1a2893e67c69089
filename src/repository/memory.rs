//! In-memory store implementing every repository trait
//!
//! Used by the integration tests and by the demo mode. Lock order for
//! multi-map operations is always auctions before bids; `commit_bid` does
//! its version check and both writes inside that scope, which gives the same
//! serialization the Postgres transaction provides.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::models::{
    Auction, AuctionStatus, Bid, NewBid, NewPurchase, PenaltyState, Purchase, PurchaseStatus,
};
use crate::repository::{
    AuctionRepository, BidRepository, PenaltyRepository, PurchaseRepository, RepositoryError,
};

#[derive(Default)]
struct Inner {
    auctions: RwLock<HashMap<i64, Auction>>,
    bids: RwLock<Vec<Bid>>,
    purchases: RwLock<HashMap<i64, Purchase>>,
    penalties: RwLock<HashMap<i64, PenaltyState>>,
    next_auction_id: AtomicI64,
    next_bid_id: AtomicI64,
    next_purchase_id: AtomicI64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl AuctionRepository for MemoryStore {
    async fn insert_auction(&self, mut auction: Auction) -> Result<Auction, RepositoryError> {
        auction.id = Self::next_id(&self.inner.next_auction_id);
        self.inner
            .auctions
            .write()
            .insert(auction.id, auction.clone());
        Ok(auction)
    }

    async fn auction_by_id(&self, id: i64) -> Result<Option<Auction>, RepositoryError> {
        Ok(self.inner.auctions.read().get(&id).cloned())
    }

    async fn update_checked(&self, auction: &Auction) -> Result<Auction, RepositoryError> {
        let mut auctions = self.inner.auctions.write();
        let stored = auctions
            .get_mut(&auction.id)
            .ok_or_else(|| RepositoryError::backend(format!("auction {} gone", auction.id)))?;

        if stored.version != auction.version {
            return Err(RepositoryError::VersionConflict {
                auction_id: auction.id,
                expected_version: auction.version,
            });
        }

        let mut updated = auction.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn commit_bid(
        &self,
        auction: &Auction,
        bid: NewBid,
    ) -> Result<(Auction, Bid), RepositoryError> {
        let mut auctions = self.inner.auctions.write();
        let mut bids = self.inner.bids.write();

        let stored = auctions
            .get_mut(&auction.id)
            .ok_or_else(|| RepositoryError::backend(format!("auction {} gone", auction.id)))?;

        if stored.version != auction.version {
            return Err(RepositoryError::VersionConflict {
                auction_id: auction.id,
                expected_version: auction.version,
            });
        }

        let mut updated = auction.clone();
        updated.version += 1;
        *stored = updated.clone();

        let bid = Bid {
            id: Self::next_id(&self.inner.next_bid_id),
            auction_id: bid.auction_id,
            bidder_id: bid.bidder_id,
            amount: bid.amount,
            placed_at: bid.placed_at,
        };
        bids.push(bid.clone());

        Ok((updated, bid))
    }

    async fn due_for_activation(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Auction>, RepositoryError> {
        Ok(self
            .inner
            .auctions
            .read()
            .values()
            .filter(|a| a.status == AuctionStatus::Pending && a.start_time <= now)
            .cloned()
            .collect())
    }

    async fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<Auction>, RepositoryError> {
        Ok(self
            .inner
            .auctions
            .read()
            .values()
            .filter(|a| a.status == AuctionStatus::Active && a.end_time <= now)
            .cloned()
            .collect())
    }

    async fn sold_without_purchase(&self) -> Result<Vec<Auction>, RepositoryError> {
        let auctions = self.inner.auctions.read();
        let purchases = self.inner.purchases.read();
        Ok(auctions
            .values()
            .filter(|a| {
                a.status == AuctionStatus::Sold
                    && !purchases.values().any(|p| p.auction_id == a.id)
            })
            .cloned()
            .collect())
    }

    async fn active_auctions(&self, now: DateTime<Utc>) -> Result<Vec<Auction>, RepositoryError> {
        let mut auctions: Vec<Auction> = self
            .inner
            .auctions
            .read()
            .values()
            .filter(|a| a.status == AuctionStatus::Active && a.end_time > now)
            .cloned()
            .collect();
        auctions.sort_by_key(|a| a.end_time);
        Ok(auctions)
    }

    async fn auctions_by_owner(&self, owner_id: i64) -> Result<Vec<Auction>, RepositoryError> {
        let mut auctions: Vec<Auction> = self
            .inner
            .auctions
            .read()
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        auctions.sort_by_key(|a| a.id);
        Ok(auctions)
    }

    async fn delete_auction(&self, id: i64) -> Result<(), RepositoryError> {
        let mut auctions = self.inner.auctions.write();
        let mut bids = self.inner.bids.write();
        auctions.remove(&id);
        bids.retain(|b| b.auction_id != id);
        Ok(())
    }
}

#[async_trait]
impl BidRepository for MemoryStore {
    async fn bids_for_auction(&self, auction_id: i64) -> Result<Vec<Bid>, RepositoryError> {
        Ok(self
            .inner
            .bids
            .read()
            .iter()
            .filter(|b| b.auction_id == auction_id)
            .cloned()
            .collect())
    }

    async fn bids_by_bidder(&self, bidder_id: i64) -> Result<Vec<Bid>, RepositoryError> {
        Ok(self
            .inner
            .bids
            .read()
            .iter()
            .filter(|b| b.bidder_id == bidder_id)
            .cloned()
            .collect())
    }

    async fn highest_bid(&self, auction_id: i64) -> Result<Option<Bid>, RepositoryError> {
        let bids = self.inner.bids.read();
        let mut best: Option<&Bid> = None;
        for bid in bids.iter().filter(|b| b.auction_id == auction_id) {
            best = match best {
                None => Some(bid),
                // strictly greater wins; an equal later bid loses the tie-break
                Some(current) if bid.amount > current.amount => Some(bid),
                Some(current) => Some(current),
            };
        }
        Ok(best.cloned())
    }

    async fn bid_count(&self, auction_id: i64) -> Result<u64, RepositoryError> {
        Ok(self
            .inner
            .bids
            .read()
            .iter()
            .filter(|b| b.auction_id == auction_id)
            .count() as u64)
    }
}

#[async_trait]
impl PurchaseRepository for MemoryStore {
    async fn purchase_by_id(&self, id: i64) -> Result<Option<Purchase>, RepositoryError> {
        Ok(self.inner.purchases.read().get(&id).cloned())
    }

    async fn purchase_for_auction(
        &self,
        auction_id: i64,
    ) -> Result<Option<Purchase>, RepositoryError> {
        Ok(self
            .inner
            .purchases
            .read()
            .values()
            .find(|p| p.auction_id == auction_id)
            .cloned())
    }

    async fn insert_purchase(&self, purchase: NewPurchase) -> Result<Purchase, RepositoryError> {
        let mut purchases = self.inner.purchases.write();

        if purchases
            .values()
            .any(|p| p.auction_id == purchase.auction_id)
        {
            return Err(RepositoryError::DuplicatePurchase {
                auction_id: purchase.auction_id,
            });
        }

        let purchase = Purchase {
            id: Self::next_id(&self.inner.next_purchase_id),
            auction_id: purchase.auction_id,
            seller_id: purchase.seller_id,
            buyer_id: purchase.buyer_id,
            amount: purchase.amount,
            status: PurchaseStatus::PendingPayment,
            purchase_date: purchase.purchase_date,
            payment_deadline: purchase.payment_deadline,
            completed_date: None,
            payment_defaulted: false,
        };
        purchases.insert(purchase.id, purchase.clone());
        Ok(purchase)
    }

    async fn update_purchase_if_status(
        &self,
        purchase: &Purchase,
        expected: PurchaseStatus,
    ) -> Result<Purchase, RepositoryError> {
        let mut purchases = self.inner.purchases.write();
        let stored = purchases
            .get_mut(&purchase.id)
            .ok_or_else(|| RepositoryError::backend(format!("purchase {} gone", purchase.id)))?;

        if stored.status != expected {
            return Err(RepositoryError::StalePurchaseStatus {
                purchase_id: purchase.id,
            });
        }

        *stored = purchase.clone();
        Ok(purchase.clone())
    }

    async fn overdue_pending(&self, now: DateTime<Utc>) -> Result<Vec<Purchase>, RepositoryError> {
        Ok(self
            .inner
            .purchases
            .read()
            .values()
            .filter(|p| {
                p.status == PurchaseStatus::PendingPayment
                    && p.payment_deadline < now
                    && !p.payment_defaulted
            })
            .cloned()
            .collect())
    }

    async fn purchases_by_buyer(&self, buyer_id: i64) -> Result<Vec<Purchase>, RepositoryError> {
        let mut purchases: Vec<Purchase> = self
            .inner
            .purchases
            .read()
            .values()
            .filter(|p| p.buyer_id == buyer_id)
            .cloned()
            .collect();
        purchases.sort_by_key(|p| p.id);
        Ok(purchases)
    }

    async fn purchases_by_seller(&self, seller_id: i64) -> Result<Vec<Purchase>, RepositoryError> {
        let mut purchases: Vec<Purchase> = self
            .inner
            .purchases
            .read()
            .values()
            .filter(|p| p.seller_id == seller_id)
            .cloned()
            .collect();
        purchases.sort_by_key(|p| p.id);
        Ok(purchases)
    }

    async fn purchases_with_status(
        &self,
        status: PurchaseStatus,
    ) -> Result<Vec<Purchase>, RepositoryError> {
        let mut purchases: Vec<Purchase> = self
            .inner
            .purchases
            .read()
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        purchases.sort_by_key(|p| p.id);
        Ok(purchases)
    }
}

#[async_trait]
impl PenaltyRepository for MemoryStore {
    async fn penalty_for_user(&self, user_id: i64) -> Result<PenaltyState, RepositoryError> {
        Ok(self
            .inner
            .penalties
            .read()
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| PenaltyState::empty(user_id)))
    }

    async fn save_penalty(
        &self,
        state: &PenaltyState,
        _now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner
            .penalties
            .write()
            .insert(state.user_id, state.clone());
        Ok(())
    }

    async fn expired_bans(&self, now: DateTime<Utc>) -> Result<Vec<PenaltyState>, RepositoryError> {
        Ok(self
            .inner
            .penalties
            .read()
            .values()
            .filter(|p| !p.permanent_ban && p.banned_until.is_some_and(|until| until <= now))
            .cloned()
            .collect())
    }
}
