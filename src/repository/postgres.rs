//! Postgres-backed store over SeaORM
//!
//! Conditional writes are expressed as `UPDATE ... WHERE id = ? AND
//! version = ?` (respectively `AND status = ?` for purchases) with the
//! rows-affected count deciding whether the caller lost a race.
//! `commit_bid` runs the conditional price update and the bid insert in one
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait,
};

use crate::entities::{auctions, bids, purchases, user_penalties};
use crate::models::{
    Auction, AuctionStatus, Bid, NewBid, NewPurchase, PenaltyState, Purchase, PurchaseStatus,
};
use crate::repository::{
    AuctionRepository, BidRepository, PenaltyRepository, PurchaseRepository, RepositoryError,
};

#[derive(Clone)]
pub struct PostgresStore {
    db: DatabaseConnection,
}

impl PostgresStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn auction_from_model(model: auctions::Model) -> Result<Auction, RepositoryError> {
    let status = AuctionStatus::parse(&model.status).ok_or_else(|| {
        RepositoryError::Backend(format!(
            "invalid status '{}' on auction {}",
            model.status, model.id
        ))
    })?;
    Ok(Auction {
        id: model.id,
        title: model.title,
        description: model.description,
        starting_price: model.starting_price,
        current_price: model.current_price,
        start_time: model.start_time,
        end_time: model.end_time,
        status,
        owner_id: model.owner_id,
        anti_snipe_minutes: model.anti_snipe_minutes,
        anti_snipe_threshold_secs: model.anti_snipe_threshold_secs,
        original_end_time: model.original_end_time,
        extension_count: model.extension_count,
        version: model.version,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

fn bid_from_model(model: bids::Model) -> Bid {
    Bid {
        id: model.id,
        auction_id: model.auction_id,
        bidder_id: model.bidder_id,
        amount: model.amount,
        placed_at: model.placed_at,
    }
}

fn purchase_from_model(model: purchases::Model) -> Result<Purchase, RepositoryError> {
    let status = PurchaseStatus::parse(&model.status).ok_or_else(|| {
        RepositoryError::Backend(format!(
            "invalid status '{}' on purchase {}",
            model.status, model.id
        ))
    })?;
    Ok(Purchase {
        id: model.id,
        auction_id: model.auction_id,
        seller_id: model.seller_id,
        buyer_id: model.buyer_id,
        amount: model.amount,
        status,
        purchase_date: model.purchase_date,
        payment_deadline: model.payment_deadline,
        completed_date: model.completed_date,
        payment_defaulted: model.payment_defaulted,
    })
}

fn penalty_from_model(model: user_penalties::Model) -> PenaltyState {
    PenaltyState {
        user_id: model.user_id,
        non_payment_count: model.non_payment_count.max(0) as u32,
        banned_until: model.banned_until,
        ban_reason: model.ban_reason,
        permanent_ban: model.permanent_ban,
    }
}

#[async_trait]
impl AuctionRepository for PostgresStore {
    async fn insert_auction(&self, auction: Auction) -> Result<Auction, RepositoryError> {
        let model = auctions::ActiveModel {
            title: Set(auction.title.clone()),
            description: Set(auction.description.clone()),
            starting_price: Set(auction.starting_price),
            current_price: Set(auction.current_price),
            start_time: Set(auction.start_time),
            end_time: Set(auction.end_time),
            status: Set(auction.status.as_str().to_string()),
            owner_id: Set(auction.owner_id),
            anti_snipe_minutes: Set(auction.anti_snipe_minutes),
            anti_snipe_threshold_secs: Set(auction.anti_snipe_threshold_secs),
            original_end_time: Set(auction.original_end_time),
            extension_count: Set(auction.extension_count),
            version: Set(auction.version),
            created_at: Set(auction.created_at),
            updated_at: Set(auction.updated_at),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(RepositoryError::backend)?;

        auction_from_model(model)
    }

    async fn auction_by_id(&self, id: i64) -> Result<Option<Auction>, RepositoryError> {
        auctions::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .map(auction_from_model)
            .transpose()
    }

    async fn update_checked(&self, auction: &Auction) -> Result<Auction, RepositoryError> {
        let result = auctions::Entity::update_many()
            .col_expr(auctions::Column::Title, Expr::value(auction.title.clone()))
            .col_expr(
                auctions::Column::Description,
                Expr::value(auction.description.clone()),
            )
            .col_expr(
                auctions::Column::StartingPrice,
                Expr::value(auction.starting_price),
            )
            .col_expr(
                auctions::Column::CurrentPrice,
                Expr::value(auction.current_price),
            )
            .col_expr(auctions::Column::StartTime, Expr::value(auction.start_time))
            .col_expr(auctions::Column::EndTime, Expr::value(auction.end_time))
            .col_expr(
                auctions::Column::Status,
                Expr::value(auction.status.as_str()),
            )
            .col_expr(
                auctions::Column::AntiSnipeMinutes,
                Expr::value(auction.anti_snipe_minutes),
            )
            .col_expr(
                auctions::Column::OriginalEndTime,
                Expr::value(auction.original_end_time),
            )
            .col_expr(
                auctions::Column::ExtensionCount,
                Expr::value(auction.extension_count),
            )
            .col_expr(auctions::Column::UpdatedAt, Expr::value(auction.updated_at))
            .col_expr(auctions::Column::Version, Expr::value(auction.version + 1))
            .filter(auctions::Column::Id.eq(auction.id))
            .filter(auctions::Column::Version.eq(auction.version))
            .exec(&self.db)
            .await
            .map_err(RepositoryError::backend)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::VersionConflict {
                auction_id: auction.id,
                expected_version: auction.version,
            });
        }

        let mut updated = auction.clone();
        updated.version += 1;
        Ok(updated)
    }

    async fn commit_bid(
        &self,
        auction: &Auction,
        bid: NewBid,
    ) -> Result<(Auction, Bid), RepositoryError> {
        let txn = self.db.begin().await.map_err(RepositoryError::backend)?;

        let result = auctions::Entity::update_many()
            .col_expr(
                auctions::Column::CurrentPrice,
                Expr::value(auction.current_price),
            )
            .col_expr(auctions::Column::EndTime, Expr::value(auction.end_time))
            .col_expr(
                auctions::Column::OriginalEndTime,
                Expr::value(auction.original_end_time),
            )
            .col_expr(
                auctions::Column::ExtensionCount,
                Expr::value(auction.extension_count),
            )
            .col_expr(auctions::Column::UpdatedAt, Expr::value(bid.placed_at))
            .col_expr(auctions::Column::Version, Expr::value(auction.version + 1))
            .filter(auctions::Column::Id.eq(auction.id))
            .filter(auctions::Column::Version.eq(auction.version))
            .exec(&txn)
            .await
            .map_err(RepositoryError::backend)?;

        if result.rows_affected == 0 {
            txn.rollback().await.map_err(RepositoryError::backend)?;
            return Err(RepositoryError::VersionConflict {
                auction_id: auction.id,
                expected_version: auction.version,
            });
        }

        let bid_model = bids::ActiveModel {
            auction_id: Set(bid.auction_id),
            bidder_id: Set(bid.bidder_id),
            amount: Set(bid.amount),
            placed_at: Set(bid.placed_at),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(RepositoryError::backend)?;

        txn.commit().await.map_err(RepositoryError::backend)?;

        let mut updated = auction.clone();
        updated.version += 1;
        Ok((updated, bid_from_model(bid_model)))
    }

    async fn due_for_activation(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Auction>, RepositoryError> {
        auctions::Entity::find()
            .filter(auctions::Column::Status.eq(AuctionStatus::Pending.as_str()))
            .filter(auctions::Column::StartTime.lte(now))
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(auction_from_model)
            .collect()
    }

    async fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<Auction>, RepositoryError> {
        auctions::Entity::find()
            .filter(auctions::Column::Status.eq(AuctionStatus::Active.as_str()))
            .filter(auctions::Column::EndTime.lte(now))
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(auction_from_model)
            .collect()
    }

    async fn sold_without_purchase(&self) -> Result<Vec<Auction>, RepositoryError> {
        auctions::Entity::find()
            .filter(auctions::Column::Status.eq(AuctionStatus::Sold.as_str()))
            .filter(
                auctions::Column::Id.not_in_subquery(
                    Query::select()
                        .column(purchases::Column::AuctionId)
                        .from(purchases::Entity)
                        .to_owned(),
                ),
            )
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(auction_from_model)
            .collect()
    }

    async fn active_auctions(&self, now: DateTime<Utc>) -> Result<Vec<Auction>, RepositoryError> {
        auctions::Entity::find()
            .filter(auctions::Column::Status.eq(AuctionStatus::Active.as_str()))
            .filter(auctions::Column::EndTime.gt(now))
            .order_by_asc(auctions::Column::EndTime)
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(auction_from_model)
            .collect()
    }

    async fn auctions_by_owner(&self, owner_id: i64) -> Result<Vec<Auction>, RepositoryError> {
        auctions::Entity::find()
            .filter(auctions::Column::OwnerId.eq(owner_id))
            .order_by_asc(auctions::Column::Id)
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(auction_from_model)
            .collect()
    }

    async fn delete_auction(&self, id: i64) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await.map_err(RepositoryError::backend)?;

        bids::Entity::delete_many()
            .filter(bids::Column::AuctionId.eq(id))
            .exec(&txn)
            .await
            .map_err(RepositoryError::backend)?;

        auctions::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(RepositoryError::backend)?;

        txn.commit().await.map_err(RepositoryError::backend)
    }
}

#[async_trait]
impl BidRepository for PostgresStore {
    async fn bids_for_auction(&self, auction_id: i64) -> Result<Vec<Bid>, RepositoryError> {
        Ok(bids::Entity::find()
            .filter(bids::Column::AuctionId.eq(auction_id))
            .order_by_asc(bids::Column::Id)
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(bid_from_model)
            .collect())
    }

    async fn bids_by_bidder(&self, bidder_id: i64) -> Result<Vec<Bid>, RepositoryError> {
        Ok(bids::Entity::find()
            .filter(bids::Column::BidderId.eq(bidder_id))
            .order_by_asc(bids::Column::Id)
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(bid_from_model)
            .collect())
    }

    async fn highest_bid(&self, auction_id: i64) -> Result<Option<Bid>, RepositoryError> {
        Ok(bids::Entity::find()
            .filter(bids::Column::AuctionId.eq(auction_id))
            .order_by_desc(bids::Column::Amount)
            .order_by_asc(bids::Column::PlacedAt)
            .one(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .map(bid_from_model))
    }

    async fn bid_count(&self, auction_id: i64) -> Result<u64, RepositoryError> {
        bids::Entity::find()
            .filter(bids::Column::AuctionId.eq(auction_id))
            .count(&self.db)
            .await
            .map_err(RepositoryError::backend)
    }
}

#[async_trait]
impl PurchaseRepository for PostgresStore {
    async fn purchase_by_id(&self, id: i64) -> Result<Option<Purchase>, RepositoryError> {
        purchases::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .map(purchase_from_model)
            .transpose()
    }

    async fn purchase_for_auction(
        &self,
        auction_id: i64,
    ) -> Result<Option<Purchase>, RepositoryError> {
        purchases::Entity::find()
            .filter(purchases::Column::AuctionId.eq(auction_id))
            .one(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .map(purchase_from_model)
            .transpose()
    }

    async fn insert_purchase(&self, purchase: NewPurchase) -> Result<Purchase, RepositoryError> {
        let inserted = purchases::ActiveModel {
            auction_id: Set(purchase.auction_id),
            seller_id: Set(purchase.seller_id),
            buyer_id: Set(purchase.buyer_id),
            amount: Set(purchase.amount),
            status: Set(PurchaseStatus::PendingPayment.as_str().to_string()),
            purchase_date: Set(purchase.purchase_date),
            payment_deadline: Set(purchase.payment_deadline),
            completed_date: Set(None),
            payment_defaulted: Set(false),
            ..Default::default()
        }
        .insert(&self.db)
        .await;

        match inserted {
            Ok(model) => purchase_from_model(model),
            // the unique index on auction_id turns a concurrent double-create
            // into a detectable duplicate
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(RepositoryError::DuplicatePurchase {
                    auction_id: purchase.auction_id,
                })
            }
            Err(err) => Err(RepositoryError::backend(err)),
        }
    }

    async fn update_purchase_if_status(
        &self,
        purchase: &Purchase,
        expected: PurchaseStatus,
    ) -> Result<Purchase, RepositoryError> {
        let result = purchases::Entity::update_many()
            .col_expr(
                purchases::Column::Status,
                Expr::value(purchase.status.as_str()),
            )
            .col_expr(
                purchases::Column::CompletedDate,
                Expr::value(purchase.completed_date),
            )
            .col_expr(
                purchases::Column::PaymentDefaulted,
                Expr::value(purchase.payment_defaulted),
            )
            .filter(purchases::Column::Id.eq(purchase.id))
            .filter(purchases::Column::Status.eq(expected.as_str()))
            .exec(&self.db)
            .await
            .map_err(RepositoryError::backend)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::StalePurchaseStatus {
                purchase_id: purchase.id,
            });
        }

        Ok(purchase.clone())
    }

    async fn overdue_pending(&self, now: DateTime<Utc>) -> Result<Vec<Purchase>, RepositoryError> {
        purchases::Entity::find()
            .filter(purchases::Column::Status.eq(PurchaseStatus::PendingPayment.as_str()))
            .filter(purchases::Column::PaymentDeadline.lt(now))
            .filter(purchases::Column::PaymentDefaulted.eq(false))
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(purchase_from_model)
            .collect()
    }

    async fn purchases_by_buyer(&self, buyer_id: i64) -> Result<Vec<Purchase>, RepositoryError> {
        purchases::Entity::find()
            .filter(purchases::Column::BuyerId.eq(buyer_id))
            .order_by_asc(purchases::Column::Id)
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(purchase_from_model)
            .collect()
    }

    async fn purchases_by_seller(&self, seller_id: i64) -> Result<Vec<Purchase>, RepositoryError> {
        purchases::Entity::find()
            .filter(purchases::Column::SellerId.eq(seller_id))
            .order_by_asc(purchases::Column::Id)
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(purchase_from_model)
            .collect()
    }

    async fn purchases_with_status(
        &self,
        status: PurchaseStatus,
    ) -> Result<Vec<Purchase>, RepositoryError> {
        purchases::Entity::find()
            .filter(purchases::Column::Status.eq(status.as_str()))
            .order_by_asc(purchases::Column::Id)
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(purchase_from_model)
            .collect()
    }
}

#[async_trait]
impl PenaltyRepository for PostgresStore {
    async fn penalty_for_user(&self, user_id: i64) -> Result<PenaltyState, RepositoryError> {
        Ok(user_penalties::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .map(penalty_from_model)
            .unwrap_or_else(|| PenaltyState::empty(user_id)))
    }

    async fn save_penalty(
        &self,
        state: &PenaltyState,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let existing = user_penalties::Entity::find_by_id(state.user_id)
            .one(&self.db)
            .await
            .map_err(RepositoryError::backend)?;

        if existing.is_some() {
            user_penalties::Entity::update_many()
                .col_expr(
                    user_penalties::Column::NonPaymentCount,
                    Expr::value(state.non_payment_count as i32),
                )
                .col_expr(
                    user_penalties::Column::BannedUntil,
                    Expr::value(state.banned_until),
                )
                .col_expr(
                    user_penalties::Column::BanReason,
                    Expr::value(state.ban_reason.clone()),
                )
                .col_expr(
                    user_penalties::Column::PermanentBan,
                    Expr::value(state.permanent_ban),
                )
                .col_expr(user_penalties::Column::UpdatedAt, Expr::value(now))
                .filter(user_penalties::Column::UserId.eq(state.user_id))
                .exec(&self.db)
                .await
                .map_err(RepositoryError::backend)?;
        } else {
            user_penalties::ActiveModel {
                user_id: Set(state.user_id),
                non_payment_count: Set(state.non_payment_count as i32),
                banned_until: Set(state.banned_until),
                ban_reason: Set(state.ban_reason.clone()),
                permanent_ban: Set(state.permanent_ban),
                updated_at: Set(now),
            }
            .insert(&self.db)
            .await
            .map_err(RepositoryError::backend)?;
        }

        Ok(())
    }

    async fn expired_bans(&self, now: DateTime<Utc>) -> Result<Vec<PenaltyState>, RepositoryError> {
        Ok(user_penalties::Entity::find()
            .filter(user_penalties::Column::PermanentBan.eq(false))
            .filter(user_penalties::Column::BannedUntil.lte(now))
            .all(&self.db)
            .await
            .map_err(RepositoryError::backend)?
            .into_iter()
            .map(penalty_from_model)
            .collect())
    }
}
