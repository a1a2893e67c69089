//! Bid domain model
//!
//! Bids are append-only: once committed they are never updated or deleted
//! (except cascading with an unsold auction). `placed_at` is server-assigned
//! at acceptance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: Decimal,
    pub placed_at: DateTime<Utc>,
}

/// A validated bid ready to be committed together with the auction's price
/// update.
#[derive(Debug, Clone)]
pub struct NewBid {
    pub auction_id: i64,
    pub bidder_id: i64,
    pub amount: Decimal,
    pub placed_at: DateTime<Utc>,
}
