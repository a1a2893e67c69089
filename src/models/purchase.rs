//! Purchase domain model
//!
//! A purchase is the payment obligation created exactly once when an auction
//! sells. It is mutated by payment submission, the overdue-payment sweep, or
//! administrative cancellation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    PendingPayment,
    PaymentFailed,
    Completed,
    Cancelled,
    Refunded,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::PendingPayment => "PENDING_PAYMENT",
            PurchaseStatus::PaymentFailed => "PAYMENT_FAILED",
            PurchaseStatus::Completed => "COMPLETED",
            PurchaseStatus::Cancelled => "CANCELLED",
            PurchaseStatus::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING_PAYMENT" => Some(PurchaseStatus::PendingPayment),
            "PAYMENT_FAILED" => Some(PurchaseStatus::PaymentFailed),
            "COMPLETED" => Some(PurchaseStatus::Completed),
            "CANCELLED" => Some(PurchaseStatus::Cancelled),
            "REFUNDED" => Some(PurchaseStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: i64,
    pub auction_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub amount: Decimal,
    pub status: PurchaseStatus,
    pub purchase_date: DateTime<Utc>,
    pub payment_deadline: DateTime<Utc>,
    pub completed_date: Option<DateTime<Utc>>,
    pub payment_defaulted: bool,
}

#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub auction_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub amount: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub payment_deadline: DateTime<Utc>,
}
