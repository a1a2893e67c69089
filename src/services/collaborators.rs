//! Contracts consumed from the excluded subsystems
//!
//! User registration, payment-method storage and messaging live outside this
//! service; the engine only sees these narrow traits. In-memory
//! implementations cover tests and the mock-gateway deployment mode.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

/// Lookup into the excluded user subsystem.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: i64) -> bool;
}

/// Lookup into the excluded payment-method subsystem: does this payment
/// method belong to the user and has it been verified?
#[async_trait]
pub trait PaymentMethodGateway: Send + Sync {
    async fn is_verified_and_usable(&self, payment_method_id: i64, user_id: i64) -> bool;
}

/// Fire-and-forget notification hook; failures are never surfaced to the
/// engine.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn auction_sold(&self, auction_id: i64, buyer_id: i64);
    async fn payment_failed(&self, purchase_id: i64, buyer_id: i64);
    async fn user_banned(&self, user_id: i64, reason: &str);
}

/// Sink that only logs; used when no notification subsystem is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationSink;

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn auction_sold(&self, auction_id: i64, buyer_id: i64) {
        info!(auction_id, buyer_id, "auction sold");
    }

    async fn payment_failed(&self, purchase_id: i64, buyer_id: i64) {
        info!(purchase_id, buyer_id, "payment failed");
    }

    async fn user_banned(&self, user_id: i64, reason: &str) {
        info!(user_id, reason, "user banned");
    }
}

/// Directory backed by an in-memory set of registered user ids. With no ids
/// registered it treats every id as known, which is the permissive mode the
/// service runner uses until the user subsystem is attached.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashSet<i64>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            users: RwLock::new(ids.into_iter().collect()),
        }
    }

    pub fn register(&self, user_id: i64) {
        self.users.write().insert(user_id);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn exists(&self, user_id: i64) -> bool {
        let users = self.users.read();
        users.is_empty() || users.contains(&user_id)
    }
}

/// Mock gateway: payment methods are marked verified by id. Real payment
/// processing is out of scope; the production system swaps this for the
/// gateway-backed implementation.
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    verified: RwLock<HashSet<(i64, i64)>>,
    allow_all: bool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway that accepts every payment method (demo mode).
    pub fn permissive() -> Self {
        Self {
            verified: RwLock::new(HashSet::new()),
            allow_all: true,
        }
    }

    pub fn mark_verified(&self, payment_method_id: i64, user_id: i64) {
        self.verified.write().insert((payment_method_id, user_id));
    }
}

#[async_trait]
impl PaymentMethodGateway for MockPaymentGateway {
    async fn is_verified_and_usable(&self, payment_method_id: i64, user_id: i64) -> bool {
        self.allow_all || self.verified.read().contains(&(payment_method_id, user_id))
    }
}
