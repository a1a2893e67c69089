mod common;

use chrono::Duration;
use rust_decimal_macros::dec;

use auctionhouse_backend::models::{PenaltyState, PurchaseStatus};
use auctionhouse_backend::repository::PenaltyRepository;
use auctionhouse_backend::services::purchases::PurchaseError;

use common::Harness;

#[tokio::test]
async fn payment_completes_a_pending_purchase() {
    let h = Harness::new();
    let purchase = h.sold_purchase(1, 2, dec!(150.00)).await;
    h.gateway.mark_verified(7, 2);

    let paid = h.engine.purchases.submit_payment(purchase.id, 2, 7).await.unwrap();
    assert_eq!(paid.status, PurchaseStatus::Completed);
    assert_eq!(paid.completed_date, Some(h.now()));

    // a second submission finds the purchase no longer pending
    let err = h.engine.purchases.submit_payment(purchase.id, 2, 7).await.unwrap_err();
    assert!(
        matches!(err, PurchaseError::WrongState(PurchaseStatus::Completed)),
        "{err:?}"
    );
}

#[tokio::test]
async fn payment_rejected_for_wrong_buyer_or_unverified_method() {
    let h = Harness::new();
    let purchase = h.sold_purchase(1, 2, dec!(150.00)).await;

    let err = h.engine.purchases.submit_payment(purchase.id, 3, 7).await.unwrap_err();
    assert!(matches!(err, PurchaseError::NotBuyer), "{err:?}");

    // method 7 was never verified for buyer 2
    let err = h.engine.purchases.submit_payment(purchase.id, 2, 7).await.unwrap_err();
    assert!(matches!(err, PurchaseError::PaymentMethodRejected), "{err:?}");

    // a method verified for someone else does not count
    h.gateway.mark_verified(7, 3);
    let err = h.engine.purchases.submit_payment(purchase.id, 2, 7).await.unwrap_err();
    assert!(matches!(err, PurchaseError::PaymentMethodRejected), "{err:?}");
}

#[tokio::test]
async fn payment_rejected_after_the_deadline() {
    let h = Harness::new();
    let purchase = h.sold_purchase(1, 2, dec!(150.00)).await;
    h.gateway.mark_verified(7, 2);

    h.clock.advance(Duration::hours(48));
    let err = h.engine.purchases.submit_payment(purchase.id, 2, 7).await.unwrap_err();
    assert!(matches!(err, PurchaseError::DeadlinePassed), "{err:?}");
}

#[tokio::test]
async fn overdue_sweep_defaults_the_purchase_and_counts_it() {
    let h = Harness::new();
    let purchase = h.sold_purchase(1, 2, dec!(150.00)).await;

    // not yet overdue
    let stats = h.engine.purchases.process_overdue_payments().await;
    assert_eq!(stats.defaulted, 0);

    h.clock.advance(Duration::hours(48) + Duration::seconds(1));
    let stats = h.engine.purchases.process_overdue_payments().await;
    assert_eq!(stats.defaulted, 1);
    assert_eq!(stats.bans_issued, 0);

    let defaulted = h
        .engine
        .purchases
        .purchase_by_id(purchase.id, 2, false)
        .await
        .unwrap();
    assert_eq!(defaulted.status, PurchaseStatus::PaymentFailed);
    assert!(defaulted.payment_defaulted);

    let penalty = h.store.penalty_for_user(2).await.unwrap();
    assert_eq!(penalty.non_payment_count, 1);
    assert!(penalty.banned_until.is_none());

    // already defaulted, the next sweep does not touch it again
    let stats = h.engine.purchases.process_overdue_payments().await;
    assert_eq!(stats.defaulted, 0);
    let penalty = h.store.penalty_for_user(2).await.unwrap();
    assert_eq!(penalty.non_payment_count, 1);
}

#[tokio::test]
async fn third_default_bans_the_buyer_for_the_configured_period() {
    let h = Harness::new();
    for _ in 0..3 {
        h.sold_purchase(1, 2, dec!(150.00)).await;
    }

    h.clock.advance(Duration::hours(48) + Duration::seconds(1));
    let stats = h.engine.purchases.process_overdue_payments().await;
    assert_eq!(stats.defaulted, 3);
    assert_eq!(stats.bans_issued, 1);

    let penalty = h.store.penalty_for_user(2).await.unwrap();
    assert_eq!(penalty.non_payment_count, 3);
    assert_eq!(penalty.banned_until, Some(h.now() + Duration::days(30)));
    let reason = penalty.ban_reason.clone().expect("ban reason recorded");
    assert!(reason.contains("3 failed payments"), "{reason}");
    assert!(penalty.is_banned(h.now()));
}

#[tokio::test]
async fn an_existing_longer_ban_is_never_shortened() {
    let h = Harness::new();
    let existing_until = h.now() + Duration::days(90);
    h.store
        .save_penalty(
            &PenaltyState {
                user_id: 2,
                non_payment_count: 5,
                banned_until: Some(existing_until),
                ban_reason: Some("manual ban".into()),
                permanent_ban: false,
            },
            h.now(),
        )
        .await
        .unwrap();

    h.sold_purchase(1, 2, dec!(150.00)).await;
    h.clock.advance(Duration::hours(48) + Duration::seconds(1));
    let stats = h.engine.purchases.process_overdue_payments().await;
    assert_eq!(stats.defaulted, 1);
    assert_eq!(stats.bans_issued, 0);

    let penalty = h.store.penalty_for_user(2).await.unwrap();
    assert_eq!(penalty.non_payment_count, 6);
    assert_eq!(penalty.banned_until, Some(existing_until));
    assert_eq!(penalty.ban_reason.as_deref(), Some("manual ban"));
}

#[tokio::test]
async fn a_permanent_ban_is_never_replaced() {
    let h = Harness::new();
    h.store
        .save_penalty(
            &PenaltyState {
                user_id: 2,
                non_payment_count: 5,
                banned_until: None,
                ban_reason: Some("fraud".into()),
                permanent_ban: true,
            },
            h.now(),
        )
        .await
        .unwrap();

    h.sold_purchase(1, 2, dec!(150.00)).await;
    h.clock.advance(Duration::hours(48) + Duration::seconds(1));
    let stats = h.engine.purchases.process_overdue_payments().await;
    assert_eq!(stats.defaulted, 1);
    assert_eq!(stats.bans_issued, 0);

    let penalty = h.store.penalty_for_user(2).await.unwrap();
    assert_eq!(penalty.non_payment_count, 6);
    assert!(penalty.banned_until.is_none());
    assert!(penalty.permanent_ban);
    assert!(penalty.is_banned(h.now() + Duration::days(10_000)));
}

#[tokio::test]
async fn ban_sweep_clears_only_lapsed_temporary_bans() {
    let h = Harness::new();
    for _ in 0..3 {
        h.sold_purchase(1, 2, dec!(150.00)).await;
    }
    h.clock.advance(Duration::hours(48) + Duration::seconds(1));
    h.engine.purchases.process_overdue_payments().await;
    assert!(h.store.penalty_for_user(2).await.unwrap().is_banned(h.now()));

    // ban still running
    h.clock.advance(Duration::days(1));
    let stats = h.engine.purchases.clear_expired_bans().await;
    assert_eq!(stats.cleared, 0);

    h.clock.advance(Duration::days(30));
    let stats = h.engine.purchases.clear_expired_bans().await;
    assert_eq!(stats.cleared, 1);

    let penalty = h.store.penalty_for_user(2).await.unwrap();
    assert!(penalty.banned_until.is_none());
    assert!(penalty.ban_reason.is_none());
    // the default history survives the ban
    assert_eq!(penalty.non_payment_count, 3);
    assert!(!penalty.is_banned(h.now()));
}

#[tokio::test]
async fn defaulted_purchase_cannot_be_paid_afterwards() {
    let h = Harness::new();
    let purchase = h.sold_purchase(1, 2, dec!(150.00)).await;
    h.gateway.mark_verified(7, 2);

    h.clock.advance(Duration::hours(48) + Duration::seconds(1));
    h.engine.purchases.process_overdue_payments().await;

    let err = h.engine.purchases.submit_payment(purchase.id, 2, 7).await.unwrap_err();
    assert!(
        matches!(err, PurchaseError::WrongState(PurchaseStatus::PaymentFailed)),
        "{err:?}"
    );
}

#[tokio::test]
async fn cancellation_rules() {
    let h = Harness::new();
    let purchase = h.sold_purchase(1, 2, dec!(150.00)).await;

    let cancelled = h
        .engine
        .purchases
        .cancel_purchase(purchase.id, "seller agreed")
        .await
        .unwrap();
    assert_eq!(cancelled.status, PurchaseStatus::Cancelled);

    // completed purchases can only be refunded, not cancelled
    let paid = h.sold_purchase(3, 4, dec!(80.00)).await;
    h.gateway.mark_verified(9, 4);
    h.engine.purchases.submit_payment(paid.id, 4, 9).await.unwrap();
    let err = h
        .engine
        .purchases
        .cancel_purchase(paid.id, "too late")
        .await
        .unwrap_err();
    assert!(matches!(err, PurchaseError::CannotCancelCompleted(_)), "{err:?}");
}

#[tokio::test]
async fn purchase_visibility_and_listings() {
    let h = Harness::new();
    let purchase = h.sold_purchase(1, 2, dec!(150.00)).await;

    // buyer, seller and admin may read it
    h.engine.purchases.purchase_by_id(purchase.id, 2, false).await.unwrap();
    h.engine.purchases.purchase_by_id(purchase.id, 1, false).await.unwrap();
    h.engine.purchases.purchase_by_id(purchase.id, 5, true).await.unwrap();

    let err = h
        .engine
        .purchases
        .purchase_by_id(purchase.id, 5, false)
        .await
        .unwrap_err();
    assert!(matches!(err, PurchaseError::Unauthorized), "{err:?}");

    let err = h.engine.purchases.purchase_by_id(424242, 2, true).await.unwrap_err();
    assert!(matches!(err, PurchaseError::NotFound(_)), "{err:?}");

    assert_eq!(h.engine.purchases.purchases_by_buyer(2).await.unwrap().len(), 1);
    assert_eq!(h.engine.purchases.sales_by_seller(1).await.unwrap().len(), 1);
    assert_eq!(h.engine.purchases.pending_payments().await.unwrap().len(), 1);
}
