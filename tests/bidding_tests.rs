mod common;

use chrono::Duration;
use rust_decimal_macros::dec;

use auctionhouse_backend::config::EngineConfig;
use auctionhouse_backend::models::AuctionStatus;
use auctionhouse_backend::repository::AuctionRepository;
use auctionhouse_backend::services::bidding::BidError;

use common::Harness;

#[tokio::test]
async fn bid_validation_order_against_starting_price() {
    let h = Harness::new();
    let auction = h.create_active_auction(1, dec!(100.00)).await;

    // not above the current price
    let err = h.engine.bids.place_bid(auction.id, 2, dec!(99.00)).await.unwrap_err();
    assert!(matches!(err, BidError::TooLow { .. }), "{err:?}");

    // above the price but under the 1.00 increment tier
    let err = h.engine.bids.place_bid(auction.id, 2, dec!(100.50)).await.unwrap_err();
    assert!(
        matches!(err, BidError::BelowMinimumIncrement { required } if required == dec!(101.00)),
        "{err:?}"
    );

    // meets the increment
    let bid = h.engine.bids.place_bid(auction.id, 2, dec!(101.00)).await.unwrap();
    assert_eq!(bid.amount, dec!(101.00));
    assert_eq!(bid.bidder_id, 2);

    let auction = h.engine.auctions.auction_by_id(auction.id).await.unwrap();
    assert_eq!(auction.current_price, dec!(101.00));
    assert_eq!(auction.version, 1);
}

#[tokio::test]
async fn increment_tier_applies_to_current_price_not_starting_price() {
    let h = Harness::new();
    let auction = h.create_active_auction(1, dec!(100.00)).await;

    h.engine.bids.place_bid(auction.id, 2, dec!(101.00)).await.unwrap();

    // price is now 101, the 5.00 tier applies
    let err = h.engine.bids.place_bid(auction.id, 3, dec!(103.00)).await.unwrap_err();
    assert!(
        matches!(err, BidError::BelowMinimumIncrement { required } if required == dec!(106.00)),
        "{err:?}"
    );

    h.engine.bids.place_bid(auction.id, 3, dec!(106.00)).await.unwrap();
}

#[tokio::test]
async fn owner_cannot_bid_regardless_of_amount() {
    let h = Harness::new();
    let auction = h.create_active_auction(1, dec!(100.00)).await;

    for amount in [dec!(101.00), dec!(500.00), dec!(1000000.00)] {
        let err = h.engine.bids.place_bid(auction.id, 1, amount).await.unwrap_err();
        assert!(matches!(err, BidError::OwnAuction), "{err:?}");
    }
}

#[tokio::test]
async fn unknown_bidder_and_unknown_auction_are_rejected() {
    let h = Harness::new();
    let auction = h.create_active_auction(1, dec!(100.00)).await;

    let err = h.engine.bids.place_bid(auction.id, 999, dec!(101.00)).await.unwrap_err();
    assert!(matches!(err, BidError::BidderNotFound(999)), "{err:?}");

    let err = h.engine.bids.place_bid(4242, 2, dec!(101.00)).await.unwrap_err();
    assert!(matches!(err, BidError::AuctionNotFound(4242)), "{err:?}");

    // with both unknown the auction lookup is reported first
    let err = h.engine.bids.place_bid(4242, 999, dec!(101.00)).await.unwrap_err();
    assert!(matches!(err, BidError::AuctionNotFound(4242)), "{err:?}");
}

#[tokio::test]
async fn bids_rejected_outside_the_auction_window() {
    let h = Harness::new();

    // not started yet
    let pending = h
        .engine
        .auctions
        .create_auction(auctionhouse_backend::models::NewAuction {
            title: "future".into(),
            description: String::new(),
            starting_price: dec!(50.00),
            start_time: h.now() + Duration::hours(1),
            end_time: h.now() + Duration::hours(2),
            owner_id: 1,
            anti_snipe_minutes: None,
            anti_snipe_threshold_secs: 300,
        })
        .await
        .unwrap();
    assert_eq!(pending.status, AuctionStatus::Pending);

    let err = h.engine.bids.place_bid(pending.id, 2, dec!(51.00)).await.unwrap_err();
    assert!(matches!(err, BidError::NotStarted), "{err:?}");

    // past the end time, even before the expiry sweep has run
    let active = h.create_active_auction(1, dec!(50.00)).await;
    h.clock.advance(Duration::hours(2));
    let err = h.engine.bids.place_bid(active.id, 2, dec!(51.00)).await.unwrap_err();
    assert!(matches!(err, BidError::Ended), "{err:?}");
}

#[tokio::test]
async fn bids_rejected_on_non_active_status() {
    let h = Harness::new();
    let auction = h.create_active_auction(1, dec!(50.00)).await;

    h.engine.auctions.archive_auction(auction.id).await.unwrap();

    let err = h.engine.bids.place_bid(auction.id, 2, dec!(51.00)).await.unwrap_err();
    assert!(
        matches!(err, BidError::NotActive(AuctionStatus::Archived)),
        "{err:?}"
    );
}

#[tokio::test]
async fn anti_snipe_extends_and_re_evaluates_against_new_end_time() {
    let h = Harness::new();
    // ends in 4 minutes, 300s threshold, 5 minute extension
    let auction = h
        .create_anti_snipe_auction(1, dec!(50.00), Duration::minutes(4), 300, 5)
        .await;
    let original_end = auction.end_time;

    // inside the window: extends by exactly 5 minutes
    h.engine.bids.place_bid(auction.id, 2, dec!(51.00)).await.unwrap();
    let after_first = h.engine.auctions.auction_by_id(auction.id).await.unwrap();
    assert_eq!(after_first.end_time, original_end + Duration::minutes(5));
    assert_eq!(after_first.original_end_time, Some(original_end));
    assert_eq!(after_first.extension_count, 1);

    // seconds later the new end is 8m50s away, outside the threshold
    h.clock.advance(Duration::seconds(10));
    h.engine.bids.place_bid(auction.id, 3, dec!(52.00)).await.unwrap();
    let after_second = h.engine.auctions.auction_by_id(auction.id).await.unwrap();
    assert_eq!(after_second.end_time, after_first.end_time);
    assert_eq!(after_second.extension_count, 1);

    // move inside the threshold of the extended end: extends again,
    // original end time stays as captured the first time
    h.clock.set(after_second.end_time - Duration::minutes(4));
    h.engine.bids.place_bid(auction.id, 2, dec!(53.00)).await.unwrap();
    let after_third = h.engine.auctions.auction_by_id(auction.id).await.unwrap();
    assert_eq!(after_third.end_time, after_second.end_time + Duration::minutes(5));
    assert_eq!(after_third.original_end_time, Some(original_end));
    assert_eq!(after_third.extension_count, 2);
}

#[tokio::test]
async fn stale_commit_is_rejected_and_retry_validates_against_fresh_price() {
    let h = Harness::new();
    let auction = h.create_active_auction(1, dec!(100.00)).await;

    // both "transactions" read the auction at price 100 / version 0
    let stale = h.store.auction_by_id(auction.id).await.unwrap().unwrap();

    // first commit wins
    h.engine.bids.place_bid(auction.id, 2, dec!(150.00)).await.unwrap();

    // second commit carries the stale version and must be refused
    let mut losing = stale.clone();
    losing.current_price = dec!(160.00);
    let result = h
        .store
        .commit_bid(
            &losing,
            auctionhouse_backend::models::NewBid {
                auction_id: auction.id,
                bidder_id: 3,
                amount: dec!(160.00),
                placed_at: h.now(),
            },
        )
        .await;
    assert!(matches!(
        result,
        Err(auctionhouse_backend::repository::RepositoryError::VersionConflict { .. })
    ));

    // the retry path sees 150 and 160 clears the 5.00 increment over it
    h.engine.bids.place_bid(auction.id, 3, dec!(160.00)).await.unwrap();

    let auction = h.engine.auctions.auction_by_id(auction.id).await.unwrap();
    assert_eq!(auction.current_price, dec!(160.00));
    let bids = h.engine.bids.bids_for_auction(auction.id).await.unwrap();
    assert_eq!(bids.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_bids_never_commit_against_the_same_price() {
    // plenty of retries so contention alone does not exhaust the loop
    let config = EngineConfig {
        max_bid_attempts: 20,
        ..EngineConfig::default()
    };
    let h = Harness::with_config(config);
    let auction = h.create_active_auction(1, dec!(10.00)).await;

    let amounts = [
        dec!(20.00),
        dec!(40.00),
        dec!(60.00),
        dec!(80.00),
        dec!(100.00),
        dec!(120.00),
        dec!(140.00),
        dec!(160.00),
    ];

    let mut handles = Vec::new();
    for (i, amount) in amounts.into_iter().enumerate() {
        let bids = h.engine.bids.clone();
        let auction_id = auction.id;
        let bidder_id = (i + 2) as i64;
        handles.push(tokio::spawn(async move {
            bids.place_bid(auction_id, bidder_id, amount).await
        }));
    }

    let mut accepted = Vec::new();
    for handle in handles {
        if let Ok(bid) = handle.await.unwrap() {
            accepted.push(bid.amount);
        }
    }
    assert!(!accepted.is_empty());

    // exactly one ledger entry per accepted bid
    let ledger = h.engine.bids.bids_for_auction(auction.id).await.unwrap();
    assert_eq!(ledger.len(), accepted.len());

    // the ledger is strictly increasing in arrival order: every accepted
    // bid was validated against the price set by the previous one
    for pair in ledger.windows(2) {
        assert!(pair[1].amount > pair[0].amount);
    }

    let auction = h.engine.auctions.auction_by_id(auction.id).await.unwrap();
    let max_accepted = accepted.iter().copied().max().unwrap();
    assert_eq!(auction.current_price, max_accepted);
    assert_eq!(auction.version, ledger.len() as i64);
}

#[tokio::test]
async fn ledger_queries_and_winning_bid() {
    let h = Harness::new();
    let auction = h.create_active_auction(1, dec!(10.00)).await;

    h.engine.bids.place_bid(auction.id, 2, dec!(11.00)).await.unwrap();
    h.engine.bids.place_bid(auction.id, 3, dec!(12.00)).await.unwrap();
    h.engine.bids.place_bid(auction.id, 2, dec!(13.00)).await.unwrap();

    assert_eq!(h.engine.bids.bid_count(auction.id).await.unwrap(), 3);
    assert_eq!(h.engine.bids.bids_by_user(2).await.unwrap().len(), 2);

    let highest = h.engine.bids.highest_bid(auction.id).await.unwrap().unwrap();
    assert_eq!(highest.amount, dec!(13.00));
    assert_eq!(highest.bidder_id, 2);

    // no winner until the auction is sold
    let err = h.engine.bids.winning_bid(auction.id).await.unwrap_err();
    assert!(matches!(err, BidError::AuctionNotSold(_)), "{err:?}");

    h.clock.advance(Duration::hours(2));
    h.engine.auctions.process_expired_auctions().await;

    let winner = h.engine.bids.winning_bid(auction.id).await.unwrap().unwrap();
    assert_eq!(winner.amount, dec!(13.00));
    assert_eq!(winner.bidder_id, 2);
}
