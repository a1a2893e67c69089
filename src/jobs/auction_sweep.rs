//! Auction expiry sweep job
//!
//! Periodically activates due auctions and closes expired ones. The loop
//! awaits each sweep before the next tick and uses delayed missed-tick
//! behavior, so two runs of this sweep can never overlap.

use std::sync::Arc;

use tokio::time::{Duration as TokioDuration, MissedTickBehavior, interval};
use tracing::info;

use crate::services::auctions::AuctionService;

/// Start the auction expiry sweep job.
///
/// Spawns a background task that runs
/// [`AuctionService::process_expired_auctions`] every `interval_secs`
/// seconds until a shutdown signal arrives.
pub fn start_auction_sweep_job(auctions: Arc<AuctionService>, interval_secs: u64) {
    tokio::spawn(async move {
        info!(interval_secs, "auction sweep job started");

        let mut ticker = interval(TokioDuration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received, stopping auction sweep job");
                    break;
                }
                _ = ticker.tick() => {
                    auctions.process_expired_auctions().await;
                }
            }
        }

        info!("auction sweep job stopped");
    });
}
