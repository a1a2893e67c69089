//! Ban expiry sweep job
//!
//! Low-frequency sweep lifting temporary bans whose period has lapsed.

use std::sync::Arc;

use tokio::time::{Duration as TokioDuration, MissedTickBehavior, interval};
use tracing::info;

use crate::services::purchases::PurchaseService;

/// Start the ban-expiry sweep job.
pub fn start_ban_sweep_job(purchases: Arc<PurchaseService>, interval_secs: u64) {
    tokio::spawn(async move {
        info!(interval_secs, "ban sweep job started");

        let mut ticker = interval(TokioDuration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received, stopping ban sweep job");
                    break;
                }
                _ = ticker.tick() => {
                    purchases.clear_expired_bans().await;
                }
            }
        }

        info!("ban sweep job stopped");
    });
}
