//! Overdue payment sweep job
//!
//! Periodically marks purchases past their payment deadline as defaulted
//! and escalates penalties. Single task, sequential runs, no overlap.

use std::sync::Arc;

use tokio::time::{Duration as TokioDuration, MissedTickBehavior, interval};
use tracing::info;

use crate::services::purchases::PurchaseService;

/// Start the overdue-payment sweep job.
pub fn start_payment_sweep_job(purchases: Arc<PurchaseService>, interval_secs: u64) {
    tokio::spawn(async move {
        info!(interval_secs, "payment sweep job started");

        let mut ticker = interval(TokioDuration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received, stopping payment sweep job");
                    break;
                }
                _ = ticker.tick() => {
                    purchases.process_overdue_payments().await;
                }
            }
        }

        info!("payment sweep job stopped");
    });
}
