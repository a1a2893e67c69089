//! Engine configuration
//!
//! All tunables are read from the environment with sensible defaults so a
//! bare `cargo run` against a local database works out of the box.

use std::env;

/// Environment variable names
pub const ENV_PAYMENT_WINDOW_HOURS: &str = "PAYMENT_WINDOW_HOURS";
pub const ENV_MAX_FAILED_PAYMENTS: &str = "MAX_FAILED_PAYMENTS";
pub const ENV_BAN_DURATION_DAYS: &str = "BAN_DURATION_DAYS";
pub const ENV_MAX_BID_ATTEMPTS: &str = "MAX_BID_ATTEMPTS";
pub const ENV_AUCTION_SWEEP_INTERVAL: &str = "AUCTION_SWEEP_INTERVAL_SECS";
pub const ENV_PAYMENT_SWEEP_INTERVAL: &str = "PAYMENT_SWEEP_INTERVAL_SECS";
pub const ENV_BAN_SWEEP_INTERVAL: &str = "BAN_SWEEP_INTERVAL_SECS";

/// Payment deadline window after a sale (48 hours = 2 days)
pub const DEFAULT_PAYMENT_WINDOW_HOURS: i64 = 48;

/// Number of payment defaults before an automatic ban
pub const DEFAULT_MAX_FAILED_PAYMENTS: u32 = 3;

/// Ban duration for repeated payment defaults
pub const DEFAULT_BAN_DURATION_DAYS: i64 = 30;

/// Bounded retries for the optimistic bid-commit loop
pub const DEFAULT_MAX_BID_ATTEMPTS: u32 = 3;

/// Auction expiry sweep interval (seconds)
pub const DEFAULT_AUCTION_SWEEP_INTERVAL_SECS: u64 = 60;

/// Overdue payment sweep interval (seconds)
pub const DEFAULT_PAYMENT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Expired ban sweep interval (seconds)
pub const DEFAULT_BAN_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Runtime configuration for the auction engine and its sweeps.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub payment_window_hours: i64,
    pub max_failed_payments: u32,
    pub ban_duration_days: i64,
    pub max_bid_attempts: u32,
    pub auction_sweep_interval_secs: u64,
    pub payment_sweep_interval_secs: u64,
    pub ban_sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payment_window_hours: DEFAULT_PAYMENT_WINDOW_HOURS,
            max_failed_payments: DEFAULT_MAX_FAILED_PAYMENTS,
            ban_duration_days: DEFAULT_BAN_DURATION_DAYS,
            max_bid_attempts: DEFAULT_MAX_BID_ATTEMPTS,
            auction_sweep_interval_secs: DEFAULT_AUCTION_SWEEP_INTERVAL_SECS,
            payment_sweep_interval_secs: DEFAULT_PAYMENT_SWEEP_INTERVAL_SECS,
            ban_sweep_interval_secs: DEFAULT_BAN_SWEEP_INTERVAL_SECS,
        }
    }
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self {
            payment_window_hours: env_or(ENV_PAYMENT_WINDOW_HOURS, DEFAULT_PAYMENT_WINDOW_HOURS),
            max_failed_payments: env_or(ENV_MAX_FAILED_PAYMENTS, DEFAULT_MAX_FAILED_PAYMENTS),
            ban_duration_days: env_or(ENV_BAN_DURATION_DAYS, DEFAULT_BAN_DURATION_DAYS),
            max_bid_attempts: env_or(ENV_MAX_BID_ATTEMPTS, DEFAULT_MAX_BID_ATTEMPTS),
            auction_sweep_interval_secs: env_or(
                ENV_AUCTION_SWEEP_INTERVAL,
                DEFAULT_AUCTION_SWEEP_INTERVAL_SECS,
            ),
            payment_sweep_interval_secs: env_or(
                ENV_PAYMENT_SWEEP_INTERVAL,
                DEFAULT_PAYMENT_SWEEP_INTERVAL_SECS,
            ),
            ban_sweep_interval_secs: env_or(
                ENV_BAN_SWEEP_INTERVAL,
                DEFAULT_BAN_SWEEP_INTERVAL_SECS,
            ),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
