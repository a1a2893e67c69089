//! Auction domain model
//!
//! An auction moves Pending -> Active -> {Sold, Inactive}; Archived is an
//! administrative terminal state. Transitions are driven exclusively by the
//! lifecycle service, and every persisted mutation bumps `version`.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    Pending,
    Active,
    Sold,
    Inactive,
    Archived,
}

impl AuctionStatus {
    /// Terminal states are never reopened.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuctionStatus::Sold | AuctionStatus::Inactive | AuctionStatus::Archived
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Pending => "PENDING",
            AuctionStatus::Active => "ACTIVE",
            AuctionStatus::Sold => "SOLD",
            AuctionStatus::Inactive => "INACTIVE",
            AuctionStatus::Archived => "ARCHIVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(AuctionStatus::Pending),
            "ACTIVE" => Some(AuctionStatus::Active),
            "SOLD" => Some(AuctionStatus::Sold),
            "INACTIVE" => Some(AuctionStatus::Inactive),
            "ARCHIVED" => Some(AuctionStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub starting_price: Decimal,
    pub current_price: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AuctionStatus,
    pub owner_id: i64,
    /// Anti-snipe extension length; None disables the feature.
    pub anti_snipe_minutes: Option<i64>,
    /// A bid landing closer than this to end_time triggers an extension.
    pub anti_snipe_threshold_secs: i64,
    /// End time before the first anti-snipe extension, captured once.
    pub original_end_time: Option<DateTime<Utc>>,
    pub extension_count: i32,
    /// Optimistic concurrency token, incremented on every persisted write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auction {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    /// Whether a bid accepted at `now` falls inside the anti-snipe window.
    /// Evaluated against the current end_time, so a later bid can re-trigger
    /// an extension only if it lands within the threshold of the new end.
    pub fn within_anti_snipe_window(&self, now: DateTime<Utc>) -> bool {
        match self.anti_snipe_minutes {
            Some(_) => {
                self.end_time - now < Duration::seconds(self.anti_snipe_threshold_secs)
            }
            None => false,
        }
    }

    /// Apply an anti-snipe extension. The original end time is captured on
    /// the first extension and never overwritten afterwards.
    pub fn extend_end_time(&mut self) {
        if let Some(minutes) = self.anti_snipe_minutes {
            if self.original_end_time.is_none() {
                self.original_end_time = Some(self.end_time);
            }
            self.end_time += Duration::minutes(minutes);
            self.extension_count += 1;
        }
    }
}

/// Fields supplied by the caller when creating an auction; everything else
/// (status, current price, version, audit stamps) is assigned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuction {
    pub title: String,
    pub description: String,
    pub starting_price: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub owner_id: i64,
    pub anti_snipe_minutes: Option<i64>,
    pub anti_snipe_threshold_secs: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn auction(end_in_secs: i64, anti_snipe_minutes: Option<i64>) -> (Auction, DateTime<Utc>) {
        let now = Utc::now();
        let auction = Auction {
            id: 1,
            title: "Lamp".into(),
            description: String::new(),
            starting_price: dec!(100),
            current_price: dec!(100),
            start_time: now - Duration::hours(1),
            end_time: now + Duration::seconds(end_in_secs),
            status: AuctionStatus::Active,
            owner_id: 7,
            anti_snipe_minutes,
            anti_snipe_threshold_secs: 300,
            original_end_time: None,
            extension_count: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        (auction, now)
    }

    #[test]
    fn anti_snipe_window_respects_threshold() {
        let (auction, now) = auction(240, Some(5));
        assert!(auction.within_anti_snipe_window(now));

        let (auction, now) = self::auction(600, Some(5));
        assert!(!auction.within_anti_snipe_window(now));
    }

    #[test]
    fn anti_snipe_disabled_when_minutes_unset() {
        let (auction, now) = auction(10, None);
        assert!(!auction.within_anti_snipe_window(now));
    }

    #[test]
    fn extension_preserves_original_end_time() {
        let (mut auction, _) = auction(240, Some(5));
        let first_end = auction.end_time;

        auction.extend_end_time();
        assert_eq!(auction.original_end_time, Some(first_end));
        assert_eq!(auction.end_time, first_end + Duration::minutes(5));
        assert_eq!(auction.extension_count, 1);

        // second extension keeps the originally captured end time
        auction.extend_end_time();
        assert_eq!(auction.original_end_time, Some(first_end));
        assert_eq!(auction.extension_count, 2);
    }

    #[test]
    fn terminal_states() {
        assert!(AuctionStatus::Sold.is_terminal());
        assert!(AuctionStatus::Inactive.is_terminal());
        assert!(AuctionStatus::Archived.is_terminal());
        assert!(!AuctionStatus::Pending.is_terminal());
        assert!(!AuctionStatus::Active.is_terminal());
    }

    // the excluded API layer serializes statuses; the wire names must match
    // what the database stores
    #[test]
    fn status_json_matches_storage_codes() {
        for status in [
            AuctionStatus::Pending,
            AuctionStatus::Active,
            AuctionStatus::Sold,
            AuctionStatus::Inactive,
            AuctionStatus::Archived,
        ] {
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().to_string())
            );
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            AuctionStatus::Pending,
            AuctionStatus::Active,
            AuctionStatus::Sold,
            AuctionStatus::Inactive,
            AuctionStatus::Archived,
        ] {
            assert_eq!(AuctionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AuctionStatus::parse("UNKNOWN"), None);
    }
}
