//! User penalty state
//!
//! The slice of the user record the payment enforcer owns: default counters
//! and ban bookkeeping. Rows are created lazily on the first default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyState {
    pub user_id: i64,
    /// Total payment defaults; only ever incremented.
    pub non_payment_count: u32,
    pub banned_until: Option<DateTime<Utc>>,
    pub ban_reason: Option<String>,
    /// Set by an admin collaborator; automatic escalation never touches a
    /// permanently banned user.
    pub permanent_ban: bool,
}

impl PenaltyState {
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            non_payment_count: 0,
            banned_until: None,
            ban_reason: None,
            permanent_ban: false,
        }
    }

    pub fn is_banned(&self, now: DateTime<Utc>) -> bool {
        self.permanent_ban || self.banned_until.is_some_and(|until| until > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn temporary_ban_expires() {
        let now = Utc::now();
        let mut state = PenaltyState::empty(1);
        assert!(!state.is_banned(now));

        state.banned_until = Some(now + Duration::days(30));
        assert!(state.is_banned(now));
        assert!(!state.is_banned(now + Duration::days(31)));
    }

    #[test]
    fn permanent_ban_never_expires() {
        let now = Utc::now();
        let state = PenaltyState {
            permanent_ban: true,
            ..PenaltyState::empty(1)
        };
        assert!(state.is_banned(now + Duration::days(10_000)));
    }
}
