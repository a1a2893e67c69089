//! Error taxonomy shared with the API layer
//!
//! Service error enums each expose `kind()` returning one of these, so the
//! excluded HTTP layer can map failures to protocol codes without matching
//! on every service-specific variant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Referenced auction/purchase/user does not exist
    NotFound,
    /// Operation invalid for the record's current lifecycle state
    WrongState,
    /// Malformed or out-of-range input (too-low bid, bad time range, ...)
    Validation,
    /// Actor lacks rights over the resource
    Unauthorized,
    /// Optimistic-lock retries exhausted; caller may retry
    ConcurrentConflict,
    /// Time-bound operation attempted after its deadline
    DeadlinePassed,
    /// Storage or other infrastructure failure
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::WrongState => "WRONG_STATE",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::ConcurrentConflict => "CONCURRENT_CONFLICT",
            ErrorKind::DeadlinePassed => "DEADLINE_PASSED",
            ErrorKind::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}
