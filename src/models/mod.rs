pub mod auction;
pub mod bid;
pub mod error;
pub mod penalty;
pub mod purchase;

pub use auction::{Auction, AuctionStatus, NewAuction};
pub use bid::{Bid, NewBid};
pub use error::ErrorKind;
pub use penalty::PenaltyState;
pub use purchase::{NewPurchase, Purchase, PurchaseStatus};
