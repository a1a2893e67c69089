pub use super::auctions::Entity as Auctions;
pub use super::bids::Entity as Bids;
pub use super::purchases::Entity as Purchases;
pub use super::user_penalties::Entity as UserPenalties;
