pub mod auction_sweep;
pub mod ban_sweep;
pub mod payment_sweep;
