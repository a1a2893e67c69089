//! SeaORM entity for the purchases table
//!
//! auction_id carries a unique index: at most one purchase per auction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub auction_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub amount: Decimal,
    pub status: String,
    pub purchase_date: DateTimeUtc,
    pub payment_deadline: DateTimeUtc,
    pub completed_date: Option<DateTimeUtc>,
    pub payment_defaulted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
