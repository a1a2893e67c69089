//! SeaORM entity for the auctions table
//!
//! The version column is the optimistic concurrency token; every update is
//! conditional on it (see the Postgres repository).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "auctions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub starting_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub current_price: Decimal,
    pub start_time: DateTimeUtc,
    pub end_time: DateTimeUtc,
    pub status: String,
    pub owner_id: i64,
    pub anti_snipe_minutes: Option<i64>,
    pub anti_snipe_threshold_secs: i64,
    pub original_end_time: Option<DateTimeUtc>,
    pub extension_count: i32,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
