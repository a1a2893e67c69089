//! Migration to create the bids table
//!
//! Bid rows are insert-only; they form the audit trail for arbitration and
//! winner determination.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Bids::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bids::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(Bids::AuctionId).not_null())
                    .col(big_integer(Bids::BidderId).not_null())
                    .col(decimal_len(Bids::Amount, 19, 2).not_null())
                    .col(timestamp_with_time_zone(Bids::PlacedAt).not_null())
                    .to_owned(),
            )
            .await?;

        // Index for fetching the bid history of an auction
        manager
            .create_index(
                Index::create()
                    .name("idx_bids_auction")
                    .table(Bids::Table)
                    .col(Bids::AuctionId)
                    .to_owned(),
            )
            .await?;

        // Index for fetching a user's bids
        manager
            .create_index(
                Index::create()
                    .name("idx_bids_bidder")
                    .table(Bids::Table)
                    .col(Bids::BidderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Bids::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Bids {
    Table,
    Id,
    AuctionId,
    BidderId,
    Amount,
    PlacedAt,
}
