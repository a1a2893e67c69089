//! Migration to create the purchases table
//!
//! The unique index on auction_id backs the at-most-one-purchase-per-auction
//! guarantee; concurrent creation attempts resolve through it.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Purchases::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Purchases::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(big_integer(Purchases::AuctionId).not_null())
                    .col(big_integer(Purchases::SellerId).not_null())
                    .col(big_integer(Purchases::BuyerId).not_null())
                    .col(decimal_len(Purchases::Amount, 19, 2).not_null())
                    .col(string(Purchases::Status).not_null())
                    .col(timestamp_with_time_zone(Purchases::PurchaseDate).not_null())
                    .col(timestamp_with_time_zone(Purchases::PaymentDeadline).not_null())
                    .col(timestamp_with_time_zone_null(Purchases::CompletedDate))
                    .col(boolean(Purchases::PaymentDefaulted).default(false))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchases_auction")
                    .table(Purchases::Table)
                    .col(Purchases::AuctionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_purchases_buyer")
                    .table(Purchases::Table)
                    .col(Purchases::BuyerId)
                    .to_owned(),
            )
            .await?;

        // Index for the overdue-payment sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_purchases_status_deadline")
                    .table(Purchases::Table)
                    .col(Purchases::Status)
                    .col(Purchases::PaymentDeadline)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Purchases::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Purchases {
    Table,
    Id,
    AuctionId,
    SellerId,
    BuyerId,
    Amount,
    Status,
    PurchaseDate,
    PaymentDeadline,
    CompletedDate,
    PaymentDefaulted,
}
