//! Migration to create the auctions table
//!
//! The version column is the optimistic concurrency token: every write to an
//! auction row must be conditional on the version it was read at.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Auctions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Auctions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(Auctions::Title).not_null())
                    .col(text(Auctions::Description).not_null())
                    .col(decimal_len(Auctions::StartingPrice, 19, 2).not_null())
                    .col(decimal_len(Auctions::CurrentPrice, 19, 2).not_null())
                    .col(timestamp_with_time_zone(Auctions::StartTime).not_null())
                    .col(timestamp_with_time_zone(Auctions::EndTime).not_null())
                    .col(string(Auctions::Status).not_null())
                    .col(big_integer(Auctions::OwnerId).not_null())
                    .col(big_integer_null(Auctions::AntiSnipeMinutes))
                    .col(big_integer(Auctions::AntiSnipeThresholdSecs).default(300))
                    .col(timestamp_with_time_zone_null(Auctions::OriginalEndTime))
                    .col(integer(Auctions::ExtensionCount).default(0))
                    .col(big_integer(Auctions::Version).default(0))
                    .col(timestamp_with_time_zone(Auctions::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp_with_time_zone(Auctions::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Index for the listing queries (active auctions by end time)
        manager
            .create_index(
                Index::create()
                    .name("idx_auctions_status_end_time")
                    .table(Auctions::Table)
                    .col(Auctions::Status)
                    .col(Auctions::EndTime)
                    .to_owned(),
            )
            .await?;

        // Index for querying auctions by owner
        manager
            .create_index(
                Index::create()
                    .name("idx_auctions_owner")
                    .table(Auctions::Table)
                    .col(Auctions::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Auctions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Auctions {
    Table,
    Id,
    Title,
    Description,
    StartingPrice,
    CurrentPrice,
    StartTime,
    EndTime,
    Status,
    OwnerId,
    AntiSnipeMinutes,
    AntiSnipeThresholdSecs,
    OriginalEndTime,
    ExtensionCount,
    Version,
    CreatedAt,
    UpdatedAt,
}
