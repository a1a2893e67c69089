//! Migration to create the user_penalties table
//!
//! Tracks payment defaults and ban state per user. Rows are created lazily on
//! the first default.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserPenalties::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPenalties::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(integer(UserPenalties::NonPaymentCount).default(0))
                    .col(timestamp_with_time_zone_null(UserPenalties::BannedUntil))
                    .col(string_null(UserPenalties::BanReason))
                    .col(boolean(UserPenalties::PermanentBan).default(false))
                    .col(timestamp_with_time_zone(UserPenalties::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        // Index for the ban-expiry sweep
        manager
            .create_index(
                Index::create()
                    .name("idx_user_penalties_banned_until")
                    .table(UserPenalties::Table)
                    .col(UserPenalties::BannedUntil)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserPenalties::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserPenalties {
    Table,
    UserId,
    NonPaymentCount,
    BannedUntil,
    BanReason,
    PermanentBan,
    UpdatedAt,
}
