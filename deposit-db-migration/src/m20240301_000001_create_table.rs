use deposit_db_entity::db::*;
use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000001_create_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(beacon_deposit::Entity)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(beacon_deposit::Column::NaturalKey)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(beacon_deposit::Column::Pubkey)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(beacon_deposit::Column::WithdrawalCredentials).string())
                    .col(ColumnDef::new(beacon_deposit::Column::AmountGwei).big_integer())
                    .col(ColumnDef::new(beacon_deposit::Column::DepositIndex).big_integer())
                    .col(
                        ColumnDef::new(beacon_deposit::Column::BlockNumber)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(beacon_deposit::Column::LogIndex).big_integer())
                    .col(
                        ColumnDef::new(beacon_deposit::Column::BlockTimestamp)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(beacon_deposit::Column::Fee)
                            .decimal()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(beacon_deposit::Column::Hash)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(beacon_deposit::Column::BlockHash).string())
                    .col(
                        ColumnDef::new(beacon_deposit::Column::CreatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(beacon_deposit::Column::UpdatedAt)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(beacon_deposit::Entity).to_owned())
            .await
    }
}
