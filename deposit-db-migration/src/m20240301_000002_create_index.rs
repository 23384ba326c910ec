use deposit_db_entity::db::*;
use sea_orm_migration::prelude::*;

pub struct Migration;

const BLOCK_POSITION_INDEX: &str = "idx_beacon_deposit_block_number_log_index";
const PUBKEY_INDEX: &str = "idx_beacon_deposit_pubkey";

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000002_create_index"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name(BLOCK_POSITION_INDEX)
                    .table(beacon_deposit::Entity)
                    .col(beacon_deposit::Column::BlockNumber)
                    .col(beacon_deposit::Column::LogIndex)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name(PUBKEY_INDEX)
                    .table(beacon_deposit::Entity)
                    .col(beacon_deposit::Column::Pubkey)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(PUBKEY_INDEX)
                    .table(beacon_deposit::Entity)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name(BLOCK_POSITION_INDEX)
                    .table(beacon_deposit::Entity)
                    .to_owned(),
            )
            .await
    }
}
