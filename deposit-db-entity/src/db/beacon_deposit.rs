use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "beacon_deposit", schema_name = "public")]
pub struct Model {
    /// `<tx hash>:<log index>`, or `<block number>:<pubkey>` when the log lacks either.
    #[sea_orm(primary_key, auto_increment = false)]
    pub natural_key: String,
    pub pubkey: String,
    pub withdrawal_credentials: Option<String>,
    pub amount_gwei: Option<i64>,
    pub deposit_index: Option<i64>,
    pub block_number: i64,
    pub log_index: Option<i64>,
    pub block_timestamp: i64,
    pub fee: Decimal,
    pub hash: String,
    pub block_hash: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
