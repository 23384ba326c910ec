use deposit_db_entity::db::beacon_deposit;
use ethers::types::{Bytes, H256, U256};
use sea_orm::{prelude::Decimal, ActiveValue};

/// A `DepositEvent` log as delivered by the provider, before validation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawDepositEvent {
    pub pubkey: Option<Bytes>,
    pub withdrawal_credentials: Option<Bytes>,
    pub amount: Option<Bytes>,
    pub signature: Option<Bytes>,
    /// Deposit counter emitted by the contract, not the log position.
    pub index: Option<Bytes>,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<H256>,
    pub block_number: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockMeta {
    pub number: u64,
    pub timestamp: u64,
    pub base_fee_per_gas: Option<U256>,
    pub hash: Option<H256>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DepositRecord {
    pub natural_key: String,
    pub pubkey: String,
    pub withdrawal_credentials: Option<String>,
    pub amount_gwei: Option<u64>,
    pub deposit_index: Option<u64>,
    pub block_number: u64,
    pub log_index: Option<u64>,
    pub block_timestamp: i64,
    pub fee: Decimal,
    pub hash: String,
    pub block_hash: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DepositRecord {
    pub fn notification_message(&self) -> String {
        format!(
            "new transaction received:\nblockNumber: {}\nblockTimestamp: {}\npubkey:{}",
            self.block_number, self.block_timestamp, self.pubkey
        )
    }

    pub fn into_active_model(self) -> beacon_deposit::ActiveModel {
        beacon_deposit::ActiveModel {
            natural_key: ActiveValue::Set(self.natural_key),
            pubkey: ActiveValue::Set(self.pubkey),
            withdrawal_credentials: ActiveValue::Set(self.withdrawal_credentials),
            amount_gwei: ActiveValue::Set(self.amount_gwei.map(|v| v as i64)),
            deposit_index: ActiveValue::Set(self.deposit_index.map(|v| v as i64)),
            block_number: ActiveValue::Set(self.block_number as i64),
            log_index: ActiveValue::Set(self.log_index.map(|v| v as i64)),
            block_timestamp: ActiveValue::Set(self.block_timestamp),
            fee: ActiveValue::Set(self.fee),
            hash: ActiveValue::Set(self.hash),
            block_hash: ActiveValue::Set(self.block_hash),
            created_at: ActiveValue::Set(self.created_at),
            updated_at: ActiveValue::Set(self.updated_at),
        }
    }
}

impl From<beacon_deposit::Model> for DepositRecord {
    fn from(model: beacon_deposit::Model) -> Self {
        DepositRecord {
            natural_key: model.natural_key,
            pubkey: model.pubkey,
            withdrawal_credentials: model.withdrawal_credentials,
            amount_gwei: model.amount_gwei.map(|v| v as u64),
            deposit_index: model.deposit_index.map(|v| v as u64),
            block_number: model.block_number as u64,
            log_index: model.log_index.map(|v| v as u64),
            block_timestamp: model.block_timestamp,
            fee: model.fee,
            hash: model.hash,
            block_hash: model.block_hash,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum IngestOutcome {
    Persisted(DepositRecord),
    Duplicate,
}
