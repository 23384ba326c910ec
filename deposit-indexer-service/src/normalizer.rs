use crate::deposit::{BlockMeta, DepositRecord, RawDepositEvent};
use crate::error::IncompleteEventError;
use chrono::Utc;
use ethers::types::{Bytes, H256, U256};
use sea_orm::prelude::Decimal;

/// BLS12-381 public key length.
pub const PUBKEY_LENGTH: usize = 48;

/// Checks the fields a record cannot exist without, before any block lookup.
pub fn required_block_number(raw: &RawDepositEvent) -> Result<u64, IncompleteEventError> {
    let pubkey = match raw.pubkey {
        Some(ref pubkey) if !pubkey.is_empty() => pubkey,
        _ => return Err(IncompleteEventError::MissingPubkey),
    };
    if pubkey.len() != PUBKEY_LENGTH {
        return Err(IncompleteEventError::MalformedPubkey {
            expected: PUBKEY_LENGTH,
            actual: pubkey.len(),
        });
    }
    raw.block_number.ok_or(IncompleteEventError::MissingBlockNumber)
}

pub fn normalize(
    raw: &RawDepositEvent,
    block: &BlockMeta,
) -> Result<DepositRecord, IncompleteEventError> {
    let block_number = required_block_number(raw)?;
    if block.number != block_number {
        return Err(IncompleteEventError::BlockMismatch {
            event: block_number,
            block: block.number,
        });
    }
    let pubkey = match raw.pubkey {
        Some(ref pubkey) => to_hex(pubkey),
        None => return Err(IncompleteEventError::MissingPubkey),
    };

    let natural_key = match (raw.transaction_hash, raw.log_index) {
        (Some(tx_hash), Some(log_index)) => format!("{:#x}:{}", tx_hash, log_index),
        _ => format!("{}:{}", block_number, pubkey),
    };
    let block_hash = block.hash.map(|hash| h256_hex(&hash));
    let hash = match raw.transaction_hash {
        Some(tx_hash) => h256_hex(&tx_hash),
        None => block_hash.clone().unwrap_or_default(),
    };

    let now = Utc::now().timestamp_millis();
    Ok(DepositRecord {
        natural_key,
        pubkey,
        withdrawal_credentials: raw.withdrawal_credentials.as_ref().map(to_hex),
        amount_gwei: raw.amount.as_ref().and_then(le_u64),
        deposit_index: raw.index.as_ref().and_then(le_u64),
        block_number,
        log_index: raw.log_index,
        block_timestamp: block.timestamp as i64,
        fee: fee_to_decimal(block.base_fee_per_gas),
        hash,
        block_hash,
        created_at: now,
        updated_at: now,
    })
}

fn to_hex(bytes: &Bytes) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn h256_hex(hash: &H256) -> String {
    format!("{:#x}", hash)
}

// amount and index are emitted as 8-byte little-endian integers
fn le_u64(bytes: &Bytes) -> Option<u64> {
    let slice: &[u8] = bytes.as_ref();
    let raw: [u8; 8] = slice.try_into().ok()?;
    Some(u64::from_le_bytes(raw))
}

fn fee_to_decimal(base_fee_per_gas: Option<U256>) -> Decimal {
    match base_fee_per_gas {
        Some(fee) if fee > U256::from(u64::MAX) => Decimal::from(u64::MAX),
        Some(fee) => Decimal::from(fee.as_u64()),
        None => Decimal::ZERO,
    }
}
