//! The execution environment of a block.

use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{address, Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fee recipient used when neither the block nor the test sets one.
pub const DEFAULT_FEE_RECIPIENT: Address = address!("2adc25665018aa1fe0e6bc666dac8fc2697ff9ba");

/// The gas limit used when neither the block nor its parent sets one.
pub const DEFAULT_GAS_LIMIT: u64 = 100_000_000_000_000_000;

/// The base fee of the first block when the fork requires one and no parent sets it.
pub const DEFAULT_BASE_FEE: u64 = 7;

/// The genesis difficulty when the fork does not require zero difficulty.
pub const DEFAULT_GENESIS_DIFFICULTY: u64 = 0x20000;

/// The number of ancestor hashes kept in [Environment::block_hashes].
pub const BLOCK_HASH_HISTORY: usize = 256;

/// The execution context of a single block, as passed to the transition tool.
///
/// Fields prefixed with `parent_` describe the parent header; the transition tool derives the
/// current value from them when the current value is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Environment {
    /// The block fee recipient.
    #[serde(rename = "currentCoinbase")]
    pub fee_recipient: Address,
    /// The block gas limit.
    #[serde(rename = "currentGasLimit", with = "alloy_serde::quantity")]
    pub gas_limit: u64,
    /// The block number.
    #[serde(rename = "currentNumber", with = "alloy_serde::quantity")]
    pub number: u64,
    /// The block timestamp.
    #[serde(rename = "currentTimestamp", with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// The previous randao value, post-merge.
    #[serde(rename = "currentRandom", skip_serializing_if = "Option::is_none")]
    pub prev_randao: Option<B256>,
    /// The block difficulty.
    #[serde(rename = "currentDifficulty", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<U256>,
    /// The block base fee.
    #[serde(
        rename = "currentBaseFee",
        with = "alloy_serde::quantity::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_fee_per_gas: Option<u64>,
    /// The block excess blob gas.
    #[serde(
        rename = "currentExcessBlobGas",
        with = "alloy_serde::quantity::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub excess_blob_gas: Option<u64>,
    /// The block blob gas used.
    #[serde(
        rename = "currentBlobGasUsed",
        with = "alloy_serde::quantity::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub blob_gas_used: Option<u64>,
    /// The withdrawals processed by the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// The parent beacon block root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
    /// Ancestor block hashes keyed by block number.
    pub block_hashes: BTreeMap<u64, B256>,
    /// The parent difficulty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_difficulty: Option<U256>,
    /// The parent timestamp.
    #[serde(with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub parent_timestamp: Option<u64>,
    /// The parent base fee.
    #[serde(
        rename = "parentBaseFee",
        with = "alloy_serde::quantity::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_base_fee_per_gas: Option<u64>,
    /// The parent gas used.
    #[serde(with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub parent_gas_used: Option<u64>,
    /// The parent gas limit.
    #[serde(with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub parent_gas_limit: Option<u64>,
    /// The parent ommers hash.
    #[serde(rename = "parentUncleHash", skip_serializing_if = "Option::is_none")]
    pub parent_ommers_hash: Option<B256>,
    /// The parent blob gas used.
    #[serde(with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub parent_blob_gas_used: Option<u64>,
    /// The parent excess blob gas.
    #[serde(with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub parent_excess_blob_gas: Option<u64>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            fee_recipient: DEFAULT_FEE_RECIPIENT,
            gas_limit: DEFAULT_GAS_LIMIT,
            number: 0,
            timestamp: 0,
            prev_randao: None,
            difficulty: None,
            base_fee_per_gas: None,
            excess_blob_gas: None,
            blob_gas_used: None,
            withdrawals: None,
            parent_beacon_block_root: None,
            block_hashes: BTreeMap::new(),
            parent_difficulty: None,
            parent_timestamp: None,
            parent_base_fee_per_gas: None,
            parent_gas_used: None,
            parent_gas_limit: None,
            parent_ommers_hash: None,
            parent_blob_gas_used: None,
            parent_excess_blob_gas: None,
        }
    }
}

impl Environment {
    /// Returns the hash of the parent block, or the zero hash at genesis.
    pub fn parent_hash(&self) -> B256 {
        self.number
            .checked_sub(1)
            .and_then(|parent| self.block_hashes.get(&parent))
            .copied()
            .unwrap_or_default()
    }

    /// Records an ancestor hash, dropping the oldest entries beyond the history window.
    pub fn push_block_hash(&mut self, number: u64, hash: B256) {
        self.block_hashes.insert(number, hash);
        while self.block_hashes.len() > BLOCK_HASH_HISTORY {
            self.block_hashes.pop_first();
        }
    }

    /// Returns the number following the newest recorded ancestor, or zero when no ancestor is
    /// known.
    pub fn next_number(&self) -> u64 {
        self.block_hashes.last_key_value().map(|(n, _)| n + 1).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_default_env_json() {
        let env = Environment::default();
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["currentCoinbase"], "0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba");
        assert_eq!(json["currentGasLimit"], "0x16345785d8a0000");
        assert_eq!(json["currentNumber"], "0x0");
        assert!(json.get("currentBaseFee").is_none());
        assert!(json.get("withdrawals").is_none());
    }

    #[test]
    fn test_partial_env_json() {
        let env: Environment =
            serde_json::from_str(r#"{"currentBaseFee":"0x3e8","parentTimestamp":"0x0c"}"#)
                .unwrap();
        assert_eq!(env.base_fee_per_gas, Some(1000));
        assert_eq!(env.parent_timestamp, Some(12));
        assert_eq!(env.gas_limit, DEFAULT_GAS_LIMIT);
    }

    #[test]
    fn test_block_hash_window() {
        let mut env = Environment::default();
        assert_eq!(env.next_number(), 0);
        for n in 0..300u64 {
            env.push_block_hash(n, B256::with_last_byte(n as u8));
        }
        assert_eq!(env.block_hashes.len(), BLOCK_HASH_HISTORY);
        assert_eq!(env.block_hashes.first_key_value().map(|(n, _)| *n), Some(44));
        assert_eq!(env.next_number(), 300);
    }

    #[test]
    fn test_parent_hash() {
        let hash = b256!("00000000000000000000000000000000000000000000000000000000000000aa");
        let mut env = Environment::default();
        assert_eq!(env.parent_hash(), B256::ZERO);
        env.push_block_hash(4, hash);
        env.number = 5;
        assert_eq!(env.parent_hash(), hash);
    }
}
