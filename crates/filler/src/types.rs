//! The declarative description of a blockchain test.

use alloy_primitives::{Address, Bytes, B256, U256};
use eft_primitives::{
    zero_padded, Alloc, EngineApiError, Environment, ExceptionSet, HeaderField,
    HeaderOverrides, PostAlloc, Requests, Transaction, Withdrawal, WitnessCheck,
};
use serde::{Deserialize, Serialize};

/// A chain of blocks on top of a genesis state, with the expected outcome of every block and
/// the expected final state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainTest {
    /// The genesis allocation.
    pub pre: Alloc,
    /// The expected state after the last valid block.
    #[serde(default)]
    pub post: PostAlloc,
    /// The blocks, in order.
    pub blocks: Vec<Block>,
    /// The environment of the genesis block.
    #[serde(default)]
    pub genesis_environment: Environment,
    /// Append an empty block on top of the chain to let clients sync to it.
    #[serde(default)]
    pub verify_sync: bool,
    /// A human readable description, copied into the fixture metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A block of a [BlockchainTest].
///
/// Every field is optional: unset header fields are derived from the parent block and the
/// active fork.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Block {
    /// The fee recipient.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_recipient: Option<Address>,
    /// The gas limit.
    #[serde(with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// The block number.
    #[serde(with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    /// The block timestamp.
    #[serde(with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// The block difficulty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<U256>,
    /// The previous randao value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_randao: Option<B256>,
    /// The extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Bytes>,
    /// The base fee. Removing it produces a header without the field.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub base_fee_per_gas: HeaderField<u64>,
    /// The excess blob gas.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub excess_blob_gas: HeaderField<u64>,
    /// The blob gas used.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub blob_gas_used: HeaderField<u64>,
    /// The parent beacon block root.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub parent_beacon_block_root: HeaderField<B256>,
    /// The withdrawals processed by the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// The transactions of the block.
    pub txs: Vec<Transaction>,
    /// A raw, usually malformed, block encoding sent instead of a generated block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rlp: Option<Bytes>,
    /// Header fields checked after the block is generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_verify: Option<HeaderOverrides>,
    /// Header fields replaced after the block is generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rlp_modifier: Option<HeaderOverrides>,
    /// The exception the block is expected to raise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionSet>,
    /// The error the engine API is expected to answer the payload with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_api_error_code: Option<EngineApiError>,
    /// Requests replacing the requests reported by the transition tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Requests>,
    /// The statelessness witness the block is expected to produce.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness_check: Option<WitnessCheck>,
}

impl Block {
    /// Returns the exception the block is expected to raise: the block exception, or else the
    /// error of its failing transaction.
    pub fn expected_exception(&self) -> Option<ExceptionSet> {
        self.exception.clone().or_else(|| self.txs.iter().rev().find_map(|tx| tx.error.clone()))
    }

    /// Returns `true` if the block is expected to be rejected.
    pub fn is_invalid(&self) -> bool {
        self.expected_exception().is_some()
    }
}
