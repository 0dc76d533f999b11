//! Request and response types of the transition tool protocol.

use alloy_primitives::{Bloom, Bytes, B256, U256};
use eft_primitives::{
    Alloc, ConsolidationRequest, DepositRequest, Environment, Requests, StateDiff,
    Transaction, VerkleTree, WithdrawalRequest,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The input of one transition tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct T8nRequest {
    /// The pre-state.
    pub alloc: Alloc,
    /// The transactions of the block, in order.
    pub txs: Vec<Transaction>,
    /// The block environment.
    pub env: Environment,
    /// The fork name, including any `+<eip>` suffixes.
    pub fork: String,
    /// The chain id.
    pub chain_id: u64,
    /// The block reward, in wei.
    pub reward: u128,
    /// The statelessness tree of the pre-state, for forks with block witnesses.
    pub vkt: Option<VerkleTree>,
    /// The directory to write debug artefacts of the call to.
    pub debug_dir: Option<PathBuf>,
}

/// A transaction the tool refused to include.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedTransaction {
    /// The index of the transaction in the block.
    pub index: usize,
    /// The reason given by the tool.
    pub error: String,
}

/// The execution result of a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
    /// The post-state root.
    pub state_root: B256,
    /// The transactions root, over the included transactions.
    pub tx_root: B256,
    /// The receipts root.
    pub receipts_root: B256,
    /// The hash of the logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_hash: Option<B256>,
    /// The logs bloom.
    pub logs_bloom: Bloom,
    /// The transaction receipts, as reported by the tool.
    #[serde(default)]
    pub receipts: Vec<serde_json::Value>,
    /// The transactions the tool refused to include.
    #[serde(default)]
    pub rejected: Vec<RejectedTransaction>,
    /// The block difficulty.
    #[serde(
        rename = "currentDifficulty",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub difficulty: Option<U256>,
    /// The gas used by the block.
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// The block base fee.
    #[serde(
        rename = "currentBaseFee",
        default,
        with = "alloy_serde::quantity::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_fee_per_gas: Option<u64>,
    /// The withdrawals root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    /// The excess blob gas.
    #[serde(
        rename = "currentExcessBlobGas",
        default,
        with = "alloy_serde::quantity::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub excess_blob_gas: Option<u64>,
    /// The blob gas used, as computed by the tool.
    #[serde(
        default,
        with = "alloy_serde::quantity::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub blob_gas_used: Option<u64>,
    /// The requests root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_root: Option<B256>,
    /// The deposit requests of the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_requests: Option<Vec<DepositRequest>>,
    /// The withdrawal requests of the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_requests: Option<Vec<WithdrawalRequest>>,
    /// The consolidation requests of the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation_requests: Option<Vec<ConsolidationRequest>>,
    /// The statelessness tree leaves touched by the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_diff: Option<StateDiff>,
    /// The proof of the pre-state leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verkle_proof: Option<serde_json::Value>,
}

impl TransitionResult {
    /// Returns `true` if the transaction at `index` was rejected.
    pub fn is_rejected(&self, index: usize) -> bool {
        self.rejected.iter().any(|r| r.index == index)
    }

    /// Returns the requests of the block: deposits, then withdrawals, then consolidations.
    pub fn requests(&self) -> Requests {
        Requests::from_parts(
            self.deposit_requests.iter().flatten().cloned(),
            self.withdrawal_requests.iter().flatten().cloned(),
            self.consolidation_requests.iter().flatten().cloned(),
        )
    }
}

/// The output of one transition tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct T8nOutput {
    /// The post-state.
    pub alloc: Alloc,
    /// The execution result.
    pub result: TransitionResult,
    /// The statelessness tree of the post-state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vkt: Option<VerkleTree>,
    /// Execution traces, one entry per transaction.
    #[serde(skip)]
    pub traces: Vec<String>,
}

/// The stdin document of a geth style tool.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct T8nInput<'a> {
    pub(crate) alloc: &'a Alloc,
    pub(crate) env: &'a Environment,
    pub(crate) txs_rlp: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) vkt: Option<&'a VerkleTree>,
}
