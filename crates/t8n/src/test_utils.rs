//! Test utilities for code driving a [TransitionTool].

use crate::{
    RejectedTransaction, T8nError, T8nOutput, T8nRequest, T8nResult, TransitionResult,
    TransitionTool, TreeKeyResolver,
};
use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use eft_primitives::{
    transactions_root, withdrawals_root, Alloc, Requests, StateDiff, TreeKey, VerkleTree,
};
use std::{collections::VecDeque, sync::Mutex};

/// The scripted behaviour of one [MockTransitionTool] call.
#[derive(Debug, Clone, Default)]
pub struct MockBlock {
    /// The post-state. Defaults to the pre-state.
    pub post_alloc: Option<Alloc>,
    /// Transactions to reject, with the reported reason.
    pub rejected: Vec<(usize, String)>,
    /// Requests to report.
    pub requests: Option<Requests>,
    /// A requests root to report instead of the root of [MockBlock::requests].
    pub requests_root: Option<B256>,
    /// A blob gas used value to report.
    pub blob_gas_used: Option<u64>,
    /// A state diff to report.
    pub state_diff: Option<StateDiff>,
    /// Fail the call with this exit code.
    pub exit_code: Option<i32>,
}

/// An in-memory [TransitionTool] replaying scripted results.
///
/// Calls without a script keep the pre-state and include every transaction.
#[derive(Debug, Default)]
pub struct MockTransitionTool {
    script: Mutex<VecDeque<MockBlock>>,
    requests: Mutex<Vec<T8nRequest>>,
}

impl MockTransitionTool {
    /// Creates a tool replaying `script`, one entry per call.
    pub fn new(script: impl IntoIterator<Item = MockBlock>) -> Self {
        Self { script: Mutex::new(script.into_iter().collect()), requests: Mutex::default() }
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<T8nRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Returns the number of calls received so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl TransitionTool for MockTransitionTool {
    async fn evaluate(&self, request: T8nRequest) -> T8nResult<T8nOutput> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let block =
            self.script.lock().ok().and_then(|mut script| script.pop_front()).unwrap_or_default();
        if let Some(code) = block.exit_code {
            return Err(T8nError::Process { code: Some(code), stderr: "scripted failure".into() });
        }

        let env = &request.env;
        let alloc = block.post_alloc.unwrap_or_else(|| request.alloc.clone());
        let included = request
            .txs
            .iter()
            .enumerate()
            .filter(|(i, _)| !block.rejected.iter().any(|(r, _)| r == i))
            .map(|(_, tx)| tx.clone())
            .collect::<Vec<_>>();
        let requests = block.requests.unwrap_or_default();
        let result = TransitionResult {
            state_root: alloc.state_root(),
            tx_root: transactions_root(&included),
            receipts_root: eft_mpt::EMPTY_ROOT_HASH,
            difficulty: env.difficulty,
            gas_used: 21_000 * included.len() as u64,
            base_fee_per_gas: env.base_fee_per_gas.or(env.parent_base_fee_per_gas),
            withdrawals_root: env.withdrawals.as_deref().map(withdrawals_root),
            excess_blob_gas: env
                .excess_blob_gas
                .or_else(|| env.parent_excess_blob_gas.map(|_| 0)),
            blob_gas_used: block.blob_gas_used,
            requests_root: Some(block.requests_root.unwrap_or_else(|| requests.trie_root())),
            deposit_requests: Some(requests.deposits()),
            withdrawal_requests: Some(requests.withdrawals()),
            consolidation_requests: Some(requests.consolidations()),
            rejected: block
                .rejected
                .into_iter()
                .map(|(index, error)| RejectedTransaction { index, error })
                .collect(),
            state_diff: block.state_diff,
            ..Default::default()
        };
        let vkt = request.vkt.map(|_| VerkleTree::new());
        Ok(T8nOutput { alloc, result, vkt, traces: Vec::new() })
    }
}

/// Derives keys by hashing: the account header stem of an address is shared by its header
/// leaves, every storage slot and code chunk gets a stem of its own.
#[async_trait]
impl TreeKeyResolver for MockTransitionTool {
    async fn single_key(&self, address: Address, slot: Option<U256>) -> T8nResult<TreeKey> {
        Ok(match slot {
            None => {
                let mut key = keccak256(address);
                key.0[31] = 0;
                key
            }
            Some(slot) => keccak256([address.as_slice(), &slot.to_be_bytes::<32>()].concat()),
        })
    }

    async fn code_chunk_key(&self, address: Address, chunk: u64) -> T8nResult<TreeKey> {
        Ok(keccak256([address.as_slice(), &chunk.to_be_bytes()].concat()))
    }

    async fn state_root(&self, alloc: &Alloc) -> T8nResult<B256> {
        Ok(alloc.state_root())
    }

    async fn mpt_to_vkt(&self, alloc: &Alloc) -> T8nResult<VerkleTree> {
        let mut tree = VerkleTree::new();
        for address in alloc.0.keys() {
            tree.insert(self.single_key(*address, None).await?, B256::ZERO);
        }
        Ok(tree)
    }
}
