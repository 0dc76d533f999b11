//! The seams between the filler and the external tool.

use crate::{T8nOutput, T8nRequest, T8nResult};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use eft_primitives::{Alloc, TreeKey, VerkleTree};
use std::fmt::Debug;

/// Evaluates the state transition of a block.
#[async_trait]
pub trait TransitionTool: Debug + Send + Sync {
    /// Executes the transactions of `request` on top of its pre-state.
    ///
    /// Any failure of the tool, including output that is missing mandatory fields, is
    /// returned as an error.
    async fn evaluate(&self, request: T8nRequest) -> T8nResult<T8nOutput>;
}

/// Resolves keys and roots of the statelessness tree.
#[async_trait]
pub trait TreeKeyResolver: Debug + Send + Sync {
    /// Returns the tree key of an account header, or of a storage slot of the account.
    async fn single_key(&self, address: Address, slot: Option<U256>) -> T8nResult<TreeKey>;

    /// Returns the tree key of a code chunk of an account.
    async fn code_chunk_key(&self, address: Address, chunk: u64) -> T8nResult<TreeKey>;

    /// Returns the statelessness tree root of an allocation.
    async fn state_root(&self, alloc: &Alloc) -> T8nResult<B256>;

    /// Converts an allocation into the leaves of a statelessness tree.
    async fn mpt_to_vkt(&self, alloc: &Alloc) -> T8nResult<VerkleTree>;
}
