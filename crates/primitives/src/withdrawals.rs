//! Withdrawals trie root.

use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::B256;

/// Computes the withdrawals trie root of a block.
pub fn withdrawals_root(withdrawals: &[Withdrawal]) -> B256 {
    eft_mpt::ordered_trie_root(withdrawals)
}
