//! Statelessness witness types.

use alloy_primitives::{Address, FixedBytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The first 31 bytes of a tree key, shared by every leaf of an account header or storage
/// group.
pub type Stem = FixedBytes<31>;

/// A full tree key: a [Stem] followed by a one byte suffix.
pub type TreeKey = B256;

/// Splits a tree key into its stem and suffix.
pub fn split_tree_key(key: &TreeKey) -> (Stem, u8) {
    (Stem::from_slice(&key[..31]), key[31])
}

/// The value of one leaf read or written by a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuffixStateDiff {
    /// The leaf suffix.
    pub suffix: u8,
    /// The value before the block, if the leaf existed.
    pub current_value: Option<B256>,
    /// The value after the block, if the leaf was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<B256>,
}

/// The leaves of one stem touched by a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StemStateDiff {
    /// The stem.
    pub stem: Stem,
    /// The touched leaves, in suffix order.
    pub suffix_diffs: Vec<SuffixStateDiff>,
}

/// Every leaf touched by a block, as reported by the transition tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDiff(pub Vec<StemStateDiff>);

impl StateDiff {
    /// Returns the current values of the diff keyed by stem, then suffix.
    pub fn current_values(&self) -> BTreeMap<Stem, BTreeMap<u8, Option<B256>>> {
        self.0
            .iter()
            .map(|stem| {
                let suffixes =
                    stem.suffix_diffs.iter().map(|s| (s.suffix, s.current_value)).collect();
                (stem.stem, suffixes)
            })
            .collect()
    }
}

/// The witness of a block: its state diff and the proof of the pre-state values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Witness {
    /// The leaves touched by the block.
    pub state_diff: StateDiff,
    /// The proof of the pre-state values, in the transition tool's format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verkle_proof: Option<serde_json::Value>,
}

/// A leaf of an account header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountHeaderEntry {
    /// The account version.
    Version,
    /// The account balance.
    Balance,
    /// The account nonce.
    Nonce,
    /// The account code hash.
    CodeHash,
    /// The account code size.
    CodeSize,
}

impl AccountHeaderEntry {
    /// Returns the suffix of the leaf within the account header stem.
    pub const fn suffix(&self) -> u8 {
        match self {
            Self::Version => 0,
            Self::Balance => 1,
            Self::Nonce => 2,
            Self::CodeHash => 3,
            Self::CodeSize => 4,
        }
    }
}

/// An expected account header leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCheck {
    /// The account address.
    pub address: Address,
    /// The header leaf.
    pub entry: AccountHeaderEntry,
    /// The expected current value, or `None` if the leaf must be absent.
    pub value: Option<B256>,
}

/// An expected storage slot leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSlotCheck {
    /// The account address.
    pub address: Address,
    /// The storage slot.
    pub slot: U256,
    /// The expected current value, or `None` if the leaf must be absent.
    pub value: Option<B256>,
}

/// An expected code chunk leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChunkCheck {
    /// The account address.
    pub address: Address,
    /// The code chunk number.
    pub chunk: u64,
    /// The expected current value, or `None` if the leaf must be absent.
    pub value: Option<B256>,
}

/// The leaves a block is expected to touch, declared per account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WitnessCheck {
    /// Expected account header leaves.
    pub account_entries: Vec<AccountCheck>,
    /// Expected storage slot leaves.
    pub storage_slots: Vec<StorageSlotCheck>,
    /// Expected code chunk leaves.
    pub code_chunks: Vec<CodeChunkCheck>,
}

impl WitnessCheck {
    /// Adds an expected account header leaf.
    pub fn add_account_entry(
        &mut self,
        address: Address,
        entry: AccountHeaderEntry,
        value: Option<B256>,
    ) {
        self.account_entries.push(AccountCheck { address, entry, value });
    }

    /// Adds an expected storage slot leaf.
    pub fn add_storage_slot(&mut self, address: Address, slot: U256, value: Option<B256>) {
        self.storage_slots.push(StorageSlotCheck { address, slot, value });
    }

    /// Adds an expected code chunk leaf.
    pub fn add_code_chunk(&mut self, address: Address, chunk: u64, value: Option<B256>) {
        self.code_chunks.push(CodeChunkCheck { address, chunk, value });
    }
}

/// A statelessness tree: leaf values keyed by tree key.
pub type VerkleTree = BTreeMap<TreeKey, B256>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_split_tree_key() {
        let key = b256!("0101010101010101010101010101010101010101010101010101010101010107");
        let (stem, suffix) = split_tree_key(&key);
        assert_eq!(stem, Stem::repeat_byte(0x01));
        assert_eq!(suffix, 7);
    }

    #[test]
    fn test_state_diff_json() {
        let json = r#"[{
            "stem": "0x01010101010101010101010101010101010101010101010101010101010101",
            "suffixDiffs": [
                {"suffix": 0, "currentValue": null, "newValue": null},
                {"suffix": 1, "currentValue": "0x0000000000000000000000000000000000000000000000000000000000000005"}
            ]
        }]"#;
        let diff: StateDiff = serde_json::from_str(json).unwrap();
        let values = diff.current_values();
        let leaves = &values[&Stem::repeat_byte(0x01)];
        assert_eq!(leaves[&0u8], None);
        assert_eq!(leaves[&1u8], Some(B256::with_last_byte(5)));
    }

    #[test]
    fn test_witness_check_json() {
        let check: WitnessCheck = serde_json::from_str(
            r#"{"accountEntries":[{"address":"0x1000000000000000000000000000000000000001","entry":"BALANCE","value":null}]}"#,
        )
        .unwrap();
        assert_eq!(check.account_entries[0].entry.suffix(), 1);
        assert!(check.storage_slots.is_empty());
    }
}
