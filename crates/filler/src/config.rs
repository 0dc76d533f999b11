//! Configuration of a [BlockchainFiller](crate::BlockchainFiller).

use alloy_primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The history storage contract of [EIP-2935].
///
/// [EIP-2935]: https://eips.ethereum.org/EIPS/eip-2935
pub const HISTORY_STORAGE_ADDRESS: Address = address!("fffffffffffffffffffffffffffffffffffffffe");

/// The chain id used when none is configured.
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// The storage slot of an [ImplicitSlotRule].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImplicitSlot {
    /// The number of the parent of the block.
    ParentNumber,
    /// A fixed slot.
    Fixed(U256),
}

impl ImplicitSlot {
    /// Resolves the slot for the block with the given number.
    pub fn resolve(&self, number: u64) -> U256 {
        match self {
            Self::ParentNumber => U256::from(number.saturating_sub(1)),
            Self::Fixed(slot) => *slot,
        }
    }
}

/// A storage slot every block touches without declaring it, added to each witness check
/// with an absent current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplicitSlotRule {
    /// The account owning the slot.
    pub address: Address,
    /// The slot.
    pub slot: ImplicitSlot,
}

impl ImplicitSlotRule {
    /// The system write of the parent block hash into the history storage contract.
    pub const HISTORY_STORAGE: Self =
        Self { address: HISTORY_STORAGE_ADDRESS, slot: ImplicitSlot::ParentNumber };
}

/// Configuration of fixture generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillerConfig {
    /// The chain id passed to the transition tool.
    pub chain_id: u64,
    /// EIPs enabled on top of the fork.
    pub eips: Vec<u32>,
    /// The root directory for debug artefacts.
    pub debug_dir: Option<PathBuf>,
    /// Storage slots added to every witness check.
    pub implicit_slots: Vec<ImplicitSlotRule>,
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            eips: Vec::new(),
            debug_dir: None,
            implicit_slots: vec![ImplicitSlotRule::HISTORY_STORAGE],
        }
    }
}

impl FillerConfig {
    /// Returns `name` with a `+<eip>` suffix for every enabled EIP.
    pub fn network_name(&self, name: &str) -> String {
        self.eips.iter().fold(name.to_string(), |acc, eip| format!("{acc}+{eip}"))
    }
}
