//! Fork identifiers and their capability descriptors.

use crate::ForkError;
use alloy_primitives::{address, hex, Address};
use core::{fmt, str::FromStr};

/// One wei-denominated ether.
const ETHER: u128 = 1_000_000_000_000_000_000;

/// The mainnet forks, in activation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Fork {
    /// Frontier.
    Frontier,
    /// Homestead.
    Homestead,
    /// Byzantium.
    Byzantium,
    /// Constantinople.
    Constantinople,
    /// Constantinople with the net gas metering rollback (Petersburg).
    ConstantinopleFix,
    /// Istanbul.
    Istanbul,
    /// Muir Glacier.
    MuirGlacier,
    /// Berlin.
    Berlin,
    /// London.
    London,
    /// Arrow Glacier.
    ArrowGlacier,
    /// Gray Glacier.
    GrayGlacier,
    /// Paris, the merge.
    Paris,
    /// Shanghai.
    Shanghai,
    /// Cancun.
    Cancun,
    /// Prague.
    Prague,
    /// Osaka.
    Osaka,
    /// The statelessness fork, replacing the state trie with a verkle tree.
    Verkle,
}

impl Fork {
    /// All forks, in activation order.
    pub const ALL: [Self; 17] = [
        Self::Frontier,
        Self::Homestead,
        Self::Byzantium,
        Self::Constantinople,
        Self::ConstantinopleFix,
        Self::Istanbul,
        Self::MuirGlacier,
        Self::Berlin,
        Self::London,
        Self::ArrowGlacier,
        Self::GrayGlacier,
        Self::Paris,
        Self::Shanghai,
        Self::Cancun,
        Self::Prague,
        Self::Osaka,
        Self::Verkle,
    ];

    /// Returns the capability descriptor of the fork.
    pub const fn spec(&self) -> &'static ForkSpec {
        match self {
            Self::Frontier => &FRONTIER,
            Self::Homestead => &HOMESTEAD,
            Self::Byzantium => &BYZANTIUM,
            Self::Constantinople => &CONSTANTINOPLE,
            Self::ConstantinopleFix => &CONSTANTINOPLE_FIX,
            Self::Istanbul => &ISTANBUL,
            Self::MuirGlacier => &MUIR_GLACIER,
            Self::Berlin => &BERLIN,
            Self::London => &LONDON,
            Self::ArrowGlacier => &ARROW_GLACIER,
            Self::GrayGlacier => &GRAY_GLACIER,
            Self::Paris => &PARIS,
            Self::Shanghai => &SHANGHAI,
            Self::Cancun => &CANCUN,
            Self::Prague => &PRAGUE,
            Self::Osaka => &OSAKA,
            Self::Verkle => &VERKLE,
        }
    }

    /// The canonical name of the fork.
    pub const fn name(&self) -> &'static str {
        self.spec().name
    }

    /// The fork name understood by transition tools.
    pub const fn transition_tool_name(&self) -> &'static str {
        match self.spec().transition_tool_name {
            Some(name) => name,
            None => self.spec().name,
        }
    }

    /// Whether the header carries a base fee.
    pub fn header_base_fee_required(&self) -> bool {
        self.spec().resolve(|c| c.base_fee)
    }

    /// Whether the header carries the previous randao value in place of the mix hash.
    pub fn header_prev_randao_required(&self) -> bool {
        self.spec().resolve(|c| c.prev_randao)
    }

    /// Whether the header difficulty must be zero.
    pub fn header_zero_difficulty_required(&self) -> bool {
        self.spec().resolve(|c| c.zero_difficulty)
    }

    /// Whether the header carries a withdrawals root.
    pub fn header_withdrawals_required(&self) -> bool {
        self.spec().resolve(|c| c.withdrawals)
    }

    /// Whether the header carries the blob gas used and excess blob gas fields.
    pub fn header_blob_gas_required(&self) -> bool {
        self.spec().resolve(|c| c.blob_gas)
    }

    /// Whether the header carries the parent beacon block root.
    pub fn header_beacon_root_required(&self) -> bool {
        self.spec().resolve(|c| c.beacon_root)
    }

    /// Whether the header carries a requests root, and the execution layer requests are
    /// processed.
    pub fn header_requests_required(&self) -> bool {
        self.spec().resolve(|c| c.requests)
    }

    /// The amount of blob gas charged per blob.
    pub fn blob_gas_per_blob(&self) -> u64 {
        self.spec().resolve(|c| c.blob_gas_per_blob)
    }

    /// The block reward, in wei.
    pub fn block_reward(&self) -> u128 {
        self.spec().resolve(|c| c.block_reward)
    }

    /// The `engine_newPayload` version, if payloads can be sent through the engine API.
    pub fn engine_new_payload_version(&self) -> Option<u8> {
        Some(self.spec().resolve(|c| c.new_payload_version)).filter(|v| *v > 0)
    }

    /// The `engine_forkchoiceUpdated` version.
    pub fn engine_forkchoice_updated_version(&self) -> Option<u8> {
        self.engine_new_payload_version().map(|v| v.min(MAX_FORKCHOICE_UPDATED_VERSION))
    }

    /// Whether `engine_newPayload` carries the blob versioned hashes.
    pub fn engine_new_payload_blob_hashes(&self) -> bool {
        self.spec().resolve(|c| c.payload_blob_hashes)
    }

    /// Whether `engine_newPayload` carries the parent beacon block root.
    pub fn engine_new_payload_beacon_root(&self) -> bool {
        self.spec().resolve(|c| c.payload_beacon_root)
    }

    /// Whether blocks carry a statelessness witness.
    pub fn statelessness_witness_required(&self) -> bool {
        self.spec().resolve(|c| c.statelessness)
    }

    /// System contracts that must be allocated in the genesis of blockchain tests.
    pub fn pre_allocation_blockchain(&self) -> impl Iterator<Item = &'static SystemContract> {
        let mut spec = Some(self.spec());
        core::iter::from_fn(move || {
            let current = spec?;
            spec = current.parent;
            Some(current.pre_allocation_blockchain)
        })
        .flatten()
    }
}

impl fmt::Display for Fork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Fork {
    type Err = ForkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|fork| {
                fork.name().eq_ignore_ascii_case(s)
                    || fork.transition_tool_name().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| ForkError::UnknownFork(s.into()))
    }
}

/// The highest `engine_forkchoiceUpdated` version.
pub const MAX_FORKCHOICE_UPDATED_VERSION: u8 = 3;

/// An account that a fork requires to be present in the genesis allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemContract {
    /// The address of the contract.
    pub address: Address,
    /// The nonce of the contract account.
    pub nonce: u64,
    /// The runtime code of the contract.
    pub code: &'static [u8],
}

/// The EIP-4788 beacon roots contract.
pub const BEACON_ROOTS_CONTRACT: SystemContract = SystemContract {
    address: address!("000F3DF6D732807EF1319FB7B8BB8522D0BEAC02"),
    nonce: 1,
    code: &hex!(
        "3373fffffffffffffffffffffffffffffffffffffffe14604d57602036146024575f5f"
        "fd5b5f35801560495762001fff810690815414603c575f5ffd5b62001fff01545f5260205ff35b5f"
        "5ffd5b62001fff42064281555f359062001fff015500"
    ),
};

/// The capabilities a fork changes relative to its predecessor. `None` inherits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    base_fee: Option<bool>,
    prev_randao: Option<bool>,
    zero_difficulty: Option<bool>,
    withdrawals: Option<bool>,
    blob_gas: Option<bool>,
    beacon_root: Option<bool>,
    requests: Option<bool>,
    blob_gas_per_blob: Option<u64>,
    block_reward: Option<u128>,
    new_payload_version: Option<u8>,
    payload_blob_hashes: Option<bool>,
    payload_beacon_root: Option<bool>,
    statelessness: Option<bool>,
}

impl Capabilities {
    const INHERIT: Self = Self {
        base_fee: None,
        prev_randao: None,
        zero_difficulty: None,
        withdrawals: None,
        blob_gas: None,
        beacon_root: None,
        requests: None,
        blob_gas_per_blob: None,
        block_reward: None,
        new_payload_version: None,
        payload_blob_hashes: None,
        payload_beacon_root: None,
        statelessness: None,
    };
}

/// A fork descriptor: its names, the capabilities it introduces and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkSpec {
    /// The canonical name, also used as the blockchain test network name.
    pub name: &'static str,
    /// The transition tool name, when it differs from the canonical name.
    pub transition_tool_name: Option<&'static str>,
    /// The preceding fork.
    pub parent: Option<&'static ForkSpec>,
    /// Capabilities changed at this fork.
    pub capabilities: Capabilities,
    /// System contracts introduced at this fork.
    pub pre_allocation_blockchain: &'static [SystemContract],
}

impl ForkSpec {
    /// Walks the fork and its predecessors, returning the first capability that is set.
    ///
    /// The root fork sets every capability, so the walk always terminates with a value.
    fn resolve<T: Copy + Default>(&self, f: impl Fn(&Capabilities) -> Option<T>) -> T {
        let mut spec = Some(self);
        while let Some(current) = spec {
            if let Some(value) = f(&current.capabilities) {
                return value;
            }
            spec = current.parent;
        }
        T::default()
    }
}

const fn child(
    name: &'static str,
    parent: &'static ForkSpec,
    capabilities: Capabilities,
) -> ForkSpec {
    ForkSpec {
        name,
        transition_tool_name: None,
        parent: Some(parent),
        capabilities,
        pre_allocation_blockchain: &[],
    }
}

const FRONTIER: ForkSpec = ForkSpec {
    name: "Frontier",
    transition_tool_name: None,
    parent: None,
    capabilities: Capabilities {
        base_fee: Some(false),
        prev_randao: Some(false),
        zero_difficulty: Some(false),
        withdrawals: Some(false),
        blob_gas: Some(false),
        beacon_root: Some(false),
        requests: Some(false),
        blob_gas_per_blob: Some(0),
        block_reward: Some(5 * ETHER),
        new_payload_version: Some(0),
        payload_blob_hashes: Some(false),
        payload_beacon_root: Some(false),
        statelessness: Some(false),
    },
    pre_allocation_blockchain: &[],
};

const HOMESTEAD: ForkSpec = child("Homestead", &FRONTIER, Capabilities::INHERIT);

const BYZANTIUM: ForkSpec = child(
    "Byzantium",
    &HOMESTEAD,
    Capabilities { block_reward: Some(3 * ETHER), ..Capabilities::INHERIT },
);

const CONSTANTINOPLE: ForkSpec = child(
    "Constantinople",
    &BYZANTIUM,
    Capabilities { block_reward: Some(2 * ETHER), ..Capabilities::INHERIT },
);

const CONSTANTINOPLE_FIX: ForkSpec =
    child("ConstantinopleFix", &CONSTANTINOPLE, Capabilities::INHERIT);

const ISTANBUL: ForkSpec = child("Istanbul", &CONSTANTINOPLE_FIX, Capabilities::INHERIT);

const MUIR_GLACIER: ForkSpec = child("MuirGlacier", &ISTANBUL, Capabilities::INHERIT);

const BERLIN: ForkSpec = child("Berlin", &MUIR_GLACIER, Capabilities::INHERIT);

const LONDON: ForkSpec =
    child("London", &BERLIN, Capabilities { base_fee: Some(true), ..Capabilities::INHERIT });

const ARROW_GLACIER: ForkSpec = child("ArrowGlacier", &LONDON, Capabilities::INHERIT);

const GRAY_GLACIER: ForkSpec = child("GrayGlacier", &ARROW_GLACIER, Capabilities::INHERIT);

const PARIS: ForkSpec = ForkSpec {
    transition_tool_name: Some("Merge"),
    ..child(
        "Paris",
        &GRAY_GLACIER,
        Capabilities {
            prev_randao: Some(true),
            zero_difficulty: Some(true),
            block_reward: Some(0),
            new_payload_version: Some(1),
            ..Capabilities::INHERIT
        },
    )
};

const SHANGHAI: ForkSpec = child(
    "Shanghai",
    &PARIS,
    Capabilities { withdrawals: Some(true), new_payload_version: Some(2), ..Capabilities::INHERIT },
);

const CANCUN: ForkSpec = ForkSpec {
    pre_allocation_blockchain: &[BEACON_ROOTS_CONTRACT],
    ..child(
        "Cancun",
        &SHANGHAI,
        Capabilities {
            blob_gas: Some(true),
            beacon_root: Some(true),
            blob_gas_per_blob: Some(1 << 17),
            new_payload_version: Some(3),
            payload_blob_hashes: Some(true),
            payload_beacon_root: Some(true),
            ..Capabilities::INHERIT
        },
    )
};

const PRAGUE: ForkSpec = child(
    "Prague",
    &CANCUN,
    Capabilities { requests: Some(true), new_payload_version: Some(4), ..Capabilities::INHERIT },
);

const OSAKA: ForkSpec = child("Osaka", &PRAGUE, Capabilities::INHERIT);

const VERKLE: ForkSpec =
    child("Verkle", &OSAKA, Capabilities { statelessness: Some(true), ..Capabilities::INHERIT });
