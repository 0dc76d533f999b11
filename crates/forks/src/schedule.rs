//! Fork schedules: a single fork for a whole chain, or a transition between two forks.

use crate::{Fork, ForkError, SystemContract};
use core::{fmt, str::FromStr};

/// The point at which a transition fork switches to its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activation {
    /// Active from the given block number onwards.
    Block(u64),
    /// Active from the given block timestamp onwards.
    Timestamp(u64),
}

impl Activation {
    /// Returns `true` if a block at `(number, timestamp)` is past the activation point.
    pub const fn is_active(&self, number: u64, timestamp: u64) -> bool {
        match self {
            Self::Block(block) => number >= *block,
            Self::Timestamp(time) => timestamp >= *time,
        }
    }
}

/// A chain that switches from one fork to the next mid-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionFork {
    /// The name of the transition, used as the blockchain test network name.
    pub name: &'static str,
    /// The fork active before the activation point.
    pub from: Fork,
    /// The fork active from the activation point onwards.
    pub to: Fork,
    /// The activation point.
    pub at: Activation,
}

impl TransitionFork {
    /// All known transition forks.
    pub const ALL: [Self; 5] = [
        Self {
            name: "BerlinToLondonAt5",
            from: Fork::Berlin,
            to: Fork::London,
            at: Activation::Block(5),
        },
        Self {
            name: "ParisToShanghaiAtTime15k",
            from: Fork::Paris,
            to: Fork::Shanghai,
            at: Activation::Timestamp(15_000),
        },
        Self {
            name: "ShanghaiToCancunAtTime15k",
            from: Fork::Shanghai,
            to: Fork::Cancun,
            at: Activation::Timestamp(15_000),
        },
        Self {
            name: "CancunToPragueAtTime15k",
            from: Fork::Cancun,
            to: Fork::Prague,
            at: Activation::Timestamp(15_000),
        },
        Self {
            name: "PragueToVerkleAtTime32",
            from: Fork::Prague,
            to: Fork::Verkle,
            at: Activation::Timestamp(32),
        },
    ];
}

/// The forks active over the lifetime of a test chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForkSchedule {
    /// One fork for every block.
    Single(Fork),
    /// A switch between two forks.
    Transition(TransitionFork),
}

impl From<Fork> for ForkSchedule {
    fn from(fork: Fork) -> Self {
        Self::Single(fork)
    }
}

impl ForkSchedule {
    /// Returns the fork active for a block at `(number, timestamp)`.
    pub const fn fork_at(&self, number: u64, timestamp: u64) -> Fork {
        match self {
            Self::Single(fork) => *fork,
            Self::Transition(t) if t.at.is_active(number, timestamp) => t.to,
            Self::Transition(t) => t.from,
        }
    }

    /// Returns the fork the chain starts with.
    pub const fn genesis_fork(&self) -> Fork {
        self.fork_at(0, 0)
    }

    /// Returns the latest fork reachable in the schedule.
    pub const fn last_fork(&self) -> Fork {
        match self {
            Self::Single(fork) => *fork,
            Self::Transition(t) => t.to,
        }
    }

    /// The network name written into blockchain fixtures.
    pub const fn blockchain_test_network_name(&self) -> &'static str {
        match self {
            Self::Single(fork) => fork.name(),
            Self::Transition(t) => t.name,
        }
    }

    /// The fork name passed to the transition tool for a block at `(number, timestamp)`.
    pub const fn transition_tool_name(&self, number: u64, timestamp: u64) -> &'static str {
        self.fork_at(number, timestamp).transition_tool_name()
    }

    /// See [Fork::header_base_fee_required].
    pub fn header_base_fee_required(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).header_base_fee_required()
    }

    /// See [Fork::header_prev_randao_required].
    pub fn header_prev_randao_required(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).header_prev_randao_required()
    }

    /// See [Fork::header_zero_difficulty_required].
    pub fn header_zero_difficulty_required(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).header_zero_difficulty_required()
    }

    /// See [Fork::header_withdrawals_required].
    pub fn header_withdrawals_required(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).header_withdrawals_required()
    }

    /// See [Fork::header_blob_gas_required].
    pub fn header_blob_gas_required(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).header_blob_gas_required()
    }

    /// See [Fork::header_beacon_root_required].
    pub fn header_beacon_root_required(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).header_beacon_root_required()
    }

    /// See [Fork::header_requests_required].
    pub fn header_requests_required(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).header_requests_required()
    }

    /// See [Fork::blob_gas_per_blob].
    pub fn blob_gas_per_blob(&self, number: u64, timestamp: u64) -> u64 {
        self.fork_at(number, timestamp).blob_gas_per_blob()
    }

    /// See [Fork::block_reward].
    pub fn block_reward(&self, number: u64, timestamp: u64) -> u128 {
        self.fork_at(number, timestamp).block_reward()
    }

    /// See [Fork::engine_new_payload_version].
    pub fn engine_new_payload_version(&self, number: u64, timestamp: u64) -> Option<u8> {
        self.fork_at(number, timestamp).engine_new_payload_version()
    }

    /// See [Fork::engine_forkchoice_updated_version].
    pub fn engine_forkchoice_updated_version(&self, number: u64, timestamp: u64) -> Option<u8> {
        self.fork_at(number, timestamp).engine_forkchoice_updated_version()
    }

    /// See [Fork::engine_new_payload_blob_hashes].
    pub fn engine_new_payload_blob_hashes(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).engine_new_payload_blob_hashes()
    }

    /// See [Fork::engine_new_payload_beacon_root].
    pub fn engine_new_payload_beacon_root(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).engine_new_payload_beacon_root()
    }

    /// See [Fork::statelessness_witness_required].
    pub fn statelessness_witness_required(&self, number: u64, timestamp: u64) -> bool {
        self.fork_at(number, timestamp).statelessness_witness_required()
    }

    /// Returns `true` if any fork of the schedule uses a statelessness witness.
    pub fn uses_statelessness(&self) -> bool {
        self.last_fork().statelessness_witness_required()
    }

    /// System contracts of the genesis allocation. Contracts of the successor fork in a
    /// transition are deployed by the transition itself and are not included.
    pub fn pre_allocation_blockchain(&self) -> impl Iterator<Item = &'static SystemContract> {
        self.genesis_fork().pre_allocation_blockchain()
    }
}

impl fmt::Display for ForkSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.blockchain_test_network_name())
    }
}

impl FromStr for ForkSchedule {
    type Err = ForkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(transition) =
            TransitionFork::ALL.into_iter().find(|t| t.name.eq_ignore_ascii_case(s))
        {
            return Ok(Self::Transition(transition));
        }
        s.parse().map(Self::Single)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("BerlinToLondonAt5", 4, 0, Fork::Berlin)]
    #[case("BerlinToLondonAt5", 5, 0, Fork::London)]
    #[case("ParisToShanghaiAtTime15k", 100, 14_999, Fork::Paris)]
    #[case("ParisToShanghaiAtTime15k", 1, 15_000, Fork::Shanghai)]
    #[case("CancunToPragueAtTime15k", 3, 15_012, Fork::Prague)]
    #[case("PragueToVerkleAtTime32", 2, 24, Fork::Prague)]
    #[case("PragueToVerkleAtTime32", 3, 36, Fork::Verkle)]
    #[case("Shanghai", 1_000, 1_000_000, Fork::Shanghai)]
    fn test_fork_at(
        #[case] name: &str,
        #[case] number: u64,
        #[case] timestamp: u64,
        #[case] fork: Fork,
    ) {
        let schedule: ForkSchedule = name.parse().unwrap();
        assert_eq!(schedule.fork_at(number, timestamp), fork);
    }

    #[test]
    fn test_transition_capabilities() {
        let schedule: ForkSchedule = "ShanghaiToCancunAtTime15k".parse().unwrap();
        assert!(!schedule.header_blob_gas_required(1, 12));
        assert!(schedule.header_blob_gas_required(1, 15_000));
        assert_eq!(schedule.engine_new_payload_version(1, 12), Some(2));
        assert_eq!(schedule.engine_new_payload_version(1, 15_000), Some(3));
        assert_eq!(schedule.blockchain_test_network_name(), "ShanghaiToCancunAtTime15k");
        assert_eq!(schedule.genesis_fork(), Fork::Shanghai);
        assert_eq!(schedule.pre_allocation_blockchain().count(), 0);
    }

    #[test]
    fn test_transition_tool_name() {
        let schedule: ForkSchedule = "ParisToShanghaiAtTime15k".parse().unwrap();
        assert_eq!(schedule.transition_tool_name(0, 0), "Merge");
        assert_eq!(schedule.transition_tool_name(1, 15_000), "Shanghai");
    }

    #[test]
    fn test_statelessness() {
        assert!(ForkSchedule::Single(Fork::Verkle).uses_statelessness());
        assert!(!ForkSchedule::Single(Fork::Prague).uses_statelessness());
        let schedule: ForkSchedule = "praguetoverkleattime32".parse().unwrap();
        assert!(schedule.uses_statelessness());
        assert!(!schedule.statelessness_witness_required(1, 12));
    }

    #[test]
    fn test_parse_unknown() {
        assert!("LondonToParis".parse::<ForkSchedule>().is_err());
    }
}
