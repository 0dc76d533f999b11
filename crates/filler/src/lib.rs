#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod errors;
pub use errors::{AuthoringError, ConsistencyError, FillerError, FillerResult, WitnessMismatch};

mod config;
pub use config::{
    FillerConfig, ImplicitSlot, ImplicitSlotRule, DEFAULT_CHAIN_ID, HISTORY_STORAGE_ADDRESS,
};

mod types;
pub use types::{Block, BlockchainTest};

mod env;
pub use env::{apply_fork_requirements, block_environment, environment_from_parent, BLOCK_TIME};

mod header;
pub use header::{
    assemble_header, blob_gas_used, check_failing_transactions, finalize_header, verify_result,
    verify_transactions,
};

mod requests;
pub use requests::aggregate_requests;

mod witness;
pub use witness::{apply_implicit_rules, verify_witness, StemValues, WitnessMapping};

mod fixture;
pub use fixture::{
    block_rlp, EngineFixture, ExecutionPayload, Fixture, FixtureBlock, FixtureBlockBase,
    FixtureBlockEntry, FixtureInfo, InvalidFixtureBlock, NewPayload, SEAL_ENGINE,
};

mod chain;
pub use chain::{BlockData, BlockOutcome, BlockchainFiller, Genesis};
