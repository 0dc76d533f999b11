#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod zero_padded;

mod account;
pub use account::{Account, Alloc, ExpectedAccount, PostAlloc, PostStateMismatch};

mod environment;
pub use environment::{
    Environment, BLOCK_HASH_HISTORY, DEFAULT_BASE_FEE, DEFAULT_FEE_RECIPIENT,
    DEFAULT_GAS_LIMIT, DEFAULT_GENESIS_DIFFICULTY,
};

mod exceptions;
pub use exceptions::{
    BlockException, EngineApiError, Exception, ExceptionParseError, ExceptionSet,
    TransactionException,
};

mod header;
pub use header::{FixtureHeader, HeaderField, HeaderMismatch, HeaderOverrides, SealedHeader};

mod requests;
pub use requests::{
    BlsPublicKey, BlsSignature, ConsolidationRequest, DepositRequest, Request, Requests,
    WithdrawalRequest,
};

mod transaction;
pub use transaction::{transactions_root, Transaction};

mod verkle;
pub use verkle::{
    split_tree_key, AccountCheck, AccountHeaderEntry, CodeChunkCheck, StateDiff, Stem,
    StemStateDiff, StorageSlotCheck, SuffixStateDiff, TreeKey, VerkleTree, Witness,
    WitnessCheck,
};

mod withdrawals;
pub use withdrawals::withdrawals_root;

pub use alloy_eips::eip4895::Withdrawal;
