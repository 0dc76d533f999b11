//! Errors of fixture generation.

use alloy_eips::eip2718::Eip2718Error;
use alloy_primitives::{Address, B256};
use eft_forks::Fork;
use eft_primitives::{ExceptionSet, HeaderMismatch, PostStateMismatch, Stem};
use eft_t8n::T8nError;
use thiserror::Error;

/// A [Result] type alias where the error is [FillerError].
pub type FillerResult<T> = Result<T, FillerError>;

/// An error generating a fixture. Every variant aborts the test.
#[derive(Error, Debug)]
pub enum FillerError {
    /// The test description is inconsistent, or no longer matches the transition tool.
    #[error("Test authoring error: {0}")]
    Authoring(#[from] AuthoringError),
    /// The transition tool failed.
    #[error("Transition tool error: {0}")]
    T8n(#[from] T8nError),
    /// A generated value disagrees with the test expectations or the tool output.
    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),
}

/// An inconsistency in the test description.
#[derive(Error, Debug)]
pub enum AuthoringError {
    /// More than one transaction of a block is expected to fail.
    #[error("Only one transaction per block can be expected to fail, found {0}")]
    MultipleFailingTransactions(usize),
    /// The failing transaction is not the last transaction of its block.
    #[error("Failing transaction {index} must be the last of the block ({len} transactions)")]
    FailingTransactionNotLast {
        /// The index of the failing transaction.
        index: usize,
        /// The number of transactions of the block.
        len: usize,
    },
    /// A block given as raw RLP does not declare the exception it raises.
    #[error("Block {0} is given as raw RLP but declares no exception")]
    RawRlpWithoutException(usize),
    /// A block given as raw RLP cannot be sent through the engine API.
    #[error("Block {0} is given as raw RLP, which engine fixtures do not support")]
    RawRlpInEngineFixture(usize),
    /// The pre-state contains empty accounts.
    #[error("Pre-state contains empty accounts: {0:?}")]
    EmptyAccounts(Vec<Address>),
    /// The genesis environment contains withdrawals.
    #[error("Genesis environment must not contain withdrawals")]
    GenesisWithdrawals,
    /// The genesis environment has a non-zero beacon root.
    #[error("Genesis environment must have a zero parent beacon block root, got {0}")]
    GenesisBeaconRoot(B256),
    /// The block has no timestamp and no parent timestamp to derive it from.
    #[error("Block has no timestamp and the environment has no parent timestamp")]
    MissingTimestamp,
    /// A transaction not expected to fail was rejected.
    #[error("Unexpected failure of transaction {index}: {error}")]
    UnexpectedFailure {
        /// The index of the transaction.
        index: usize,
        /// The reason given by the transition tool.
        error: String,
    },
    /// A transaction expected to fail was included.
    #[error("Transaction {index} was expected to fail with {expected} but succeeded")]
    UnexpectedSuccess {
        /// The index of the transaction.
        index: usize,
        /// The expected exception.
        expected: ExceptionSet,
    },
    /// A transaction does not decode.
    #[error("Transaction {index} is not a valid EIP-2718 encoding: {source}")]
    InvalidTransaction {
        /// The index of the transaction.
        index: usize,
        /// The decoding error.
        #[source]
        source: Eip2718Error,
    },
    /// The fork has no engine API.
    #[error("Fork {0} does not support the engine API")]
    EngineUnsupported(Fork),
    /// Sync verification was requested for a chain without blocks.
    #[error("Sync verification requires at least one valid block")]
    SyncWithoutBlocks,
}

/// A generated value that disagrees with an expectation.
#[derive(Error, Debug)]
pub enum ConsistencyError {
    /// The requests root reported by the tool does not match the requests.
    #[error("Requests root mismatch: computed {computed}, tool reported {reported:?}")]
    RequestsRoot {
        /// The root of the aggregated requests.
        computed: B256,
        /// The root reported by the transition tool.
        reported: Option<B256>,
    },
    /// The withdrawals root reported by the tool does not match the withdrawals.
    #[error("Withdrawals root mismatch: computed {computed}, tool reported {reported:?}")]
    WithdrawalsRoot {
        /// The root of the block withdrawals.
        computed: B256,
        /// The root reported by the transition tool.
        reported: Option<B256>,
    },
    /// A header field does not match the declared value.
    #[error(transparent)]
    Header(#[from] HeaderMismatch),
    /// The tool reported no state diff for a block that requires a witness.
    #[error("Transition tool did not return a state diff")]
    MissingStateDiff,
    /// The state diff does not match the witness check.
    #[error(transparent)]
    Witness(#[from] WitnessMismatch),
    /// A statelessness chain ended without a statelessness tree.
    #[error("Statelessness chain produced no statelessness tree")]
    MissingVerkleTree,
    /// The final state does not match the expected post-state.
    #[error(transparent)]
    PostState(#[from] PostStateMismatch),
}

/// A difference between the state diff of a block and its witness check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WitnessMismatch {
    /// The state diff touches a stem that is not expected.
    #[error("Unexpected stem {stem} (address {address:?}) in the state diff")]
    UnexpectedStem {
        /// The stem.
        stem: Stem,
        /// The account owning the stem, if known.
        address: Option<Address>,
    },
    /// An expected stem is missing from the state diff.
    #[error("Expected stem {stem} (address {address:?}) missing from the state diff")]
    MissingStem {
        /// The stem.
        stem: Stem,
        /// The account owning the stem, if known.
        address: Option<Address>,
    },
    /// The state diff touches a suffix that is not expected.
    #[error("Unexpected suffix {suffix} of stem {stem} (address {address:?}) in the state diff")]
    UnexpectedSuffix {
        /// The stem.
        stem: Stem,
        /// The suffix.
        suffix: u8,
        /// The account owning the stem, if known.
        address: Option<Address>,
    },
    /// An expected suffix is missing from the state diff.
    #[error("Expected suffix {suffix} of stem {stem} (address {address:?}) missing")]
    MissingSuffix {
        /// The stem.
        stem: Stem,
        /// The suffix.
        suffix: u8,
        /// The account owning the stem, if known.
        address: Option<Address>,
    },
    /// A leaf value differs.
    #[error(
        "Value mismatch for suffix {suffix} of stem {stem} (address {address:?}): \
         expected {expected:?}, got {actual:?}"
    )]
    Value {
        /// The stem.
        stem: Stem,
        /// The suffix.
        suffix: u8,
        /// The account owning the stem, if known.
        address: Option<Address>,
        /// The declared value.
        expected: Option<B256>,
        /// The value in the state diff.
        actual: Option<B256>,
    },
}
