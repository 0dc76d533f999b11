//! Expected outcomes of invalid transactions and blocks.

use core::{fmt, str::FromStr};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// An error parsing an exception name or engine error code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExceptionParseError {
    /// Unknown exception name.
    #[error("Unknown exception: {0}")]
    UnknownException(String),
    /// Unknown engine API error code.
    #[error("Unknown engine API error code: {0}")]
    UnknownErrorCode(i32),
}

macro_rules! exception_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Returns the upper snake case name of the exception.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ExceptionParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ExceptionParseError::UnknownException(s.to_string())),
                }
            }
        }
    };
}

exception_enum!(
    /// A reason for a transaction to be rejected.
    TransactionException {
        /// The sender cannot cover the upfront cost.
        InsufficientAccountFunds => "INSUFFICIENT_ACCOUNT_FUNDS",
        /// The max fee per gas is below the block base fee.
        InsufficientMaxFeePerGas => "INSUFFICIENT_MAX_FEE_PER_GAS",
        /// The priority fee exceeds the max fee.
        PriorityGreaterThanMaxFeePerGas => "PRIORITY_GREATER_THAN_MAX_FEE_PER_GAS",
        /// The max fee per blob gas is below the blob base fee.
        InsufficientMaxFeePerBlobGas => "INSUFFICIENT_MAX_FEE_PER_BLOB_GAS",
        /// The gas limit is below the intrinsic gas.
        IntrinsicGasTooLow => "INTRINSIC_GAS_TOO_LOW",
        /// The init code exceeds the size limit.
        InitcodeSizeExceeded => "INITCODE_SIZE_EXCEEDED",
        /// The nonce is above the account nonce.
        NonceMismatchTooHigh => "NONCE_MISMATCH_TOO_HIGH",
        /// The nonce is below the account nonce.
        NonceMismatchTooLow => "NONCE_MISMATCH_TOO_LOW",
        /// The account nonce is at its maximum.
        NonceIsMax => "NONCE_IS_MAX",
        /// The gas limit exceeds the gas left in the block.
        GasAllowanceExceeded => "GAS_ALLOWANCE_EXCEEDED",
        /// The sender has code deployed.
        SenderNotEoa => "SENDER_NOT_EOA",
        /// A blob transaction before blobs are enabled.
        Type3TxPreFork => "TYPE_3_TX_PRE_FORK",
        /// A blob transaction without blobs.
        Type3TxZeroBlobs => "TYPE_3_TX_ZERO_BLOBS",
        /// A blob versioned hash with an invalid version byte.
        Type3TxInvalidBlobVersionedHash => "TYPE_3_TX_INVALID_BLOB_VERSIONED_HASH",
        /// A blob transaction carrying its blobs in the block body.
        Type3TxWithFullBlobs => "TYPE_3_TX_WITH_FULL_BLOBS",
        /// Too many blobs in one transaction.
        Type3TxBlobCountExceeded => "TYPE_3_TX_BLOB_COUNT_EXCEEDED",
        /// A blob transaction creating a contract.
        Type3TxContractCreation => "TYPE_3_TX_CONTRACT_CREATION",
        /// The block blob gas limit is exceeded.
        Type3TxMaxBlobGasAllowanceExceeded => "TYPE_3_TX_MAX_BLOB_GAS_ALLOWANCE_EXCEEDED",
        /// A set code transaction before the fork enabling it.
        Type4TxPreFork => "TYPE_4_TX_PRE_FORK",
        /// A set code transaction with an empty authorization list.
        Type4EmptyAuthorizationList => "TYPE_4_EMPTY_AUTHORIZATION_LIST",
        /// A set code transaction creating a contract.
        Type4TxContractCreation => "TYPE_4_TX_CONTRACT_CREATION",
    }
);

exception_enum!(
    /// A reason for a block to be rejected.
    BlockException {
        /// The block body does not decode.
        RlpStructuresEncoding => "RLP_STRUCTURES_ENCODING",
        /// The withdrawals list was not consumed while decoding.
        RlpWithdrawalsNotRead => "RLP_WITHDRAWALS_NOT_READ",
        /// An integer field overflows 64 bits.
        RlpInvalidFieldOverflow64 => "RLP_INVALID_FIELD_OVERFLOW_64",
        /// An address field has the wrong size.
        RlpInvalidAddress => "RLP_INVALID_ADDRESS",
        /// The header carries the wrong set of fields for the fork.
        IncorrectBlockFormat => "INCORRECT_BLOCK_FORMAT",
        /// The blob gas used is above the limit.
        BlobGasUsedAboveLimit => "BLOB_GAS_USED_ABOVE_LIMIT",
        /// The blob gas used does not match the blob count.
        IncorrectBlobGasUsed => "INCORRECT_BLOB_GAS_USED",
        /// The excess blob gas is not derived from the parent.
        IncorrectExcessBlobGas => "INCORRECT_EXCESS_BLOB_GAS",
        /// The requests root does not match the block requests.
        InvalidRequests => "INVALID_REQUESTS",
        /// The withdrawals root does not match the block withdrawals.
        InvalidWithdrawalsRoot => "INVALID_WITHDRAWALS_ROOT",
        /// A deposit log has an invalid layout.
        InvalidDepositEventLayout => "INVALID_DEPOSIT_EVENT_LAYOUT",
        /// A system contract has no code.
        SystemContractEmpty => "SYSTEM_CONTRACT_EMPTY",
        /// A system contract call failed.
        SystemContractCallFailed => "SYSTEM_CONTRACT_CALL_FAILED",
        /// Ommers are present after the merge.
        ImportImpossibleUnclesOverParis => "IMPORT_IMPOSSIBLE_UNCLES_OVER_PARIS",
        /// The block hash is invalid.
        InvalidBlockHash => "INVALID_BLOCK_HASH",
        /// The state root does not match the post state.
        InvalidStateRoot => "INVALID_STATE_ROOT",
        /// The gas used does not match execution.
        InvalidGasUsed => "INVALID_GAS_USED",
        /// The base fee is not derived from the parent.
        InvalidBasefeePerGas => "INVALID_BASEFEE_PER_GAS",
        /// The logs bloom does not match the receipts.
        InvalidLogBloom => "INVALID_LOG_BLOOM",
        /// The receipts root does not match the receipts.
        InvalidReceiptsRoot => "INVALID_RECEIPTS_ROOT",
        /// The timestamp is not after the parent timestamp.
        InvalidBlockTimestampOlderThanParent => "INVALID_BLOCK_TIMESTAMP_OLDER_THAN_PARENT",
        /// The block number does not follow the parent number.
        InvalidBlockNumber => "INVALID_BLOCK_NUMBER",
        /// The gas used exceeds the gas limit.
        GasUsedOverflow => "GAS_USED_OVERFLOW",
        /// The extra data exceeds 32 bytes.
        ExtraDataTooBig => "EXTRA_DATA_TOO_BIG",
    }
);

/// A transaction or block exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Exception {
    /// A transaction exception.
    Transaction(TransactionException),
    /// A block exception.
    Block(BlockException),
}

impl From<TransactionException> for Exception {
    fn from(exception: TransactionException) -> Self {
        Self::Transaction(exception)
    }
}

impl From<BlockException> for Exception {
    fn from(exception: BlockException) -> Self {
        Self::Block(exception)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction(e) => write!(f, "TransactionException.{}", e.as_str()),
            Self::Block(e) => write!(f, "BlockException.{}", e.as_str()),
        }
    }
}

impl FromStr for Exception {
    type Err = ExceptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('.') {
            Some(("TransactionException", name)) => name.parse().map(Self::Transaction),
            Some(("BlockException", name)) => name.parse().map(Self::Block),
            Some(_) => Err(ExceptionParseError::UnknownException(s.to_string())),
            None => name_lookup(s),
        }
    }
}

fn name_lookup(name: &str) -> Result<Exception, ExceptionParseError> {
    name.parse::<TransactionException>()
        .map(Exception::Transaction)
        .or_else(|_| name.parse::<BlockException>().map(Exception::Block))
}

/// One or more exceptions, any of which a client may report for a rejected transaction or
/// block.
///
/// Serialized as the `|` separated list of exception names. Deserializes from that form or
/// from a JSON list of names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExceptionSet(Vec<Exception>);

impl ExceptionSet {
    /// Creates a set from a list of exceptions.
    pub fn new(exceptions: impl IntoIterator<Item = impl Into<Exception>>) -> Self {
        Self(exceptions.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if the set contains `exception`.
    pub fn contains(&self, exception: impl Into<Exception>) -> bool {
        let exception = exception.into();
        self.0.contains(&exception)
    }

    /// Returns the exceptions of the set.
    pub fn iter(&self) -> impl Iterator<Item = &Exception> {
        self.0.iter()
    }

    /// Returns `true` if the block body itself is malformed, in which case it has no decoded
    /// representation.
    pub fn is_rlp_structure_error(&self) -> bool {
        self.contains(BlockException::RlpStructuresEncoding)
    }
}

impl From<Exception> for ExceptionSet {
    fn from(exception: Exception) -> Self {
        Self(vec![exception])
    }
}

impl From<TransactionException> for ExceptionSet {
    fn from(exception: TransactionException) -> Self {
        Exception::from(exception).into()
    }
}

impl From<BlockException> for ExceptionSet {
    fn from(exception: BlockException) -> Self {
        Exception::from(exception).into()
    }
}

impl fmt::Display for ExceptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, exception) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{exception}")?;
        }
        Ok(())
    }
}

impl FromStr for ExceptionSet {
    type Err = ExceptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split('|').map(str::parse).collect::<Result<_, _>>().map(Self)
    }
}

impl Serialize for ExceptionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExceptionSetRepr {
    Joined(String),
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for ExceptionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let set = match ExceptionSetRepr::deserialize(deserializer)? {
            ExceptionSetRepr::Joined(s) => s.parse(),
            ExceptionSetRepr::List(list) => {
                list.iter().map(|s| s.parse()).collect::<Result<_, _>>().map(Self)
            }
        };
        set.map_err(D::Error::custom)
    }
}

/// An engine API error a client is expected to return for a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineApiError {
    /// Invalid JSON was received.
    ParseError,
    /// The JSON sent is not a valid request object.
    InvalidRequest,
    /// The method does not exist.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
    /// Generic client error while processing the request.
    ServerError,
    /// The payload does not exist or is not available.
    UnknownPayload,
    /// The forkchoice state is invalid or inconsistent.
    InvalidForkchoiceState,
    /// The payload attributes are invalid or inconsistent.
    InvalidPayloadAttributes,
    /// The number of requested entities is too large.
    TooLargeRequest,
    /// The payload belongs to a fork the method does not support.
    UnsupportedFork,
}

impl EngineApiError {
    /// Returns the JSON-RPC error code.
    pub const fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::UnknownPayload => -38001,
            Self::InvalidForkchoiceState => -38002,
            Self::InvalidPayloadAttributes => -38003,
            Self::TooLargeRequest => -38004,
            Self::UnsupportedFork => -38005,
        }
    }
}

impl TryFrom<i32> for EngineApiError {
    type Error = ExceptionParseError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Ok(match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32000 => Self::ServerError,
            -38001 => Self::UnknownPayload,
            -38002 => Self::InvalidForkchoiceState,
            -38003 => Self::InvalidPayloadAttributes,
            -38004 => Self::TooLargeRequest,
            -38005 => Self::UnsupportedFork,
            code => return Err(ExceptionParseError::UnknownErrorCode(code)),
        })
    }
}

impl Serialize for EngineApiError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for EngineApiError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i32::deserialize(deserializer)?.try_into().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("TransactionException.INSUFFICIENT_ACCOUNT_FUNDS")]
    #[case("BlockException.INCORRECT_BLOCK_FORMAT")]
    #[case("BlockException.RLP_STRUCTURES_ENCODING|BlockException.INCORRECT_BLOCK_FORMAT")]
    fn test_exception_set_display(#[case] s: &str) {
        let set: ExceptionSet = s.parse().unwrap();
        assert_eq!(set.to_string(), s);
    }

    #[test]
    fn test_exception_set_json() {
        let set: ExceptionSet = serde_json::from_str(
            r#"["TransactionException.NONCE_MISMATCH_TOO_LOW", "INTRINSIC_GAS_TOO_LOW"]"#,
        )
        .unwrap();
        assert!(set.contains(TransactionException::NonceMismatchTooLow));
        assert!(set.contains(TransactionException::IntrinsicGasTooLow));
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#""TransactionException.NONCE_MISMATCH_TOO_LOW|TransactionException.INTRINSIC_GAS_TOO_LOW""#
        );
    }

    #[test]
    fn test_rlp_structure_error() {
        let set = ExceptionSet::new([
            BlockException::RlpStructuresEncoding,
            BlockException::IncorrectBlockFormat,
        ]);
        assert!(set.is_rlp_structure_error());
        assert!(!ExceptionSet::from(BlockException::IncorrectBlockFormat).is_rlp_structure_error());
    }

    #[test]
    fn test_unknown_exception() {
        assert_eq!(
            "BlockException.NOT_A_THING".parse::<ExceptionSet>(),
            Err(ExceptionParseError::UnknownException("NOT_A_THING".to_string()))
        );
        assert!("Foo.INTRINSIC_GAS_TOO_LOW".parse::<Exception>().is_err());
    }

    #[rstest]
    #[case(EngineApiError::InvalidParams, -32602)]
    #[case(EngineApiError::UnsupportedFork, -38005)]
    #[case(EngineApiError::ServerError, -32000)]
    fn test_engine_api_error_code(#[case] error: EngineApiError, #[case] code: i32) {
        assert_eq!(error.code(), code);
        assert_eq!(EngineApiError::try_from(code), Ok(error));
        assert_eq!(serde_json::to_string(&error).unwrap(), code.to_string());
    }
}
