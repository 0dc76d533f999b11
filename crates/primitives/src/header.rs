//! Fixture headers and header field overrides.

use crate::zero_padded;
use alloy_consensus::Header;
use alloy_primitives::{Address, Bloom, Bytes, B256, B64, U256};
use alloy_rlp::{BufMut, Encodable};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Debug;
use thiserror::Error;

/// The concrete, fork-correct header of a generated block.
///
/// Optional fields are absent from the RLP encoding when `None`, which allows tests to produce
/// intentionally malformed headers by removing fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureHeader {
    /// The parent block hash.
    pub parent_hash: B256,
    /// The ommers list hash.
    #[serde(rename = "uncleHash")]
    pub ommers_hash: B256,
    /// The fee recipient.
    #[serde(rename = "coinbase")]
    pub fee_recipient: Address,
    /// The state root.
    pub state_root: B256,
    /// The transactions trie root.
    #[serde(rename = "transactionsTrie")]
    pub transactions_trie: B256,
    /// The receipts trie root.
    #[serde(rename = "receiptTrie")]
    pub receipts_root: B256,
    /// The logs bloom.
    #[serde(rename = "bloom")]
    pub logs_bloom: Bloom,
    /// The block difficulty.
    #[serde(with = "zero_padded")]
    pub difficulty: U256,
    /// The block number.
    #[serde(with = "zero_padded")]
    pub number: u64,
    /// The block gas limit.
    #[serde(with = "zero_padded")]
    pub gas_limit: u64,
    /// The gas used by the block.
    #[serde(with = "zero_padded")]
    pub gas_used: u64,
    /// The block timestamp.
    #[serde(with = "zero_padded")]
    pub timestamp: u64,
    /// The block extra data.
    pub extra_data: Bytes,
    /// The mix hash, or the previous randao value post-merge.
    #[serde(rename = "mixHash")]
    pub prev_randao: B256,
    /// The proof of work nonce.
    pub nonce: B64,
    /// The base fee per gas.
    #[serde(default, with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<u64>,
    /// The withdrawals trie root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    /// The blob gas used by the block.
    #[serde(default, with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    /// The excess blob gas.
    #[serde(default, with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<u64>,
    /// The parent beacon block root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
    /// The execution layer requests trie root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_root: Option<B256>,
}

impl FixtureHeader {
    /// Returns the consensus representation of the header.
    pub fn to_consensus(&self) -> Header {
        Header {
            parent_hash: self.parent_hash,
            ommers_hash: self.ommers_hash,
            beneficiary: self.fee_recipient,
            state_root: self.state_root,
            transactions_root: self.transactions_trie,
            receipts_root: self.receipts_root,
            logs_bloom: self.logs_bloom,
            difficulty: self.difficulty,
            number: self.number,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            timestamp: self.timestamp,
            extra_data: self.extra_data.clone(),
            mix_hash: self.prev_randao,
            nonce: self.nonce,
            base_fee_per_gas: self.base_fee_per_gas,
            withdrawals_root: self.withdrawals_root,
            blob_gas_used: self.blob_gas_used,
            excess_blob_gas: self.excess_blob_gas,
            parent_beacon_block_root: self.parent_beacon_block_root,
            requests_hash: self.requests_root,
            ..Default::default()
        }
    }

    /// Returns the RLP encoding of the header.
    pub fn rlp(&self) -> Bytes {
        alloy_rlp::encode(self.to_consensus()).into()
    }

    /// Computes the block hash.
    pub fn hash(&self) -> B256 {
        self.to_consensus().hash_slow()
    }

    /// Seals the header with its hash.
    pub fn seal(self) -> SealedHeader {
        let hash = self.hash();
        SealedHeader { header: self, hash }
    }
}

impl Encodable for FixtureHeader {
    fn encode(&self, out: &mut dyn BufMut) {
        self.to_consensus().encode(out)
    }

    fn length(&self) -> usize {
        self.to_consensus().length()
    }
}

/// A [FixtureHeader] together with its block hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedHeader {
    /// The header.
    #[serde(flatten)]
    pub header: FixtureHeader,
    /// The hash of the header.
    pub hash: B256,
}

impl core::ops::Deref for SealedHeader {
    type Target = FixtureHeader;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}

/// An override of an optional header field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HeaderField<T> {
    /// The field is not overridden.
    #[default]
    Unset,
    /// The field is set to the given value.
    SetTo(T),
    /// The field is removed from the header.
    Removed,
    /// During verification, the field must be absent from the header.
    MustBeEmpty,
}

impl<T> HeaderField<T> {
    /// Returns `true` if the field is not overridden.
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns `true` if the field is removed.
    pub const fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }

    /// Returns the value the field is set to, if any.
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::SetTo(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Clone> HeaderField<T> {
    /// Applies the override to a header field.
    pub fn apply(&self, field: Option<T>) -> Option<T> {
        match self {
            Self::Unset => field,
            Self::SetTo(value) => Some(value.clone()),
            Self::Removed | Self::MustBeEmpty => None,
        }
    }
}

impl<T> From<T> for HeaderField<T> {
    fn from(value: T) -> Self {
        Self::SetTo(value)
    }
}

const REMOVE_FIELD: &str = "REMOVE_FIELD";
const EMPTY_FIELD: &str = "EMPTY_FIELD";

#[derive(Deserialize)]
enum Marker {
    #[serde(rename = "REMOVE_FIELD")]
    Remove,
    #[serde(rename = "EMPTY_FIELD")]
    Empty,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderFieldRepr<T> {
    Marker(Marker),
    Value(Option<T>),
}

impl<T: Serialize> Serialize for HeaderField<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unset => serializer.serialize_none(),
            Self::SetTo(value) => value.serialize(serializer),
            Self::Removed => serializer.serialize_str(REMOVE_FIELD),
            Self::MustBeEmpty => serializer.serialize_str(EMPTY_FIELD),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for HeaderField<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match HeaderFieldRepr::deserialize(deserializer)? {
            HeaderFieldRepr::Marker(Marker::Remove) => Self::Removed,
            HeaderFieldRepr::Marker(Marker::Empty) => Self::MustBeEmpty,
            HeaderFieldRepr::Value(Some(value)) => Self::SetTo(value),
            HeaderFieldRepr::Value(None) => Self::Unset,
        })
    }
}

/// A header field that failed verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderMismatch {
    /// The field value differs from the expected value.
    #[error("invalid header field ({field}) value, got {got}, want {want}")]
    Value {
        /// The field name.
        field: &'static str,
        /// The value in the header.
        got: String,
        /// The expected value.
        want: String,
    },
    /// The field was expected to be absent.
    #[error("invalid header field {field}, got {got}, want None")]
    NotEmpty {
        /// The field name.
        field: &'static str,
        /// The value in the header.
        got: String,
    },
    /// A removal marker cannot be verified.
    #[error("invalid header: field {0} is marked for removal in a verification set")]
    RemovalMarker(&'static str),
}

/// Header field overrides, as declared by a test.
///
/// Mandatory fields can only be set; the optional trailing fields can also be removed or, in
/// a verification set, required to be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderOverrides {
    /// The parent block hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<B256>,
    /// The ommers list hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ommers_hash: Option<B256>,
    /// The fee recipient.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_recipient: Option<Address>,
    /// The state root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_root: Option<B256>,
    /// The transactions trie root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions_trie: Option<B256>,
    /// The receipts trie root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipts_root: Option<B256>,
    /// The logs bloom.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_bloom: Option<Bloom>,
    /// The block difficulty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<U256>,
    /// The block number.
    #[serde(with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    /// The block gas limit.
    #[serde(with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// The gas used by the block.
    #[serde(with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    /// The block timestamp.
    #[serde(with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// The block extra data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<Bytes>,
    /// The previous randao value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_randao: Option<B256>,
    /// The proof of work nonce.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<B64>,
    /// The base fee per gas.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub base_fee_per_gas: HeaderField<u64>,
    /// The withdrawals trie root.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub withdrawals_root: HeaderField<B256>,
    /// The blob gas used.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub blob_gas_used: HeaderField<u64>,
    /// The excess blob gas.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub excess_blob_gas: HeaderField<u64>,
    /// The parent beacon block root.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub parent_beacon_block_root: HeaderField<B256>,
    /// The execution layer requests trie root.
    #[serde(skip_serializing_if = "HeaderField::is_unset")]
    pub requests_root: HeaderField<B256>,
}

impl HeaderOverrides {
    /// Returns a copy of `target` with every set field replaced and every removed field
    /// cleared.
    pub fn apply(&self, target: &FixtureHeader) -> FixtureHeader {
        let target = target.clone();
        FixtureHeader {
            parent_hash: self.parent_hash.unwrap_or(target.parent_hash),
            ommers_hash: self.ommers_hash.unwrap_or(target.ommers_hash),
            fee_recipient: self.fee_recipient.unwrap_or(target.fee_recipient),
            state_root: self.state_root.unwrap_or(target.state_root),
            transactions_trie: self.transactions_trie.unwrap_or(target.transactions_trie),
            receipts_root: self.receipts_root.unwrap_or(target.receipts_root),
            logs_bloom: self.logs_bloom.unwrap_or(target.logs_bloom),
            difficulty: self.difficulty.unwrap_or(target.difficulty),
            number: self.number.unwrap_or(target.number),
            gas_limit: self.gas_limit.unwrap_or(target.gas_limit),
            gas_used: self.gas_used.unwrap_or(target.gas_used),
            timestamp: self.timestamp.unwrap_or(target.timestamp),
            extra_data: self.extra_data.clone().unwrap_or(target.extra_data),
            prev_randao: self.prev_randao.unwrap_or(target.prev_randao),
            nonce: self.nonce.unwrap_or(target.nonce),
            base_fee_per_gas: self.base_fee_per_gas.apply(target.base_fee_per_gas),
            withdrawals_root: self.withdrawals_root.apply(target.withdrawals_root),
            blob_gas_used: self.blob_gas_used.apply(target.blob_gas_used),
            excess_blob_gas: self.excess_blob_gas.apply(target.excess_blob_gas),
            parent_beacon_block_root: self
                .parent_beacon_block_root
                .apply(target.parent_beacon_block_root),
            requests_root: self.requests_root.apply(target.requests_root),
        }
    }

    /// Checks every declared field against `target`.
    pub fn verify(&self, target: &FixtureHeader) -> Result<(), HeaderMismatch> {
        verify_set("parent_hash", &self.parent_hash, &target.parent_hash)?;
        verify_set("ommers_hash", &self.ommers_hash, &target.ommers_hash)?;
        verify_set("fee_recipient", &self.fee_recipient, &target.fee_recipient)?;
        verify_set("state_root", &self.state_root, &target.state_root)?;
        verify_set("transactions_trie", &self.transactions_trie, &target.transactions_trie)?;
        verify_set("receipts_root", &self.receipts_root, &target.receipts_root)?;
        verify_set("logs_bloom", &self.logs_bloom, &target.logs_bloom)?;
        verify_set("difficulty", &self.difficulty, &target.difficulty)?;
        verify_set("number", &self.number, &target.number)?;
        verify_set("gas_limit", &self.gas_limit, &target.gas_limit)?;
        verify_set("gas_used", &self.gas_used, &target.gas_used)?;
        verify_set("timestamp", &self.timestamp, &target.timestamp)?;
        verify_set("extra_data", &self.extra_data, &target.extra_data)?;
        verify_set("prev_randao", &self.prev_randao, &target.prev_randao)?;
        verify_set("nonce", &self.nonce, &target.nonce)?;
        verify_field("base_fee_per_gas", &self.base_fee_per_gas, &target.base_fee_per_gas)?;
        verify_field("withdrawals_root", &self.withdrawals_root, &target.withdrawals_root)?;
        verify_field("blob_gas_used", &self.blob_gas_used, &target.blob_gas_used)?;
        verify_field("excess_blob_gas", &self.excess_blob_gas, &target.excess_blob_gas)?;
        verify_field(
            "parent_beacon_block_root",
            &self.parent_beacon_block_root,
            &target.parent_beacon_block_root,
        )?;
        verify_field("requests_root", &self.requests_root, &target.requests_root)
    }
}

fn verify_set<T: PartialEq + Debug>(
    field: &'static str,
    want: &Option<T>,
    got: &T,
) -> Result<(), HeaderMismatch> {
    match want {
        Some(want) if want != got => Err(HeaderMismatch::Value {
            field,
            got: format!("{got:?}"),
            want: format!("{want:?}"),
        }),
        _ => Ok(()),
    }
}

fn verify_field<T: PartialEq + Debug>(
    field: &'static str,
    want: &HeaderField<T>,
    got: &Option<T>,
) -> Result<(), HeaderMismatch> {
    match (want, got) {
        (HeaderField::Unset, _) | (HeaderField::MustBeEmpty, None) => Ok(()),
        (HeaderField::Removed, _) => Err(HeaderMismatch::RemovalMarker(field)),
        (HeaderField::MustBeEmpty, Some(got)) => {
            Err(HeaderMismatch::NotEmpty { field, got: format!("{got:?}") })
        }
        (HeaderField::SetTo(want), Some(got)) if want == got => Ok(()),
        (HeaderField::SetTo(want), got) => Err(HeaderMismatch::Value {
            field,
            got: format!("{got:?}"),
            want: format!("{want:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::{EMPTY_OMMER_ROOT_HASH, EMPTY_ROOT_HASH};
    use alloy_primitives::{b256, bytes};
    use rstest::rstest;

    fn cancun_header() -> FixtureHeader {
        FixtureHeader {
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            transactions_trie: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            gas_limit: 100_000_000_000_000_000,
            extra_data: bytes!("00"),
            base_fee_per_gas: Some(7),
            withdrawals_root: Some(EMPTY_ROOT_HASH),
            blob_gas_used: Some(0),
            excess_blob_gas: Some(0),
            parent_beacon_block_root: Some(B256::ZERO),
            ..Default::default()
        }
    }

    #[test]
    fn test_header_json_keys() {
        let json = serde_json::to_value(cancun_header().seal()).unwrap();
        for key in [
            "parentHash",
            "uncleHash",
            "coinbase",
            "stateRoot",
            "transactionsTrie",
            "receiptTrie",
            "bloom",
            "difficulty",
            "number",
            "gasLimit",
            "gasUsed",
            "timestamp",
            "extraData",
            "mixHash",
            "nonce",
            "baseFeePerGas",
            "withdrawalsRoot",
            "blobGasUsed",
            "excessBlobGas",
            "parentBeaconBlockRoot",
            "hash",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("requestsRoot").is_none());
        assert_eq!(json["number"], "0x00");
        assert_eq!(json["baseFeePerGas"], "0x07");
    }

    #[test]
    fn test_seal_matches_consensus_hash() {
        let header = cancun_header();
        let sealed = header.clone().seal();
        assert_eq!(sealed.hash, header.to_consensus().hash_slow());
        assert_eq!(alloy_primitives::keccak256(header.rlp()), sealed.hash);
    }

    #[test]
    fn test_removed_field_shortens_rlp() {
        let header = cancun_header();
        let overrides = HeaderOverrides {
            excess_blob_gas: HeaderField::Removed,
            ..Default::default()
        };
        let modified = overrides.apply(&header);
        assert_eq!(modified.excess_blob_gas, None);
        assert_eq!(modified.blob_gas_used, Some(0));
        assert!(modified.rlp().len() < header.rlp().len());
        assert_ne!(modified.hash(), header.hash());
    }

    #[test]
    fn test_apply_sets_fields() {
        let root = b256!("1111111111111111111111111111111111111111111111111111111111111111");
        let overrides = HeaderOverrides {
            state_root: Some(root),
            base_fee_per_gas: HeaderField::SetTo(8),
            ..Default::default()
        };
        let modified = overrides.apply(&cancun_header());
        assert_eq!(modified.state_root, root);
        assert_eq!(modified.base_fee_per_gas, Some(8));
        assert_eq!(modified.withdrawals_root, Some(EMPTY_ROOT_HASH));
    }

    #[rstest]
    #[case::matching(HeaderOverrides { gas_used: Some(0), ..Default::default() }, true)]
    #[case::mismatch(HeaderOverrides { gas_used: Some(1), ..Default::default() }, false)]
    #[case::must_be_empty_present(
        HeaderOverrides { blob_gas_used: HeaderField::MustBeEmpty, ..Default::default() },
        false
    )]
    #[case::must_be_empty_absent(
        HeaderOverrides { requests_root: HeaderField::MustBeEmpty, ..Default::default() },
        true
    )]
    #[case::removal_marker(
        HeaderOverrides { requests_root: HeaderField::Removed, ..Default::default() },
        false
    )]
    fn test_verify(#[case] overrides: HeaderOverrides, #[case] ok: bool) {
        assert_eq!(overrides.verify(&cancun_header()).is_ok(), ok);
    }

    #[test]
    fn test_must_be_empty_is_not_zero() {
        let overrides =
            HeaderOverrides { excess_blob_gas: HeaderField::MustBeEmpty, ..Default::default() };
        assert_eq!(
            overrides.verify(&cancun_header()),
            Err(HeaderMismatch::NotEmpty { field: "excess_blob_gas", got: "0".into() })
        );
    }

    #[test]
    fn test_header_field_json() {
        let overrides: HeaderOverrides = serde_json::from_str(
            r#"{"excessBlobGas":"REMOVE_FIELD","blobGasUsed":"EMPTY_FIELD","baseFeePerGas":9,"number":"0x01"}"#,
        )
        .unwrap();
        assert_eq!(overrides.excess_blob_gas, HeaderField::Removed);
        assert_eq!(overrides.blob_gas_used, HeaderField::MustBeEmpty);
        assert_eq!(overrides.base_fee_per_gas, HeaderField::SetTo(9));
        assert_eq!(overrides.number, Some(1));
        assert!(overrides.withdrawals_root.is_unset());

        let json = serde_json::to_value(&overrides).unwrap();
        assert_eq!(json["excessBlobGas"], "REMOVE_FIELD");
        assert!(json.get("withdrawalsRoot").is_none());
    }
}
