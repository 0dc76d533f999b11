//! Execution layer requests: validator deposits, withdrawals and consolidations.

use alloy_primitives::{Address, FixedBytes, B256};
use alloy_rlp::{BufMut, Encodable, Header, RlpEncodable};
use derive_more::From;
use serde::{Deserialize, Serialize};

/// A BLS public key.
pub type BlsPublicKey = FixedBytes<48>;

/// A BLS signature.
pub type BlsSignature = FixedBytes<96>;

/// A validator deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RlpEncodable)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    /// The validator public key.
    pub pubkey: BlsPublicKey,
    /// The withdrawal credentials.
    pub withdrawal_credentials: B256,
    /// The deposited amount, in gwei.
    #[serde(with = "alloy_serde::quantity")]
    pub amount: u64,
    /// The deposit signature.
    pub signature: BlsSignature,
    /// The deposit index.
    #[serde(with = "alloy_serde::quantity")]
    pub index: u64,
}

/// A withdrawal triggered from the execution layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RlpEncodable)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    /// The address that sent the request.
    pub source_address: Address,
    /// The public key of the exiting validator.
    pub validator_pubkey: BlsPublicKey,
    /// The withdrawn amount, in gwei.
    #[serde(with = "alloy_serde::quantity")]
    pub amount: u64,
}

/// A validator consolidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, RlpEncodable)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationRequest {
    /// The address that sent the request.
    pub source_address: Address,
    /// The public key of the source validator.
    pub source_pubkey: BlsPublicKey,
    /// The public key of the target validator.
    pub target_pubkey: BlsPublicKey,
}

/// A typed execution layer request.
#[derive(Debug, Clone, PartialEq, Eq, From, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    /// A deposit, type `0x00`.
    Deposit(DepositRequest),
    /// A withdrawal, type `0x01`.
    Withdrawal(WithdrawalRequest),
    /// A consolidation, type `0x02`.
    Consolidation(ConsolidationRequest),
}

impl Request {
    /// Returns the request type byte.
    pub const fn request_type(&self) -> u8 {
        match self {
            Self::Deposit(_) => 0x00,
            Self::Withdrawal(_) => 0x01,
            Self::Consolidation(_) => 0x02,
        }
    }

    fn payload_length(&self) -> usize {
        match self {
            Self::Deposit(r) => r.length(),
            Self::Withdrawal(r) => r.length(),
            Self::Consolidation(r) => r.length(),
        }
    }

    /// Writes the type byte followed by the RLP encoding of the request.
    pub fn encode_typed(&self, out: &mut dyn BufMut) {
        out.put_u8(self.request_type());
        match self {
            Self::Deposit(r) => r.encode(out),
            Self::Withdrawal(r) => r.encode(out),
            Self::Consolidation(r) => r.encode(out),
        }
    }

    /// Returns the typed encoding of the request.
    pub fn typed_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload_length());
        self.encode_typed(&mut out);
        out
    }
}

/// Encodes the request as an element of a block body: a byte string holding the typed
/// encoding.
impl Encodable for Request {
    fn encode(&self, out: &mut dyn BufMut) {
        Header { list: false, payload_length: 1 + self.payload_length() }.encode(out);
        self.encode_typed(out);
    }

    fn length(&self) -> usize {
        let payload_length = 1 + self.payload_length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

/// The ordered requests of a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requests(pub Vec<Request>);

impl Requests {
    /// Concatenates deposits, then withdrawals, then consolidations.
    pub fn from_parts(
        deposits: impl IntoIterator<Item = DepositRequest>,
        withdrawals: impl IntoIterator<Item = WithdrawalRequest>,
        consolidations: impl IntoIterator<Item = ConsolidationRequest>,
    ) -> Self {
        Self(
            deposits
                .into_iter()
                .map(Request::from)
                .chain(withdrawals.into_iter().map(Request::from))
                .chain(consolidations.into_iter().map(Request::from))
                .collect(),
        )
    }

    /// Computes the requests trie root.
    pub fn trie_root(&self) -> B256 {
        eft_mpt::ordered_trie_with_encoder(&self.0, |request, buf| request.encode_typed(buf)).root()
    }

    /// Returns the deposit requests.
    pub fn deposits(&self) -> Vec<DepositRequest> {
        self.0
            .iter()
            .filter_map(|r| match r {
                Request::Deposit(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the withdrawal requests.
    pub fn withdrawals(&self) -> Vec<WithdrawalRequest> {
        self.0
            .iter()
            .filter_map(|r| match r {
                Request::Withdrawal(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the consolidation requests.
    pub fn consolidations(&self) -> Vec<ConsolidationRequest> {
        self.0
            .iter()
            .filter_map(|r| match r {
                Request::Consolidation(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of requests.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no requests.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Encodable for Requests {
    fn encode(&self, out: &mut dyn BufMut) {
        self.0.encode(out)
    }

    fn length(&self) -> usize {
        self.0.length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use eft_mpt::EMPTY_ROOT_HASH;

    fn deposit(index: u64) -> DepositRequest {
        DepositRequest {
            pubkey: BlsPublicKey::repeat_byte(0x01),
            withdrawal_credentials: B256::repeat_byte(0x02),
            amount: 32_000_000_000,
            signature: BlsSignature::repeat_byte(0x03),
            index,
        }
    }

    fn withdrawal() -> WithdrawalRequest {
        WithdrawalRequest {
            source_address: address!("1000000000000000000000000000000000000001"),
            validator_pubkey: BlsPublicKey::repeat_byte(0x04),
            amount: 0,
        }
    }

    fn consolidation() -> ConsolidationRequest {
        ConsolidationRequest {
            source_address: address!("1000000000000000000000000000000000000002"),
            source_pubkey: BlsPublicKey::repeat_byte(0x05),
            target_pubkey: BlsPublicKey::repeat_byte(0x06),
        }
    }

    #[test]
    fn test_concatenation_order() {
        let requests =
            Requests::from_parts([deposit(0), deposit(1)], [withdrawal()], [consolidation()]);
        let types = requests.0.iter().map(Request::request_type).collect::<Vec<_>>();
        assert_eq!(types, vec![0, 0, 1, 2]);
        assert_eq!(requests.deposits().len(), 2);
        assert_eq!(requests.withdrawals(), vec![withdrawal()]);
        assert_eq!(requests.consolidations(), vec![consolidation()]);
    }

    #[test]
    fn test_empty_root() {
        assert_eq!(Requests::default().trie_root(), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_root_depends_on_order() {
        let a = Requests(vec![withdrawal().into(), consolidation().into()]);
        let b = Requests(vec![consolidation().into(), withdrawal().into()]);
        assert_ne!(a.trie_root(), b.trie_root());
    }

    #[test]
    fn test_typed_encoding() {
        let request = Request::from(withdrawal());
        let typed = request.typed_bytes();
        assert_eq!(typed[0], 0x01);
        assert_eq!(&typed[1..], alloy_rlp::encode(withdrawal()).as_slice());

        let encoded = alloy_rlp::encode(&request);
        assert_eq!(encoded.len(), request.length());
        assert_eq!(&encoded[encoded.len() - typed.len()..], typed.as_slice());
    }

    #[test]
    fn test_request_json() {
        let json = serde_json::to_value(Request::from(deposit(3))).unwrap();
        assert_eq!(json["type"], "deposit");
        assert_eq!(json["amount"], "0x773594000");
        assert_eq!(json["index"], "0x3");
        let request: Request = serde_json::from_value(json).unwrap();
        assert_eq!(request, Request::Deposit(deposit(3)));
    }
}
