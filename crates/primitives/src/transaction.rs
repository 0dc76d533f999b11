//! Signed transactions as carried by test blocks.

use crate::ExceptionSet;
use alloy_consensus::{Transaction as _, TxEnvelope};
use alloy_eips::eip2718::{Decodable2718, Eip2718Result};
use alloy_primitives::{keccak256, Bytes, B256};
use alloy_rlp::{BufMut, Encodable};
use serde::{Deserialize, Serialize};

/// A signed transaction of a test block, with the exception it is expected to raise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The [EIP-2718] encoding of the transaction.
    ///
    /// [EIP-2718]: https://eips.ethereum.org/EIPS/eip-2718
    pub rlp: Bytes,
    /// The exception the transaction is expected to raise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExceptionSet>,
}

impl Transaction {
    /// Creates a transaction expected to be included.
    pub const fn new(rlp: Bytes) -> Self {
        Self { rlp, error: None }
    }

    /// Marks the transaction as expected to fail with `error`.
    pub fn with_error(mut self, error: impl Into<ExceptionSet>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns the transaction hash.
    pub fn hash(&self) -> B256 {
        keccak256(&self.rlp)
    }

    /// Returns `true` for legacy transactions, which carry no type byte.
    pub fn is_legacy(&self) -> bool {
        self.rlp.first().is_some_and(|b| *b >= 0xc0)
    }

    /// Decodes the transaction.
    pub fn envelope(&self) -> Eip2718Result<TxEnvelope> {
        TxEnvelope::decode_2718(&mut self.rlp.as_ref())
    }

    /// Returns the number of blobs the transaction carries.
    pub fn blob_count(&self) -> Eip2718Result<usize> {
        Ok(self.envelope()?.blob_versioned_hashes().map_or(0, |hashes| hashes.len()))
    }

    /// Returns the blob versioned hashes of the transaction.
    pub fn blob_versioned_hashes(&self) -> Eip2718Result<Vec<B256>> {
        Ok(self.envelope()?.blob_versioned_hashes().map(<[B256]>::to_vec).unwrap_or_default())
    }
}

/// Encodes the transaction as an element of a block body: legacy transactions as their raw
/// list, typed transactions as a byte string.
impl Encodable for Transaction {
    fn encode(&self, out: &mut dyn BufMut) {
        if self.is_legacy() {
            out.put_slice(&self.rlp);
        } else {
            self.rlp.encode(out);
        }
    }

    fn length(&self) -> usize {
        if self.is_legacy() {
            self.rlp.len()
        } else {
            self.rlp.length()
        }
    }
}

/// Computes the transactions trie root of a block.
pub fn transactions_root(transactions: &[Transaction]) -> B256 {
    eft_mpt::ordered_trie_with_encoder(transactions, |tx, buf| buf.put_slice(&tx.rlp)).root()
}
