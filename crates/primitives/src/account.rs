//! Accounts and account allocations.

use crate::zero_padded;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use eft_mpt::{TrieAccount, KECCAK_EMPTY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// An account in a state allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// The account nonce.
    #[serde(default, with = "zero_padded")]
    pub nonce: u64,
    /// The account balance, in wei.
    #[serde(default, with = "zero_padded")]
    pub balance: U256,
    /// The account code.
    #[serde(default)]
    pub code: Bytes,
    /// The account storage.
    #[serde(default)]
    pub storage: BTreeMap<U256, U256>,
}

impl Account {
    /// Returns `true` if the account has no nonce, no balance and no code.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code.is_empty()
    }

    /// Returns the keccak hash of the account code.
    pub fn code_hash(&self) -> B256 {
        if self.code.is_empty() {
            KECCAK_EMPTY
        } else {
            keccak256(&self.code)
        }
    }

    /// Returns the account as committed to in the state trie.
    pub fn trie_account(&self) -> TrieAccount {
        TrieAccount {
            nonce: self.nonce,
            balance: self.balance,
            storage_root: eft_mpt::storage_root(self.storage.iter().map(|(k, v)| (*k, *v))),
            code_hash: self.code_hash(),
        }
    }
}

/// A state allocation: every account of the state keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alloc(pub BTreeMap<Address, Account>);

impl Alloc {
    /// Returns the allocation with the accounts of `other` layered on top. Accounts present in
    /// both are replaced, not merged.
    pub fn merge(mut self, other: Self) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Returns the addresses of all empty accounts.
    pub fn empty_accounts(&self) -> Vec<Address> {
        self.0.iter().filter(|(_, account)| account.is_empty()).map(|(a, _)| *a).collect()
    }

    /// Computes the merkle patricia trie state root of the allocation.
    pub fn state_root(&self) -> B256 {
        eft_mpt::state_root(self.0.iter().map(|(a, account)| (*a, account.trie_account())))
    }

    /// Returns the account at `address`.
    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.0.get(address)
    }

    /// Inserts an account, returning the account previously at `address`.
    pub fn insert(&mut self, address: Address, account: Account) -> Option<Account> {
        self.0.insert(address, account)
    }

    /// Returns the number of accounts.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the allocation holds no accounts.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Address, Account)> for Alloc {
    fn from_iter<I: IntoIterator<Item = (Address, Account)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The expected state of an account after the last block of a test.
///
/// Unset fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedAccount {
    /// The expected nonce.
    #[serde(default, with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    /// The expected balance.
    #[serde(default, with = "zero_padded::opt", skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    /// The expected code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    /// The expected storage. Slots missing from the map are expected to be zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<U256, U256>>,
}

/// A mismatch between the expected and the actual post state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostStateMismatch {
    /// An account expected to exist is missing.
    #[error("Account {0} was expected to exist but is missing from the post state")]
    MissingAccount(Address),
    /// An account expected not to exist is present.
    #[error("Account {0} was expected not to exist")]
    UnexpectedAccount(Address),
    /// Nonce mismatch.
    #[error("Account {address} nonce mismatch: want {want}, got {got}")]
    Nonce {
        /// The account address.
        address: Address,
        /// The expected nonce.
        want: u64,
        /// The actual nonce.
        got: u64,
    },
    /// Balance mismatch.
    #[error("Account {address} balance mismatch: want {want}, got {got}")]
    Balance {
        /// The account address.
        address: Address,
        /// The expected balance.
        want: U256,
        /// The actual balance.
        got: U256,
    },
    /// Code mismatch.
    #[error("Account {address} code mismatch: want {want}, got {got}")]
    Code {
        /// The account address.
        address: Address,
        /// The expected code.
        want: Bytes,
        /// The actual code.
        got: Bytes,
    },
    /// Storage slot mismatch.
    #[error("Account {address} storage slot {slot:#x} mismatch: want {want:#x}, got {got:#x}")]
    Storage {
        /// The account address.
        address: Address,
        /// The storage slot.
        slot: U256,
        /// The expected value.
        want: U256,
        /// The actual value.
        got: U256,
    },
}

/// The expected post state of a test. A `null` entry requires the account to not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostAlloc(pub BTreeMap<Address, Option<ExpectedAccount>>);

impl PostAlloc {
    /// Checks the actual post state against the expectation.
    pub fn verify(&self, got: &Alloc) -> Result<(), PostStateMismatch> {
        for (address, expected) in &self.0 {
            let (expected, account) = match (expected, got.get(address)) {
                (None, None) => continue,
                (None, Some(_)) => return Err(PostStateMismatch::UnexpectedAccount(*address)),
                (Some(_), None) => return Err(PostStateMismatch::MissingAccount(*address)),
                (Some(expected), Some(account)) => (expected, account),
            };

            if let Some(want) = expected.nonce.filter(|n| *n != account.nonce) {
                return Err(PostStateMismatch::Nonce {
                    address: *address,
                    want,
                    got: account.nonce,
                });
            }
            if let Some(want) = expected.balance.filter(|b| *b != account.balance) {
                return Err(PostStateMismatch::Balance {
                    address: *address,
                    want,
                    got: account.balance,
                });
            }
            if let Some(want) = expected.code.as_ref().filter(|c| **c != account.code) {
                return Err(PostStateMismatch::Code {
                    address: *address,
                    want: want.clone(),
                    got: account.code.clone(),
                });
            }
            if let Some(storage) = &expected.storage {
                let slots = storage.keys().chain(account.storage.keys());
                for slot in slots {
                    let want = storage.get(slot).copied().unwrap_or_default();
                    let got = account.storage.get(slot).copied().unwrap_or_default();
                    if want != got {
                        return Err(PostStateMismatch::Storage {
                            address: *address,
                            slot: *slot,
                            want,
                            got,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, bytes};
    use eft_mpt::EMPTY_ROOT_HASH;

    fn account(nonce: u64, balance: u64) -> Account {
        Account { nonce, balance: U256::from(balance), ..Default::default() }
    }

    #[test]
    fn test_empty_accounts() {
        let alloc: Alloc = [
            (address!("1000000000000000000000000000000000000001"), account(0, 0)),
            (address!("1000000000000000000000000000000000000002"), account(1, 0)),
            (
                address!("1000000000000000000000000000000000000003"),
                Account { code: bytes!("00"), ..Default::default() },
            ),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            alloc.empty_accounts(),
            vec![address!("1000000000000000000000000000000000000001")]
        );
    }

    #[test]
    fn test_merge_replaces_accounts() {
        let a = address!("1000000000000000000000000000000000000001");
        let base: Alloc = [(a, account(1, 1))].into_iter().collect();
        let overlay: Alloc = [(a, account(2, 0))].into_iter().collect();
        assert_eq!(base.merge(overlay).get(&a), Some(&account(2, 0)));
    }

    #[test]
    fn test_state_root() {
        assert_eq!(Alloc::default().state_root(), EMPTY_ROOT_HASH);
        let alloc: Alloc =
            [(address!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b"), account(0, 1_000_000_000))]
                .into_iter()
                .collect();
        assert_ne!(alloc.state_root(), EMPTY_ROOT_HASH);
        assert_eq!(account(0, 0).trie_account().storage_root, EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_alloc_json() {
        let json = r#"{
            "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b": {
                "nonce": "0x01",
                "balance": "0x0de0b6b3a7640000",
                "code": "0x6001600055",
                "storage": { "0x01": "0x02" }
            }
        }"#;
        let alloc: Alloc = serde_json::from_str(json).unwrap();
        let account = alloc.get(&address!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b")).unwrap();
        assert_eq!(account.nonce, 1);
        assert_eq!(account.storage.get(&U256::from(1)), Some(&U256::from(2)));
    }

    #[test]
    fn test_verify_post() {
        let a = address!("1000000000000000000000000000000000000001");
        let b = address!("1000000000000000000000000000000000000002");
        let mut got = Account::default();
        got.storage.insert(U256::from(1), U256::from(7));
        let alloc: Alloc = [(a, got)].into_iter().collect();

        let post = PostAlloc([(a, Some(ExpectedAccount::default())), (b, None)].into());
        assert_eq!(post.verify(&alloc), Ok(()));

        let mut storage = BTreeMap::new();
        storage.insert(U256::from(1), U256::from(8));
        let post = PostAlloc(
            [(a, Some(ExpectedAccount { storage: Some(storage), ..Default::default() }))].into(),
        );
        assert_eq!(
            post.verify(&alloc),
            Err(PostStateMismatch::Storage {
                address: a,
                slot: U256::from(1),
                want: U256::from(8),
                got: U256::from(7),
            })
        );

        let post = PostAlloc([(a, None)].into());
        assert_eq!(post.verify(&alloc), Err(PostStateMismatch::UnexpectedAccount(a)));

        let post = PostAlloc([(b, Some(ExpectedAccount::default()))].into());
        assert_eq!(post.verify(&alloc), Err(PostStateMismatch::MissingAccount(b)));
    }
}
