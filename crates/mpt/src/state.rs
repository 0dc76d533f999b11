//! Secure state and storage trie roots.

use alloc::vec::Vec;
use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rlp::Encodable;
use alloy_trie::{HashBuilder, Nibbles, TrieAccount};
use itertools::Itertools;

/// Computes the root of an account storage trie.
///
/// Slots are keyed by the keccak hash of their 32 byte big-endian key. Zero valued slots are
/// not part of the trie.
pub fn storage_root(storage: impl IntoIterator<Item = (U256, U256)>) -> B256 {
    let mut hb = HashBuilder::default();
    let mut value_buf = Vec::new();

    let sorted_storage = storage
        .into_iter()
        .filter(|(_, v)| !v.is_zero())
        .map(|(k, v)| (keccak256(B256::from(k)), v))
        .sorted_by_key(|(k, _)| *k);
    for (hashed_slot, value) in sorted_storage {
        value_buf.clear();
        value.encode(&mut value_buf);
        hb.add_leaf(Nibbles::unpack(hashed_slot), &value_buf);
    }

    hb.root()
}

/// Computes the root of the state trie over the given accounts.
pub fn state_root(accounts: impl IntoIterator<Item = (Address, TrieAccount)>) -> B256 {
    let mut hb = HashBuilder::default();
    let mut account_buffer = Vec::new();

    let sorted_accounts =
        accounts.into_iter().map(|(a, acc)| (keccak256(a), acc)).sorted_by_key(|(k, _)| *k);
    for (hashed_address, trie_account) in sorted_accounts {
        account_buffer.clear();
        trie_account.encode(&mut account_buffer);
        hb.add_leaf(Nibbles::unpack(hashed_address), &account_buffer);
    }

    hb.root()
}

#[cfg(test)]
mod test {
    use super::*;
    use alloc::vec;
    use alloy_primitives::{address, b256};
    use alloy_trie::{EMPTY_ROOT_HASH, KECCAK_EMPTY};
    use proptest::prelude::*;

    #[test]
    fn test_empty_roots() {
        assert_eq!(storage_root(vec![]), EMPTY_ROOT_HASH);
        assert_eq!(state_root(vec![]), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_zero_slots_are_skipped() {
        let with_zero = vec![(U256::from(1), U256::from(2)), (U256::from(3), U256::ZERO)];
        let without_zero = vec![(U256::from(1), U256::from(2))];
        assert_eq!(storage_root(with_zero), storage_root(without_zero));
        assert_eq!(storage_root(vec![(U256::from(7), U256::ZERO)]), EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_single_empty_account() {
        let account = TrieAccount::default();
        let root = state_root(vec![(address!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b"), account)]);
        let expected = alloy_trie::root::state_root_unhashed(vec![(
            address!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b"),
            account,
        )]);
        assert_eq!(root, expected);
        assert_ne!(root, EMPTY_ROOT_HASH);
    }

    #[test]
    fn test_insertion_order_independent() {
        let a = (
            address!("1000000000000000000000000000000000000000"),
            TrieAccount { nonce: 1, ..Default::default() },
        );
        let b = (
            address!("2000000000000000000000000000000000000000"),
            TrieAccount {
                balance: U256::from(10),
                code_hash: KECCAK_EMPTY,
                storage_root: b256!(
                    "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421"
                ),
                nonce: 0,
            },
        );
        assert_eq!(state_root(vec![a, b]), state_root(vec![b, a]));
    }

    proptest! {
        #[test]
        fn test_storage_root_matches_alloy_trie(
            slots in proptest::collection::btree_map(any::<u64>(), 1..u64::MAX, 0..64)
        ) {
            let ours = storage_root(slots.iter().map(|(k, v)| (U256::from(*k), U256::from(*v))));
            let theirs = alloy_trie::root::storage_root_unhashed(
                slots.iter().map(|(k, v)| (B256::from(U256::from(*k)), U256::from(*v))),
            );
            prop_assert_eq!(ours, theirs);
        }

        #[test]
        fn test_state_root_matches_alloy_trie(
            accounts in proptest::collection::btree_map(any::<[u8; 20]>(), any::<(u64, u64)>(), 0..32)
        ) {
            let accounts = accounts
                .into_iter()
                .map(|(a, (nonce, balance))| {
                    let account = TrieAccount { nonce, balance: U256::from(balance), ..Default::default() };
                    (Address::from(a), account)
                })
                .collect::<Vec<_>>();
            prop_assert_eq!(
                state_root(accounts.clone()),
                alloy_trie::root::state_root_unhashed(accounts)
            );
        }
    }
}
