//! Ordered-list trie utilities.

use alloc::vec::Vec;
use alloy_primitives::B256;
use alloy_rlp::{BufMut, Encodable};
use alloy_trie::{HashBuilder, Nibbles};

/// Compute a trie root of the collection of items with a custom encoder.
///
/// Items are keyed by their RLP encoded index, as in the transactions, receipts, withdrawals
/// and requests tries of a block header.
pub fn ordered_trie_with_encoder<T, F>(items: &[T], mut encode: F) -> HashBuilder
where
    F: FnMut(&T, &mut dyn BufMut),
{
    let mut index_buffer = Vec::new();
    let mut value_buffer = Vec::new();
    let items_len = items.len();

    let mut hb = HashBuilder::default();
    for i in 0..items_len {
        let index = adjust_index_for_rlp(i, items_len);

        index_buffer.clear();
        index.encode(&mut index_buffer);

        value_buffer.clear();
        encode(&items[index], &mut value_buffer);

        hb.add_leaf(Nibbles::unpack(&index_buffer), &value_buffer);
    }

    hb
}

/// Compute the root hash of an ordered list of RLP encodable items.
pub fn ordered_trie_root<T: Encodable>(items: &[T]) -> B256 {
    ordered_trie_with_encoder(items, |item, buf| item.encode(buf)).root()
}

/// Adjust the index of an item for rlp encoding.
///
/// Leaves must be inserted in nibble order, and the RLP encoding of `0` (`0x80`) sorts after
/// the encodings of `1..=0x7f`.
pub(crate) const fn adjust_index_for_rlp(i: usize, len: usize) -> usize {
    if i > 0x7f {
        i
    } else if i == 0x7f || i + 1 == len {
        0
    } else {
        i + 1
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::{Bytes, U256};
    use alloy_trie::EMPTY_ROOT_HASH;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_empty_list_root() {
        let items: Vec<Bytes> = Vec::new();
        assert_eq!(ordered_trie_root(&items), EMPTY_ROOT_HASH);
    }

    #[rstest]
    #[case::single(1, 0)]
    #[case::first_of_two(2, 0)]
    #[case::last_of_many(5, 4)]
    #[case::at_boundary(200, 0x7f)]
    #[case::past_boundary(200, 0x80)]
    fn test_adjust_index_is_a_permutation(#[case] len: usize, #[case] i: usize) {
        let adjusted = (0..len).map(|i| adjust_index_for_rlp(i, len)).collect::<Vec<_>>();
        assert!(adjusted.contains(&i));
        let mut sorted = adjusted;
        sorted.sort_unstable();
        assert_eq!(sorted, (0..len).collect::<Vec<_>>());
    }

    #[test]
    fn test_order_sensitive() {
        let a = [Bytes::from_static(&[0x01]), Bytes::from_static(&[0x02])];
        let b = [Bytes::from_static(&[0x02]), Bytes::from_static(&[0x01])];
        assert_ne!(ordered_trie_root(&a), ordered_trie_root(&b));
    }

    proptest! {
        #[test]
        fn test_matches_alloy_trie(values in proptest::collection::vec(any::<u64>(), 0..300)) {
            let items = values.into_iter().map(U256::from).collect::<Vec<_>>();
            let ours = ordered_trie_root(&items);
            let theirs = alloy_trie::root::ordered_trie_root(&items);
            prop_assert_eq!(ours, theirs);
        }
    }
}
