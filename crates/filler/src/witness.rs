//! Verification of block witnesses against declared witness checks.

use crate::{ConsistencyError, FillerResult, ImplicitSlotRule, WitnessMismatch};
use alloy_primitives::{Address, B256};
use eft_primitives::{split_tree_key, StateDiff, Stem, WitnessCheck};
use eft_t8n::{T8nResult, TreeKeyResolver};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Leaf values keyed by stem, then suffix.
pub type StemValues = BTreeMap<Stem, BTreeMap<u8, Option<B256>>>;

/// A [WitnessCheck] resolved into tree keys, with the account owning every stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessMapping {
    /// The expected leaf values.
    pub expected: StemValues,
    /// The account owning each expected stem.
    pub addresses: BTreeMap<Stem, Address>,
}

impl WitnessMapping {
    /// Resolves the tree keys of every entry of `check`.
    pub async fn resolve<R>(resolver: &R, check: &WitnessCheck) -> T8nResult<Self>
    where
        R: TreeKeyResolver + ?Sized,
    {
        let mut mapping = Self::default();
        for entry in &check.account_entries {
            let (stem, _) = split_tree_key(&resolver.single_key(entry.address, None).await?);
            mapping.insert(entry.address, stem, entry.entry.suffix(), entry.value);
        }
        for slot in &check.storage_slots {
            let key = resolver.single_key(slot.address, Some(slot.slot)).await?;
            let (stem, suffix) = split_tree_key(&key);
            mapping.insert(slot.address, stem, suffix, slot.value);
        }
        for chunk in &check.code_chunks {
            let key = resolver.code_chunk_key(chunk.address, chunk.chunk).await?;
            let (stem, suffix) = split_tree_key(&key);
            mapping.insert(chunk.address, stem, suffix, chunk.value);
        }
        Ok(mapping)
    }

    fn insert(&mut self, address: Address, stem: Stem, suffix: u8, value: Option<B256>) {
        self.addresses.insert(stem, address);
        self.expected.entry(stem).or_default().insert(suffix, value);
    }

    /// Returns the account owning `stem`, if the stem is expected.
    pub fn address(&self, stem: &Stem) -> Option<Address> {
        self.addresses.get(stem).copied()
    }

    /// Checks that `actual` touches exactly the expected leaves, with the expected current
    /// values.
    pub fn verify(&self, actual: &StateDiff) -> Result<(), WitnessMismatch> {
        let actual = actual.current_values();

        for (stem, suffixes) in &actual {
            let address = self.address(stem);
            trace!(target: "witness", %stem, ?address, "Checking actual stem");
            let expected = self
                .expected
                .get(stem)
                .ok_or(WitnessMismatch::UnexpectedStem { stem: *stem, address })?;
            for (suffix, value) in suffixes {
                let want = expected.get(suffix).ok_or(WitnessMismatch::UnexpectedSuffix {
                    stem: *stem,
                    suffix: *suffix,
                    address,
                })?;
                if want != value {
                    return Err(WitnessMismatch::Value {
                        stem: *stem,
                        suffix: *suffix,
                        address,
                        expected: *want,
                        actual: *value,
                    });
                }
            }
        }

        for (stem, suffixes) in &self.expected {
            let address = self.address(stem);
            trace!(target: "witness", %stem, ?address, "Checking expected stem");
            let got = actual
                .get(stem)
                .ok_or(WitnessMismatch::MissingStem { stem: *stem, address })?;
            for (suffix, value) in suffixes {
                let got = got.get(suffix).ok_or(WitnessMismatch::MissingSuffix {
                    stem: *stem,
                    suffix: *suffix,
                    address,
                })?;
                if got != value {
                    return Err(WitnessMismatch::Value {
                        stem: *stem,
                        suffix: *suffix,
                        address,
                        expected: *value,
                        actual: *got,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Returns `check` extended with the implicit slots of the block with the given number.
pub fn apply_implicit_rules(
    check: &WitnessCheck,
    rules: &[ImplicitSlotRule],
    number: u64,
) -> WitnessCheck {
    let mut check = check.clone();
    for rule in rules {
        check.add_storage_slot(rule.address, rule.slot.resolve(number), None);
    }
    check
}

/// Checks the state diff of a block against its witness check.
pub async fn verify_witness<R>(
    resolver: &R,
    state_diff: Option<&StateDiff>,
    check: &WitnessCheck,
) -> FillerResult<()>
where
    R: TreeKeyResolver + ?Sized,
{
    let state_diff = state_diff.ok_or(ConsistencyError::MissingStateDiff)?;
    let mapping = WitnessMapping::resolve(resolver, check).await?;
    debug!(
        target: "witness",
        expected = mapping.expected.len(),
        actual = state_diff.0.len(),
        "Verifying witness"
    );
    mapping.verify(state_diff).map_err(ConsistencyError::from)?;
    Ok(())
}
