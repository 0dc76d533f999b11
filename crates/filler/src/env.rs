//! Derivation of block environments.

use crate::{AuthoringError, Block, FillerResult};
use alloy_primitives::{B256, U256};
use eft_forks::ForkSchedule;
use eft_primitives::{Environment, SealedHeader, DEFAULT_BASE_FEE, DEFAULT_GENESIS_DIFFICULTY};
use tracing::trace;

/// The timestamp increment of blocks without an explicit timestamp.
pub const BLOCK_TIME: u64 = 12;

/// Fills the fields the fork active at the environment's block requires but that are unset.
pub fn apply_fork_requirements(mut env: Environment, schedule: &ForkSchedule) -> Environment {
    let (number, timestamp) = (env.number, env.timestamp);

    if schedule.header_prev_randao_required(number, timestamp) && env.prev_randao.is_none() {
        env.prev_randao = Some(B256::ZERO);
    }
    if schedule.header_withdrawals_required(number, timestamp) && env.withdrawals.is_none() {
        env.withdrawals = Some(Vec::new());
    }
    if schedule.header_base_fee_required(number, timestamp)
        && env.base_fee_per_gas.is_none()
        && env.parent_base_fee_per_gas.is_none()
    {
        env.base_fee_per_gas = Some(DEFAULT_BASE_FEE);
    }
    if schedule.header_zero_difficulty_required(number, timestamp) {
        if env.difficulty.is_none() {
            env.difficulty = Some(U256::ZERO);
        }
    } else if env.difficulty.is_none() && env.parent_difficulty.is_none() {
        env.difficulty = Some(U256::from(DEFAULT_GENESIS_DIFFICULTY));
    }
    if schedule.header_blob_gas_required(number, timestamp) {
        if env.excess_blob_gas.is_none() && env.parent_excess_blob_gas.is_none() {
            env.excess_blob_gas = Some(0);
        }
        if env.blob_gas_used.is_none() && env.parent_blob_gas_used.is_none() {
            env.blob_gas_used = Some(0);
        }
    }
    if schedule.header_beacon_root_required(number, timestamp)
        && env.parent_beacon_block_root.is_none()
    {
        env.parent_beacon_block_root = Some(B256::ZERO);
    }
    env
}

/// Returns a copy of `env` with `parent` as the parent block.
///
/// Every field describing the current block is reset, so that the next block starts from the
/// parent values only.
pub fn environment_from_parent(env: &Environment, parent: &SealedHeader) -> Environment {
    let mut next = Environment {
        block_hashes: env.block_hashes.clone(),
        parent_difficulty: Some(parent.difficulty),
        parent_timestamp: Some(parent.timestamp),
        parent_base_fee_per_gas: parent.base_fee_per_gas,
        parent_gas_used: Some(parent.gas_used),
        parent_gas_limit: Some(parent.gas_limit),
        parent_ommers_hash: Some(parent.ommers_hash),
        parent_blob_gas_used: parent.blob_gas_used,
        parent_excess_blob_gas: parent.excess_blob_gas,
        ..Default::default()
    };
    next.push_block_hash(parent.number, parent.hash);
    next
}

/// Derives the environment of `block` on top of `parent`, the environment returned by
/// [environment_from_parent].
///
/// Fields removed by the block are cleared after the fork requirements are applied, so the
/// assembled header lacks them.
pub fn block_environment(
    parent: &Environment,
    block: &Block,
    schedule: &ForkSchedule,
) -> FillerResult<Environment> {
    let mut env = parent.clone();

    env.number = block.number.unwrap_or_else(|| parent.next_number());
    env.timestamp = match (block.timestamp, parent.parent_timestamp) {
        (Some(timestamp), _) => timestamp,
        (None, Some(parent_timestamp)) => parent_timestamp + BLOCK_TIME,
        (None, None) => return Err(AuthoringError::MissingTimestamp.into()),
    };

    env.fee_recipient = block.fee_recipient.unwrap_or_else(|| Environment::default().fee_recipient);
    env.gas_limit = block
        .gas_limit
        .or(parent.parent_gas_limit)
        .unwrap_or_else(|| Environment::default().gas_limit);
    env.difficulty = block.difficulty;
    env.prev_randao = block.prev_randao;
    env.withdrawals = block.withdrawals.clone();
    env.base_fee_per_gas = block.base_fee_per_gas.value().copied();
    env.excess_blob_gas = block.excess_blob_gas.value().copied();
    env.blob_gas_used = block.blob_gas_used.value().copied();
    env.parent_beacon_block_root = block.parent_beacon_block_root.value().copied();

    let mut env = apply_fork_requirements(env, schedule);

    env.base_fee_per_gas = block.base_fee_per_gas.apply(env.base_fee_per_gas);
    env.excess_blob_gas = block.excess_blob_gas.apply(env.excess_blob_gas);
    env.blob_gas_used = block.blob_gas_used.apply(env.blob_gas_used);
    env.parent_beacon_block_root =
        block.parent_beacon_block_root.apply(env.parent_beacon_block_root);

    trace!(
        target: "env",
        number = env.number,
        timestamp = env.timestamp,
        fork = %schedule.fork_at(env.number, env.timestamp),
        "Derived block environment"
    );
    Ok(env)
}
