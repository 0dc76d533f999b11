//! Assembly of block headers from the environment and the transition tool result.

use crate::{AuthoringError, Block, ConsistencyError, FillerResult};
use alloy_consensus::EMPTY_OMMER_ROOT_HASH;
use eft_forks::ForkSchedule;
use eft_primitives::{
    transactions_root, withdrawals_root, Environment, ExceptionSet, FixtureHeader, Transaction,
};
use eft_t8n::TransitionResult;
use tracing::{debug, warn};

/// Returns the blob gas used by `txs` under the fork active at `(number, timestamp)`, or
/// `None` if the fork does not charge blob gas.
///
/// Undecodable transactions are an error, unless the block is `expected_invalid`: such blocks
/// may carry malformed transactions on purpose, and those count as carrying no blobs.
pub fn blob_gas_used(
    schedule: &ForkSchedule,
    number: u64,
    timestamp: u64,
    txs: &[Transaction],
    expected_invalid: bool,
) -> FillerResult<Option<u64>> {
    let per_blob = schedule.blob_gas_per_blob(number, timestamp);
    if per_blob == 0 {
        return Ok(None);
    }
    let mut blobs = 0u64;
    for (index, tx) in txs.iter().enumerate() {
        match tx.blob_count() {
            Ok(count) => blobs += count as u64,
            Err(err) if expected_invalid => {
                debug!(target: "header", index, %err, "Undecodable transaction has no blobs");
            }
            Err(source) => return Err(AuthoringError::InvalidTransaction { index, source }.into()),
        }
    }
    Ok(Some(per_blob * blobs))
}

/// Merges the environment and the transition tool result into the header of `block`.
///
/// Environment values take precedence over the result. The transactions root and the blob gas
/// used are computed from `txs`, since the tool only accounts for the transactions it
/// included.
pub fn assemble_header(
    env: &Environment,
    result: &TransitionResult,
    block: &Block,
    schedule: &ForkSchedule,
    txs: &[Transaction],
) -> FillerResult<FixtureHeader> {
    let blob_gas_used = blob_gas_used(
        schedule,
        env.number,
        env.timestamp,
        txs,
        block.expected_exception().is_some(),
    )?;
    if let (Some(local), Some(reported)) = (blob_gas_used, result.blob_gas_used) {
        if local != reported {
            debug!(
                target: "header",
                local,
                reported,
                "Overriding the blob gas used reported by the transition tool"
            );
        }
    }

    let mut header = FixtureHeader {
        parent_hash: env.parent_hash(),
        ommers_hash: EMPTY_OMMER_ROOT_HASH,
        fee_recipient: env.fee_recipient,
        state_root: result.state_root,
        transactions_trie: transactions_root(txs),
        receipts_root: result.receipts_root,
        logs_bloom: result.logs_bloom,
        difficulty: env.difficulty.or(result.difficulty).unwrap_or_default(),
        number: env.number,
        gas_limit: env.gas_limit,
        gas_used: result.gas_used,
        timestamp: env.timestamp,
        extra_data: block.extra_data.clone().unwrap_or_default(),
        prev_randao: env.prev_randao.unwrap_or_default(),
        nonce: Default::default(),
        base_fee_per_gas: env.base_fee_per_gas.or(result.base_fee_per_gas),
        withdrawals_root: env
            .withdrawals
            .as_deref()
            .map(withdrawals_root)
            .or(result.withdrawals_root),
        blob_gas_used,
        excess_blob_gas: env.excess_blob_gas.or(result.excess_blob_gas),
        parent_beacon_block_root: env.parent_beacon_block_root,
        requests_root: result.requests_root,
    };

    // Removed fields stay absent even when the tool reports a value.
    if block.base_fee_per_gas.is_removed() {
        header.base_fee_per_gas = None;
    }
    if block.excess_blob_gas.is_removed() {
        header.excess_blob_gas = None;
    }
    if block.blob_gas_used.is_removed() {
        header.blob_gas_used = None;
    }
    if block.parent_beacon_block_root.is_removed() {
        header.parent_beacon_block_root = None;
    }
    Ok(header)
}

/// Runs the header checks of `block` against the complete header, then applies the modifier
/// of the block.
pub fn finalize_header(header: FixtureHeader, block: &Block) -> FillerResult<FixtureHeader> {
    if let Some(checks) = &block.header_verify {
        checks.verify(&header).map_err(ConsistencyError::from)?;
    }
    Ok(match &block.rlp_modifier {
        Some(modifier) => modifier.apply(&header),
        None => header,
    })
}

/// Checks the transition tool result against the environment it was given.
pub fn verify_result(env: &Environment, result: &TransitionResult) -> FillerResult<()> {
    if let Some(withdrawals) = env.withdrawals.as_deref() {
        let computed = withdrawals_root(withdrawals);
        if result.withdrawals_root != Some(computed) {
            return Err(ConsistencyError::WithdrawalsRoot {
                computed,
                reported: result.withdrawals_root,
            }
            .into());
        }
    }
    Ok(())
}

/// Checks the transactions of a block before execution: at most one transaction may be
/// expected to fail, and it must be the last one.
pub fn check_failing_transactions(txs: &[Transaction]) -> FillerResult<()> {
    let failing = txs.iter().filter(|tx| tx.error.is_some()).count();
    if failing > 1 {
        return Err(AuthoringError::MultipleFailingTransactions(failing).into());
    }
    if failing == 1 {
        if let Some(index) = txs.iter().position(|tx| tx.error.is_some()) {
            if index + 1 != txs.len() {
                return Err(AuthoringError::FailingTransactionNotLast { index, len: txs.len() }
                    .into());
            }
        }
    }
    Ok(())
}

/// Checks the rejections reported by the transition tool against the expected failures.
///
/// Returns the rejected transactions. A rejection of a transaction not expected to fail is
/// only an error if the block itself is not expected to fail.
pub fn verify_transactions(
    txs: &[Transaction],
    result: &TransitionResult,
    block_exception: Option<&ExceptionSet>,
) -> FillerResult<Vec<usize>> {
    let mut rejected = Vec::new();
    for (index, tx) in txs.iter().enumerate() {
        let rejection = result.rejected.iter().find(|r| r.index == index);
        match (rejection, &tx.error) {
            (Some(_), Some(_)) => rejected.push(index),
            (None, Some(expected)) => {
                return Err(
                    AuthoringError::UnexpectedSuccess { index, expected: expected.clone() }.into()
                );
            }
            (Some(rejection), None) => {
                if block_exception.is_none() {
                    return Err(AuthoringError::UnexpectedFailure {
                        index,
                        error: rejection.error.clone(),
                    }
                    .into());
                }
                warn!(target: "header", index, error = %rejection.error, "Transaction rejected");
                rejected.push(index);
            }
            (None, None) => {}
        }
    }
    Ok(rejected)
}
