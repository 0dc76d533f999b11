//! Aggregation of execution layer requests.

use crate::{ConsistencyError, FillerResult};
use eft_forks::ForkSchedule;
use eft_primitives::{FixtureHeader, Requests};
use eft_t8n::TransitionResult;
use tracing::debug;

/// Collects the requests of a block and commits to them in `header`.
///
/// When the fork processes requests, the reported requests are concatenated in type order
/// and their root must match the root reported by the tool. Requests declared by the block
/// replace the reported ones, and the header root is rewritten to match them.
///
/// Returns `None` if the block carries no requests.
pub fn aggregate_requests(
    schedule: &ForkSchedule,
    header: &mut FixtureHeader,
    result: &TransitionResult,
    overrides: Option<&Requests>,
) -> FillerResult<Option<Requests>> {
    if let Some(requests) = overrides {
        let root = requests.trie_root();
        debug!(target: "requests", count = requests.len(), %root, "Using declared requests");
        header.requests_root = Some(root);
        return Ok(Some(requests.clone()));
    }

    if !schedule.header_requests_required(header.number, header.timestamp) {
        header.requests_root = None;
        return Ok(None);
    }

    let requests = result.requests();
    let computed = requests.trie_root();
    if result.requests_root != Some(computed) {
        return Err(
            ConsistencyError::RequestsRoot { computed, reported: result.requests_root }.into()
        );
    }
    header.requests_root = Some(computed);
    Ok(Some(requests))
}
