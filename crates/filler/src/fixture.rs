//! Fixture formats: RLP encoded blocks for offline replay, and engine API payloads.

use crate::{AuthoringError, FillerResult};
use alloy_consensus::TxEnvelope;
use alloy_primitives::{Address, Bloom, Bytes, B256};
use alloy_rlp::{Encodable, Header, EMPTY_LIST_CODE};
use eft_forks::ForkSchedule;
use eft_primitives::{
    Alloc, ConsolidationRequest, DepositRequest, EngineApiError, ExceptionSet, FixtureHeader,
    Requests, SealedHeader, Transaction, Withdrawal, WithdrawalRequest, Witness,
};
use serde::{Deserialize, Serialize};

/// The seal engine of every generated fixture.
pub const SEAL_ENGINE: &str = "NoProof";

/// Fixture metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureInfo {
    /// The tool that generated the fixture.
    #[serde(rename = "filling-tool")]
    pub filling_tool: String,
    /// The description of the test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FixtureInfo {
    /// Creates the metadata of a fixture generated by this crate.
    pub fn new(description: Option<String>) -> Self {
        Self { filling_tool: format!("eft {}", env!("CARGO_PKG_VERSION")), description }
    }
}

/// Returns the RLP encoding of a block.
///
/// The withdrawals and requests lists are only present when given, which lets the encoding
/// follow the header of the fork.
pub fn block_rlp(
    header: &FixtureHeader,
    txs: &[Transaction],
    withdrawals: Option<&[Withdrawal]>,
    requests: Option<&Requests>,
) -> Bytes {
    let header = header.to_consensus();
    let payload_length = header.length()
        + alloy_rlp::list_length(txs)
        + 1
        + withdrawals.map_or(0, |w| alloy_rlp::list_length(w))
        + requests.map_or(0, Encodable::length);

    let mut out = Vec::with_capacity(payload_length + alloy_rlp::length_of_length(payload_length));
    Header { list: true, payload_length }.encode(&mut out);
    header.encode(&mut out);
    alloy_rlp::encode_list(txs, &mut out);
    out.push(EMPTY_LIST_CODE);
    if let Some(withdrawals) = withdrawals {
        alloy_rlp::encode_list(withdrawals, &mut out);
    }
    if let Some(requests) = requests {
        requests.encode(&mut out);
    }
    out.into()
}

/// The decoded content of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureBlockBase {
    /// The block header, with its hash.
    pub block_header: SealedHeader,
    /// The transactions.
    pub transactions: Vec<TxEnvelope>,
    /// The ommer headers, always empty.
    pub uncle_headers: Vec<FixtureHeader>,
    /// The withdrawals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// The deposit requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_requests: Option<Vec<DepositRequest>>,
    /// The withdrawal requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_requests: Option<Vec<WithdrawalRequest>>,
    /// The consolidation requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation_requests: Option<Vec<ConsolidationRequest>>,
    /// The statelessness witness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,
    /// The block number.
    #[serde(rename = "blocknumber", with = "alloy_serde::quantity")]
    pub block_number: u64,
}

impl FixtureBlockBase {
    /// Decodes the transactions of a block into its fixture representation.
    pub fn new(
        header: SealedHeader,
        txs: &[Transaction],
        withdrawals: Option<Vec<Withdrawal>>,
        requests: Option<&Requests>,
        witness: Option<Witness>,
    ) -> FillerResult<Self> {
        let transactions = txs
            .iter()
            .enumerate()
            .map(|(index, tx)| {
                tx.envelope().map_err(|source| AuthoringError::InvalidTransaction { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            block_number: header.number,
            block_header: header,
            transactions,
            uncle_headers: Vec::new(),
            withdrawals,
            deposit_requests: requests.map(Requests::deposits),
            withdrawal_requests: requests.map(Requests::withdrawals),
            consolidation_requests: requests.map(Requests::consolidations),
            witness,
        })
    }
}

/// A valid block of a [Fixture].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureBlock {
    /// The decoded block.
    #[serde(flatten)]
    pub block: FixtureBlockBase,
    /// The RLP encoding of the block.
    pub rlp: Bytes,
}

/// A block of a [Fixture] that clients must reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidFixtureBlock {
    /// The RLP encoding of the block.
    pub rlp: Bytes,
    /// The exception clients must raise.
    #[serde(rename = "expectException")]
    pub expect_exception: ExceptionSet,
    /// The decoded block, absent when the encoding itself is malformed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rlp_decoded: Option<FixtureBlockBase>,
}

/// A block of a [Fixture].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureBlockEntry {
    /// A valid block.
    Valid(Box<FixtureBlock>),
    /// An invalid block.
    Invalid(Box<InvalidFixtureBlock>),
}

/// A blockchain fixture: a genesis and a list of RLP encoded blocks, replayed by clients at
/// startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    /// Fixture metadata.
    #[serde(rename = "_info")]
    pub info: FixtureInfo,
    /// The network name.
    pub network: String,
    /// The genesis header.
    pub genesis_block_header: SealedHeader,
    /// The RLP encoding of the genesis block.
    #[serde(rename = "genesisRLP")]
    pub genesis_rlp: Bytes,
    /// The blocks, in order.
    pub blocks: Vec<FixtureBlockEntry>,
    /// The hash of the last valid block.
    #[serde(rename = "lastblockhash")]
    pub last_block_hash: B256,
    /// The genesis allocation.
    pub pre: Alloc,
    /// The state after the last valid block.
    pub post_state: Alloc,
    /// The seal engine.
    pub seal_engine: String,
}

/// The execution payload of an `engine_newPayload` call. Fields introduced by later payload
/// versions are absent for earlier versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayload {
    /// The parent block hash.
    pub parent_hash: B256,
    /// The fee recipient.
    pub fee_recipient: Address,
    /// The state root.
    pub state_root: B256,
    /// The receipts root.
    pub receipts_root: B256,
    /// The logs bloom.
    pub logs_bloom: Bloom,
    /// The previous randao value.
    pub prev_randao: B256,
    /// The block number.
    #[serde(with = "alloy_serde::quantity")]
    pub block_number: u64,
    /// The gas limit.
    #[serde(with = "alloy_serde::quantity")]
    pub gas_limit: u64,
    /// The gas used.
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// The timestamp.
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// The extra data.
    pub extra_data: Bytes,
    /// The base fee.
    #[serde(with = "alloy_serde::quantity")]
    pub base_fee_per_gas: u64,
    /// The block hash.
    pub block_hash: B256,
    /// The EIP-2718 encoded transactions.
    pub transactions: Vec<Bytes>,
    /// The withdrawals, from version 2.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// The blob gas used, from version 3.
    #[serde(default, with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub blob_gas_used: Option<u64>,
    /// The excess blob gas, from version 3.
    #[serde(default, with = "alloy_serde::quantity::opt", skip_serializing_if = "Option::is_none")]
    pub excess_blob_gas: Option<u64>,
    /// The deposit requests, from version 4.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_requests: Option<Vec<DepositRequest>>,
    /// The withdrawal requests, from version 4.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_requests: Option<Vec<WithdrawalRequest>>,
    /// The consolidation requests, from version 4.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidation_requests: Option<Vec<ConsolidationRequest>>,
}

/// The parameters of an `engine_newPayload` call and its expected outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPayload {
    /// The execution payload.
    pub execution_payload: ExecutionPayload,
    /// The blob versioned hashes of the transactions, from version 3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_versioned_hashes: Option<Vec<B256>>,
    /// The parent beacon block root, from version 3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
    /// The `engine_newPayload` version.
    pub version: u8,
    /// The exception the client must report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<ExceptionSet>,
    /// The error the client must answer with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<EngineApiError>,
}

impl NewPayload {
    /// Builds the payload of a block, shaped after the payload version of its fork.
    pub fn new(
        schedule: &ForkSchedule,
        header: &SealedHeader,
        txs: &[Transaction],
        withdrawals: Option<&[Withdrawal]>,
        requests: Option<&Requests>,
        validation_error: Option<ExceptionSet>,
        error_code: Option<EngineApiError>,
    ) -> FillerResult<Self> {
        let (number, timestamp) = (header.number, header.timestamp);
        let version = schedule
            .engine_new_payload_version(number, timestamp)
            .ok_or_else(|| AuthoringError::EngineUnsupported(schedule.fork_at(number, timestamp)))?;

        let blob_versioned_hashes = if schedule.engine_new_payload_blob_hashes(number, timestamp) {
            let mut hashes = Vec::new();
            for (index, tx) in txs.iter().enumerate() {
                match tx.blob_versioned_hashes() {
                    Ok(tx_hashes) => hashes.extend(tx_hashes),
                    // Invalid payloads may carry malformed transactions.
                    Err(_) if validation_error.is_some() => {}
                    Err(source) => {
                        return Err(AuthoringError::InvalidTransaction { index, source }.into())
                    }
                }
            }
            Some(hashes)
        } else {
            None
        };
        let parent_beacon_block_root = schedule
            .engine_new_payload_beacon_root(number, timestamp)
            .then(|| header.parent_beacon_block_root.unwrap_or_default());

        let execution_payload = ExecutionPayload {
            parent_hash: header.parent_hash,
            fee_recipient: header.fee_recipient,
            state_root: header.state_root,
            receipts_root: header.receipts_root,
            logs_bloom: header.logs_bloom,
            prev_randao: header.prev_randao,
            block_number: number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            timestamp,
            extra_data: header.extra_data.clone(),
            base_fee_per_gas: header.base_fee_per_gas.unwrap_or_default(),
            block_hash: header.hash,
            transactions: txs.iter().map(|tx| tx.rlp.clone()).collect(),
            withdrawals: (version >= 2).then(|| withdrawals.unwrap_or_default().to_vec()),
            blob_gas_used: (version >= 3).then(|| header.blob_gas_used.unwrap_or_default()),
            excess_blob_gas: (version >= 3).then(|| header.excess_blob_gas.unwrap_or_default()),
            deposit_requests: (version >= 4)
                .then(|| requests.map(Requests::deposits).unwrap_or_default()),
            withdrawal_requests: (version >= 4)
                .then(|| requests.map(Requests::withdrawals).unwrap_or_default()),
            consolidation_requests: (version >= 4)
                .then(|| requests.map(Requests::consolidations).unwrap_or_default()),
        };

        Ok(Self {
            execution_payload,
            blob_versioned_hashes,
            parent_beacon_block_root,
            version,
            validation_error,
            error_code,
        })
    }
}

/// An engine fixture: a genesis and a list of `engine_newPayload` calls, sent to a running
/// client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineFixture {
    /// Fixture metadata.
    #[serde(rename = "_info")]
    pub info: FixtureInfo,
    /// The network name.
    pub network: String,
    /// The genesis header.
    pub genesis_block_header: SealedHeader,
    /// The payloads, in order.
    pub engine_new_payloads: Vec<NewPayload>,
    /// The `engine_forkchoiceUpdated` version to use after the last payload.
    pub engine_fcu_version: u8,
    /// An empty payload on top of the chain, sent to make the client sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_payload: Option<NewPayload>,
    /// The hash of the last valid block.
    #[serde(rename = "lastblockhash")]
    pub last_block_hash: B256,
    /// The genesis allocation.
    pub pre: Alloc,
    /// The state after the last valid block.
    pub post_state: Alloc,
    /// The seal engine.
    pub seal_engine: String,
}
