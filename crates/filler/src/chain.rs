//! The chain accumulator: drives the transition tool over the blocks of a test.

use crate::{
    aggregate_requests, apply_fork_requirements, apply_implicit_rules, assemble_header,
    block_environment, block_rlp, check_failing_transactions, environment_from_parent,
    finalize_header, verify_result, verify_transactions, verify_witness, AuthoringError, Block,
    BlockchainTest, ConsistencyError, EngineFixture, FillerConfig, FillerResult, Fixture,
    FixtureBlock, FixtureBlockBase, FixtureBlockEntry, FixtureInfo, InvalidFixtureBlock,
    NewPayload, SEAL_ENGINE,
};
use alloy_consensus::{EMPTY_OMMER_ROOT_HASH, EMPTY_ROOT_HASH};
use alloy_primitives::{Bytes, B256, U256};
use eft_forks::ForkSchedule;
use eft_primitives::{
    Account, Alloc, Environment, ExceptionSet, FixtureHeader, Requests, SealedHeader,
    Transaction, VerkleTree, Withdrawal, Witness, DEFAULT_GENESIS_DIFFICULTY,
};
use eft_t8n::{T8nOutput, T8nRequest, TransitionTool, TreeKeyResolver};
use std::{path::PathBuf, sync::Arc};
use tracing::{debug, error, info, warn};

/// The genesis block of a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genesis {
    /// The genesis allocation, including the system contracts of the fork.
    pub alloc: Alloc,
    /// The genesis header.
    pub header: SealedHeader,
    /// The RLP encoding of the genesis block.
    pub rlp: Bytes,
}

/// Everything generated for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockData {
    /// The environment the block was executed in.
    pub env: Environment,
    /// The final header.
    pub header: SealedHeader,
    /// The transactions of the block.
    pub txs: Vec<Transaction>,
    /// The state after the block.
    pub alloc: Alloc,
    /// The requests of the block.
    pub requests: Option<Requests>,
    /// The statelessness tree after the block.
    pub vkt: Option<VerkleTree>,
    /// The statelessness witness of the block.
    pub witness: Option<Witness>,
}

impl BlockData {
    /// Returns the RLP encoding of the block.
    pub fn rlp(&self) -> Bytes {
        block_rlp(&self.header, &self.txs, self.env.withdrawals.as_deref(), self.requests.as_ref())
    }

    /// Returns the decoded form of the block.
    pub fn fixture_block(&self) -> FillerResult<FixtureBlockBase> {
        FixtureBlockBase::new(
            self.header.clone(),
            &self.txs,
            self.env.withdrawals.clone(),
            self.requests.as_ref(),
            self.witness.clone(),
        )
    }

    /// Returns the engine API payload of the block.
    pub fn payload(
        &self,
        schedule: &ForkSchedule,
        block: &Block,
        validation_error: Option<ExceptionSet>,
    ) -> FillerResult<NewPayload> {
        NewPayload::new(
            schedule,
            &self.header,
            &self.txs,
            self.env.withdrawals.as_deref(),
            self.requests.as_ref(),
            validation_error,
            block.engine_api_error_code,
        )
    }
}

/// The outcome of a block of a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The block was accepted and extends the chain.
    Valid(Box<BlockData>),
    /// The block must be rejected by clients. The chain is not extended.
    Rejected {
        /// The generated block, absent for blocks given as raw RLP.
        block: Option<Box<BlockData>>,
        /// The encoding of the block.
        rlp: Bytes,
        /// The exception clients must raise.
        exception: ExceptionSet,
    },
}

/// The state threaded from block to block.
#[derive(Debug, Clone)]
struct ChainState {
    alloc: Alloc,
    env: Environment,
    head: B256,
    last_header: SealedHeader,
    vkt: Option<VerkleTree>,
    statelessness: bool,
    debug_dir: Option<PathBuf>,
    calls: usize,
}

impl ChainState {
    fn new(genesis: &Genesis, vkt: Option<VerkleTree>, debug_dir: Option<PathBuf>) -> Self {
        Self {
            alloc: genesis.alloc.clone(),
            env: environment_from_parent(&Environment::default(), &genesis.header),
            head: genesis.header.hash,
            last_header: genesis.header.clone(),
            statelessness: vkt.is_some(),
            vkt,
            debug_dir,
            calls: 0,
        }
    }

    fn next_debug_dir(&mut self) -> Option<PathBuf> {
        let dir = self.debug_dir.as_ref().map(|dir| dir.join(self.calls.to_string()));
        self.calls += 1;
        dir
    }

    fn advance(&mut self, block: &BlockData) {
        self.alloc = block.alloc.clone();
        self.env = environment_from_parent(&block.env, &block.header);
        self.head = block.header.hash;
        self.vkt = block.vkt.clone();
    }
}

/// Generates the fixtures of blockchain tests for one fork schedule.
#[derive(Debug)]
pub struct BlockchainFiller<T>
where
    T: TransitionTool + TreeKeyResolver,
{
    tool: Arc<T>,
    schedule: ForkSchedule,
    config: FillerConfig,
}

impl<T> BlockchainFiller<T>
where
    T: TransitionTool + TreeKeyResolver,
{
    /// Creates a new [BlockchainFiller].
    pub const fn new(tool: Arc<T>, schedule: ForkSchedule, config: FillerConfig) -> Self {
        Self { tool, schedule, config }
    }

    /// Returns the fork schedule.
    pub const fn schedule(&self) -> &ForkSchedule {
        &self.schedule
    }

    /// Returns the network name written into fixtures.
    pub fn network(&self) -> String {
        self.config.network_name(self.schedule.blockchain_test_network_name())
    }

    /// Builds the genesis block of `test`.
    pub async fn make_genesis(&self, test: &BlockchainTest) -> FillerResult<Genesis> {
        let env = apply_fork_requirements(test.genesis_environment.clone(), &self.schedule);
        if env.withdrawals.as_ref().is_some_and(|w| !w.is_empty()) {
            return Err(AuthoringError::GenesisWithdrawals.into());
        }
        if let Some(root) = env.parent_beacon_block_root.filter(|root| !root.is_zero()) {
            return Err(AuthoringError::GenesisBeaconRoot(root).into());
        }

        let system = self
            .schedule
            .pre_allocation_blockchain()
            .map(|contract| {
                let account = Account {
                    nonce: contract.nonce,
                    code: Bytes::from_static(contract.code),
                    ..Default::default()
                };
                (contract.address, account)
            })
            .collect::<Alloc>();
        let alloc = system.merge(test.pre.clone());
        let empty = alloc.empty_accounts();
        if !empty.is_empty() {
            return Err(AuthoringError::EmptyAccounts(empty).into());
        }

        let state_root = if self.schedule.genesis_fork().statelessness_witness_required() {
            self.tool.state_root(&alloc).await?
        } else {
            alloc.state_root()
        };

        let requests = self.schedule.header_requests_required(0, 0).then(Requests::default);
        let withdrawals = env.withdrawals.as_ref().map(|_| Vec::<Withdrawal>::new());
        let header = FixtureHeader {
            parent_hash: B256::ZERO,
            ommers_hash: EMPTY_OMMER_ROOT_HASH,
            state_root,
            transactions_trie: EMPTY_ROOT_HASH,
            receipts_root: EMPTY_ROOT_HASH,
            difficulty: env.difficulty.unwrap_or(U256::from(DEFAULT_GENESIS_DIFFICULTY)),
            number: 0,
            gas_limit: env.gas_limit,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::from_static(&[0x00]),
            base_fee_per_gas: env.base_fee_per_gas,
            withdrawals_root: withdrawals.as_ref().map(|_| EMPTY_ROOT_HASH),
            blob_gas_used: env.blob_gas_used,
            excess_blob_gas: env.excess_blob_gas,
            parent_beacon_block_root: env.parent_beacon_block_root,
            requests_root: requests.as_ref().map(Requests::trie_root),
            ..Default::default()
        }
        .seal();
        let rlp = block_rlp(&header, &[], withdrawals.as_deref(), requests.as_ref());

        info!(target: "chain", hash = %header.hash, %state_root, "Built genesis block");
        Ok(Genesis { alloc, header, rlp })
    }

    async fn start(&self, name: &str, test: &BlockchainTest) -> FillerResult<(Genesis, ChainState)> {
        let genesis = self.make_genesis(test).await?;
        let vkt = if self.schedule.genesis_fork().statelessness_witness_required() {
            Some(self.tool.mpt_to_vkt(&genesis.alloc).await?)
        } else {
            None
        };
        let debug_dir = self.config.debug_dir.as_ref().map(|dir| dir.join(name));
        let state = ChainState::new(&genesis, vkt, debug_dir);
        Ok((genesis, state))
    }

    /// Executes `block` on top of the chain state and builds its header.
    async fn generate_block_data(
        &self,
        state: &mut ChainState,
        block: &Block,
    ) -> FillerResult<BlockData> {
        check_failing_transactions(&block.txs)?;

        let env = block_environment(&state.env, block, &self.schedule)?;
        let (number, timestamp) = (env.number, env.timestamp);
        let request = T8nRequest {
            alloc: state.alloc.clone(),
            txs: block.txs.clone(),
            env: env.clone(),
            fork: self.config.network_name(self.schedule.transition_tool_name(number, timestamp)),
            chain_id: self.config.chain_id,
            reward: self.schedule.block_reward(number, timestamp),
            vkt: state.vkt.clone(),
            debug_dir: state.next_debug_dir(),
        };

        let output = match self.tool.evaluate(request).await {
            Ok(output) => output,
            Err(e) => {
                error!(target: "chain", number, "Transition tool failed: {e}");
                log_alloc("Pre-state", &state.alloc);
                return Err(e.into());
            }
        };

        if let Err(e) = self.verify_output(block, &env, &output).await {
            error!(target: "chain", number, "Block verification failed: {e}");
            log_diagnostics(&state.alloc, &output);
            return Err(e);
        }

        let mut header =
            assemble_header(&env, &output.result, block, &self.schedule, &block.txs)?;
        let requests =
            aggregate_requests(&self.schedule, &mut header, &output.result, block.requests.as_ref())?;
        let header = finalize_header(header, block)?.seal();

        let T8nOutput { alloc, result, vkt, .. } = output;
        let (alloc, witness) = if self.schedule.statelessness_witness_required(number, timestamp) {
            state.statelessness = true;
            let witness = result
                .state_diff
                .map(|state_diff| Witness { state_diff, verkle_proof: result.verkle_proof });
            (state.alloc.clone(), witness)
        } else {
            (alloc, None)
        };

        debug!(
            target: "chain",
            number,
            hash = %header.hash,
            txs = block.txs.len(),
            gas_used = header.gas_used,
            "Generated block"
        );
        Ok(BlockData { env, header, txs: block.txs.clone(), alloc, requests, vkt, witness })
    }

    async fn verify_output(
        &self,
        block: &Block,
        env: &Environment,
        output: &T8nOutput,
    ) -> FillerResult<()> {
        let exception = block.expected_exception();
        let rejected = verify_transactions(&block.txs, &output.result, exception.as_ref())?;
        if !rejected.is_empty() {
            debug!(target: "chain", ?rejected, "Transactions rejected as expected");
        }
        verify_result(env, &output.result)?;
        if let Some(check) = &block.witness_check {
            let check = apply_implicit_rules(check, &self.config.implicit_slots, env.number);
            verify_witness(self.tool.as_ref(), output.result.state_diff.as_ref(), &check).await?;
        }
        Ok(())
    }

    /// Processes one block of a test, extending the chain if the block is valid.
    async fn process_block(
        &self,
        state: &mut ChainState,
        index: usize,
        block: &Block,
    ) -> FillerResult<BlockOutcome> {
        if let Some(rlp) = &block.rlp {
            let exception =
                block.exception.clone().ok_or(AuthoringError::RawRlpWithoutException(index))?;
            return Ok(BlockOutcome::Rejected { block: None, rlp: rlp.clone(), exception });
        }

        let data = self.generate_block_data(state, block).await?;
        state.last_header = data.header.clone();
        Ok(match block.expected_exception() {
            None => {
                state.advance(&data);
                BlockOutcome::Valid(Box::new(data))
            }
            Some(exception) => {
                info!(target: "chain", index, %exception, "Block is expected to be rejected");
                BlockOutcome::Rejected { rlp: data.rlp(), block: Some(Box::new(data)), exception }
            }
        })
    }

    fn verify_post_state(&self, test: &BlockchainTest, state: &ChainState) -> FillerResult<()> {
        if state.statelessness {
            if state.vkt.is_none() {
                return Err(ConsistencyError::MissingVerkleTree.into());
            }
            warn!(target: "chain", "Skipping post-state verification of a statelessness tree");
            return Ok(());
        }
        if let Err(e) = test.post.verify(&state.alloc) {
            error!(target: "chain", "Post-state verification failed: {e}");
            log_alloc("Post-state", &state.alloc);
            return Err(ConsistencyError::from(e).into());
        }
        Ok(())
    }

    /// Generates the blockchain fixture of `test`.
    pub async fn fill_blockchain(&self, name: &str, test: &BlockchainTest) -> FillerResult<Fixture> {
        info!(target: "chain", name, network = %self.network(), "Filling blockchain test");
        let (genesis, mut state) = self.start(name, test).await?;

        let mut blocks = Vec::with_capacity(test.blocks.len());
        for (index, block) in test.blocks.iter().enumerate() {
            let entry = match self.process_block(&mut state, index, block).await? {
                BlockOutcome::Valid(data) => FixtureBlockEntry::Valid(Box::new(FixtureBlock {
                    block: data.fixture_block()?,
                    rlp: data.rlp(),
                })),
                BlockOutcome::Rejected { block, rlp, exception } => {
                    let rlp_decoded = match block {
                        Some(data) if !exception.is_rlp_structure_error() => {
                            match data.fixture_block() {
                                Ok(decoded) => Some(decoded),
                                Err(err) => {
                                    debug!(
                                        target: "chain",
                                        index,
                                        %err,
                                        "Omitting the decoded form of an undecodable block"
                                    );
                                    None
                                }
                            }
                        }
                        _ => None,
                    };
                    FixtureBlockEntry::Invalid(Box::new(InvalidFixtureBlock {
                        rlp,
                        expect_exception: exception,
                        rlp_decoded,
                    }))
                }
            };
            blocks.push(entry);
        }

        self.verify_post_state(test, &state)?;
        Ok(Fixture {
            info: FixtureInfo::new(test.description.clone()),
            network: self.network(),
            genesis_block_header: genesis.header,
            genesis_rlp: genesis.rlp,
            blocks,
            last_block_hash: state.head,
            pre: genesis.alloc,
            post_state: state.alloc,
            seal_engine: SEAL_ENGINE.to_string(),
        })
    }

    /// Generates the engine fixture of `test`.
    pub async fn fill_engine(&self, name: &str, test: &BlockchainTest) -> FillerResult<EngineFixture> {
        info!(target: "chain", name, network = %self.network(), "Filling engine test");
        let (genesis, mut state) = self.start(name, test).await?;

        let mut payloads = Vec::with_capacity(test.blocks.len());
        for (index, block) in test.blocks.iter().enumerate() {
            if block.rlp.is_some() {
                return Err(AuthoringError::RawRlpInEngineFixture(index).into());
            }
            let payload = match self.process_block(&mut state, index, block).await? {
                BlockOutcome::Valid(data) => data.payload(&self.schedule, block, None)?,
                BlockOutcome::Rejected { block: Some(data), exception, .. } => {
                    data.payload(&self.schedule, block, Some(exception))?
                }
                BlockOutcome::Rejected { block: None, .. } => {
                    return Err(AuthoringError::RawRlpInEngineFixture(index).into());
                }
            };
            payloads.push(payload);
        }

        let last = &state.last_header;
        let fcu_version = self
            .schedule
            .engine_forkchoice_updated_version(last.number, last.timestamp)
            .ok_or_else(|| {
                AuthoringError::EngineUnsupported(self.schedule.fork_at(last.number, last.timestamp))
            })?;

        self.verify_post_state(test, &state)?;

        let sync_payload = if test.verify_sync {
            if state.head == genesis.header.hash {
                return Err(AuthoringError::SyncWithoutBlocks.into());
            }
            let block = Block::default();
            let data = self.generate_block_data(&mut state, &block).await?;
            Some(data.payload(&self.schedule, &block, None)?)
        } else {
            None
        };

        Ok(EngineFixture {
            info: FixtureInfo::new(test.description.clone()),
            network: self.network(),
            genesis_block_header: genesis.header,
            engine_new_payloads: payloads,
            engine_fcu_version: fcu_version,
            sync_payload,
            last_block_hash: state.head,
            pre: genesis.alloc,
            post_state: state.alloc,
            seal_engine: SEAL_ENGINE.to_string(),
        })
    }
}

fn log_alloc(label: &str, alloc: &Alloc) {
    match serde_json::to_string_pretty(alloc) {
        Ok(json) => error!(target: "chain", "{label}:\n{json}"),
        Err(e) => error!(target: "chain", "{label}: unserializable allocation: {e}"),
    }
}

fn log_diagnostics(pre: &Alloc, output: &T8nOutput) {
    for (index, trace) in output.traces.iter().enumerate() {
        error!(target: "chain", "Trace of transaction {index}:\n{trace}");
    }
    match serde_json::to_string_pretty(&output.result) {
        Ok(json) => error!(target: "chain", "Transition tool result:\n{json}"),
        Err(e) => error!(target: "chain", "Transition tool result: {e}"),
    }
    log_alloc("Previous transition tool alloc", pre);
    log_alloc("Transition tool output alloc", &output.alloc);
    if let Some(vkt) = &output.vkt {
        error!(target: "chain", leaves = vkt.len(), "Transition tool output verkle tree: {vkt:?}");
    }
}

