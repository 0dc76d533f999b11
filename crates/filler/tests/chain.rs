//! End-to-end chains driven through the scripted transition tool.

use alloy_consensus::{
    SignableTransaction, TxEip4844, TxEnvelope, TxLegacy, EMPTY_OMMER_ROOT_HASH,
};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{
    address, Address, Bytes, PrimitiveSignature as Signature, TxKind, B256, U256,
};
use eft_filler::{
    AuthoringError, Block, BlockchainFiller, BlockchainTest, ConsistencyError, FillerConfig,
    FillerError, FixtureBlockEntry, HISTORY_STORAGE_ADDRESS,
};
use eft_forks::{Fork, ForkSchedule};
use eft_primitives::{
    split_tree_key, Account, AccountHeaderEntry, Alloc, BlockException, DepositRequest,
    ExceptionSet, ExpectedAccount, HeaderField, HeaderOverrides, PostAlloc, Request, Requests,
    StateDiff, StemStateDiff, SuffixStateDiff, Transaction, TransactionException, WitnessCheck,
};
use eft_t8n::{
    test_utils::{MockBlock, MockTransitionTool},
    TreeKeyResolver,
};
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

const SENDER: Address = address!("a94f5374fce5edbc8e2a8697c15331677e6ebf0b");
const CONTRACT: Address = address!("1000000000000000000000000000000000000001");

fn tx(nonce: u64) -> Transaction {
    let tx = TxLegacy {
        chain_id: Some(1),
        nonce,
        gas_price: 10,
        gas_limit: 100_000,
        to: TxKind::Call(CONTRACT),
        value: U256::ZERO,
        input: Bytes::new(),
    };
    let signed = tx.into_signed(Signature::new(U256::from(1), U256::from(2), false));
    Transaction::new(TxEnvelope::from(signed).encoded_2718().into())
}

fn blob_tx(nonce: u64, blobs: u8) -> Transaction {
    let tx = TxEip4844 {
        chain_id: 1,
        nonce,
        gas_limit: 21_000,
        max_fee_per_gas: 10,
        max_fee_per_blob_gas: 1,
        to: CONTRACT,
        blob_versioned_hashes: (1..=blobs).map(B256::with_last_byte).collect(),
        ..Default::default()
    };
    let signed = tx.into_signed(Signature::new(U256::from(1), U256::from(2), false));
    Transaction::new(TxEnvelope::from(signed).encoded_2718().into())
}

fn pre() -> Alloc {
    [(SENDER, Account { balance: U256::from(1_000_000_000u64), ..Default::default() })]
        .into_iter()
        .collect()
}

fn with_contract(alloc: &Alloc, value: u64) -> Alloc {
    let mut alloc = alloc.clone();
    let contract = Account {
        nonce: 1,
        code: Bytes::from_static(&[0x60, 0x01, 0x60, 0x00, 0x55]),
        storage: BTreeMap::from([(U256::ZERO, U256::from(value))]),
        ..Default::default()
    };
    alloc.insert(CONTRACT, contract);
    alloc
}

fn setup(
    tool: MockTransitionTool,
    fork: impl Into<ForkSchedule>,
) -> (Arc<MockTransitionTool>, BlockchainFiller<MockTransitionTool>) {
    let tool = Arc::new(tool);
    let config = FillerConfig { implicit_slots: Vec::new(), ..Default::default() };
    (tool.clone(), BlockchainFiller::new(tool, fork.into(), config))
}

#[tokio::test]
async fn test_two_block_chain() {
    let block_one = with_contract(&pre(), 1);
    let tool = MockTransitionTool::new([
        MockBlock { post_alloc: Some(block_one.clone()), ..Default::default() },
        MockBlock { post_alloc: Some(block_one.clone()), ..Default::default() },
    ]);
    let (tool, filler) = setup(tool, Fork::Shanghai);

    let expected = ExpectedAccount {
        storage: Some(BTreeMap::from([(U256::ZERO, U256::from(1))])),
        ..Default::default()
    };
    let test = BlockchainTest {
        pre: pre(),
        post: PostAlloc(BTreeMap::from([(CONTRACT, Some(expected))])),
        blocks: vec![
            Block { txs: vec![tx(0)], ..Default::default() },
            Block { txs: vec![tx(1)], ..Default::default() },
        ],
        ..Default::default()
    };

    let fixture = filler.fill_blockchain("two_blocks", &test).await.unwrap();
    assert_eq!(tool.calls(), 2);

    let headers = fixture
        .blocks
        .iter()
        .map(|entry| match entry {
            FixtureBlockEntry::Valid(block) => block.block.block_header.clone(),
            FixtureBlockEntry::Invalid(_) => panic!("unexpected invalid block"),
        })
        .collect::<Vec<_>>();
    assert_eq!(headers[0].parent_hash, fixture.genesis_block_header.hash);
    assert_eq!(headers[1].parent_hash, headers[0].hash);
    assert_eq!(fixture.last_block_hash, headers[1].hash);
    assert_eq!(headers[1].number, 2);
    assert_eq!(headers[1].timestamp, 24);
    assert_eq!(headers[1].state_root, block_one.state_root());
    assert_eq!(fixture.post_state, block_one);
    assert_eq!(fixture.network, "Shanghai");
    assert_eq!(fixture.seal_engine, "NoProof");

    let second = &tool.requests()[1];
    assert_eq!(second.alloc, block_one);
    assert_eq!(second.env.block_hashes.get(&1), Some(&headers[0].hash));
    assert_eq!(second.fork, "Shanghai");
}

#[tokio::test]
async fn test_genesis() {
    let (_, filler) = setup(MockTransitionTool::default(), Fork::London);
    let test = BlockchainTest { pre: pre(), ..Default::default() };
    let genesis = filler.make_genesis(&test).await.unwrap();
    assert_eq!(genesis.header.number, 0);
    assert_eq!(genesis.header.ommers_hash, EMPTY_OMMER_ROOT_HASH);
    assert_eq!(genesis.header.difficulty, U256::from(0x20000));
    assert_eq!(genesis.header.base_fee_per_gas, Some(7));
    assert_eq!(genesis.header.withdrawals_root, None);
    assert_eq!(genesis.header.state_root, pre().state_root());

    let (_, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let genesis = filler.make_genesis(&test).await.unwrap();
    assert_eq!(genesis.header.difficulty, U256::ZERO);
    assert_eq!(genesis.header.parent_beacon_block_root, Some(B256::ZERO));
    assert!(genesis.alloc.len() > test.pre.len());
}

#[tokio::test]
async fn test_genesis_rejects_withdrawals_and_empty_accounts() {
    let (_, filler) = setup(MockTransitionTool::default(), Fork::Shanghai);

    let mut test = BlockchainTest { pre: pre(), ..Default::default() };
    test.genesis_environment.withdrawals =
        Some(vec![eft_primitives::Withdrawal { index: 1, ..Default::default() }]);
    assert!(matches!(
        filler.make_genesis(&test).await,
        Err(FillerError::Authoring(AuthoringError::GenesisWithdrawals))
    ));

    let mut test = BlockchainTest { pre: pre(), ..Default::default() };
    test.pre.insert(CONTRACT, Account::default());
    assert!(matches!(
        filler.make_genesis(&test).await,
        Err(FillerError::Authoring(AuthoringError::EmptyAccounts(accounts))) if accounts == [CONTRACT]
    ));
}

#[tokio::test]
async fn test_incorrect_block_format() {
    let removed = HeaderOverrides { withdrawals_root: HeaderField::Removed, ..Default::default() };
    let block = |exception: ExceptionSet| Block {
        rlp_modifier: Some(removed.clone()),
        exception: Some(exception),
        ..Default::default()
    };

    let (tool, filler) = setup(MockTransitionTool::default(), Fork::Shanghai);
    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![
            block(BlockException::IncorrectBlockFormat.into()),
            block(ExceptionSet::new([
                BlockException::RlpStructuresEncoding,
                BlockException::IncorrectBlockFormat,
            ])),
        ],
        ..Default::default()
    };
    let fixture = filler.fill_blockchain("incorrect_format", &test).await.unwrap();
    assert_eq!(tool.calls(), 2);
    assert_eq!(fixture.last_block_hash, fixture.genesis_block_header.hash);

    let FixtureBlockEntry::Invalid(first) = &fixture.blocks[0] else {
        panic!("expected an invalid block");
    };
    let decoded = first.rlp_decoded.as_ref().unwrap();
    assert_eq!(decoded.block_header.withdrawals_root, None);
    assert_eq!(decoded.block_header.number, 1);

    let FixtureBlockEntry::Invalid(second) = &fixture.blocks[1] else {
        panic!("expected an invalid block");
    };
    assert!(second.rlp_decoded.is_none());
    assert_eq!(second.rlp, first.rlp);
}

#[tokio::test]
async fn test_expected_transaction_failure() {
    let tool = MockTransitionTool::new([MockBlock {
        rejected: vec![(1, "intrinsic gas too low".into())],
        ..Default::default()
    }]);
    let (_, filler) = setup(tool, Fork::Cancun);
    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block {
            txs: vec![tx(0), tx(1).with_error(TransactionException::IntrinsicGasTooLow)],
            ..Default::default()
        }],
        ..Default::default()
    };
    let fixture = filler.fill_blockchain("tx_failure", &test).await.unwrap();
    let FixtureBlockEntry::Invalid(block) = &fixture.blocks[0] else {
        panic!("expected an invalid block");
    };
    assert!(block.expect_exception.contains(TransactionException::IntrinsicGasTooLow));
    assert_eq!(block.rlp_decoded.as_ref().unwrap().transactions.len(), 2);
    assert_eq!(fixture.last_block_hash, fixture.genesis_block_header.hash);
}

#[tokio::test]
async fn test_unexpected_failure() {
    let tool = MockTransitionTool::new([MockBlock {
        rejected: vec![(0, "nonce too high".into())],
        ..Default::default()
    }]);
    let (_, filler) = setup(tool, Fork::Cancun);
    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block { txs: vec![tx(5)], ..Default::default() }],
        ..Default::default()
    };
    assert!(matches!(
        filler.fill_blockchain("unexpected", &test).await,
        Err(FillerError::Authoring(AuthoringError::UnexpectedFailure { index: 0, .. }))
    ));
}

#[tokio::test]
async fn test_authoring_errors_skip_the_tool() {
    let (tool, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let failing = || tx(0).with_error(TransactionException::IntrinsicGasTooLow);

    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block { txs: vec![failing(), failing()], ..Default::default() }],
        ..Default::default()
    };
    assert!(matches!(
        filler.fill_blockchain("multiple", &test).await,
        Err(FillerError::Authoring(AuthoringError::MultipleFailingTransactions(2)))
    ));

    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block { txs: vec![failing(), tx(1)], ..Default::default() }],
        ..Default::default()
    };
    assert!(matches!(
        filler.fill_blockchain("not_last", &test).await,
        Err(FillerError::Authoring(AuthoringError::FailingTransactionNotLast { index: 0, len: 2 }))
    ));

    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block { rlp: Some(Bytes::from_static(&[0xc0])), ..Default::default() }],
        ..Default::default()
    };
    assert!(matches!(
        filler.fill_blockchain("raw", &test).await,
        Err(FillerError::Authoring(AuthoringError::RawRlpWithoutException(0)))
    ));
    assert_eq!(tool.calls(), 0);
}

#[tokio::test]
async fn test_raw_rlp_block() {
    let (tool, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block {
            rlp: Some(Bytes::from_static(&[0xc0])),
            exception: Some(BlockException::RlpStructuresEncoding.into()),
            ..Default::default()
        }],
        ..Default::default()
    };
    let fixture = filler.fill_blockchain("raw", &test).await.unwrap();
    assert_eq!(tool.calls(), 0);
    let FixtureBlockEntry::Invalid(block) = &fixture.blocks[0] else {
        panic!("expected an invalid block");
    };
    assert_eq!(block.rlp, Bytes::from_static(&[0xc0]));
    assert!(block.rlp_decoded.is_none());

    assert!(matches!(
        filler.fill_engine("raw", &test).await,
        Err(FillerError::Authoring(AuthoringError::RawRlpInEngineFixture(0)))
    ));
}

#[tokio::test]
async fn test_post_state_mismatch() {
    let (_, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let test = BlockchainTest {
        pre: pre(),
        post: PostAlloc(BTreeMap::from([(CONTRACT, Some(ExpectedAccount::default()))])),
        blocks: vec![Block::default()],
        ..Default::default()
    };
    assert!(matches!(
        filler.fill_blockchain("post", &test).await,
        Err(FillerError::Consistency(ConsistencyError::PostState(_)))
    ));
}

#[tokio::test]
async fn test_requests() {
    let deposit = DepositRequest {
        pubkey: Default::default(),
        withdrawal_credentials: B256::repeat_byte(0x01),
        amount: 32_000_000_000,
        signature: Default::default(),
        index: 0,
    };
    let requests = Requests(vec![Request::Deposit(deposit.clone())]);
    let tool = MockTransitionTool::new([MockBlock {
        requests: Some(requests.clone()),
        ..Default::default()
    }]);
    let (_, filler) = setup(tool, Fork::Prague);
    let test = BlockchainTest { pre: pre(), blocks: vec![Block::default()], ..Default::default() };

    let fixture = filler.fill_blockchain("requests", &test).await.unwrap();
    assert_eq!(
        fixture.genesis_block_header.requests_root,
        Some(Requests::default().trie_root())
    );
    let FixtureBlockEntry::Valid(block) = &fixture.blocks[0] else {
        panic!("expected a valid block");
    };
    assert_eq!(block.block.block_header.requests_root, Some(requests.trie_root()));
    assert_eq!(block.block.deposit_requests, Some(vec![deposit]));
    assert_eq!(block.block.withdrawal_requests, Some(Vec::new()));
}

#[tokio::test]
async fn test_engine_fixture() {
    let (tool, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![
            Block { txs: vec![tx(0)], ..Default::default() },
            Block {
                exception: Some(BlockException::IncorrectBlobGasUsed.into()),
                blob_gas_used: HeaderField::SetTo(1),
                ..Default::default()
            },
        ],
        verify_sync: true,
        ..Default::default()
    };
    let fixture = filler.fill_engine("engine", &test).await.unwrap();
    assert_eq!(tool.calls(), 3);
    assert_eq!(fixture.engine_fcu_version, 3);
    assert_eq!(fixture.engine_new_payloads.len(), 2);

    let valid = &fixture.engine_new_payloads[0];
    assert_eq!(valid.version, 3);
    assert_eq!(valid.execution_payload.block_hash, fixture.last_block_hash);
    assert_eq!(valid.execution_payload.transactions, vec![tx(0).rlp]);
    assert!(valid.validation_error.is_none());

    let invalid = &fixture.engine_new_payloads[1];
    assert!(invalid.validation_error.is_some());
    assert_eq!(invalid.execution_payload.parent_hash, fixture.last_block_hash);

    let sync = fixture.sync_payload.unwrap();
    assert_eq!(sync.execution_payload.parent_hash, fixture.last_block_hash);
    assert_eq!(sync.execution_payload.block_number, 2);
}

#[tokio::test]
async fn test_blob_gas_used() {
    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block { txs: vec![blob_tx(0, 1), blob_tx(1, 2)], ..Default::default() }],
        ..Default::default()
    };

    let (_, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let fixture = filler.fill_blockchain("blobs", &test).await.unwrap();
    let FixtureBlockEntry::Valid(block) = &fixture.blocks[0] else {
        panic!("expected a valid block");
    };
    assert_eq!(block.block.block_header.blob_gas_used, Some(3 * 0x20000));
    assert_eq!(block.block.transactions.len(), 2);

    let (_, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let fixture = filler.fill_engine("blobs", &test).await.unwrap();
    let payload = &fixture.engine_new_payloads[0];
    assert_eq!(payload.execution_payload.blob_gas_used, Some(3 * 0x20000));
    assert_eq!(
        payload.blob_versioned_hashes.as_deref(),
        Some(&[B256::with_last_byte(1), B256::with_last_byte(1), B256::with_last_byte(2)][..])
    );
}

#[tokio::test]
async fn test_undecodable_transaction_in_invalid_block() {
    let malformed = Transaction::new(Bytes::from_static(&[0x03, 0xc0, 0x01]));
    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block {
            txs: vec![blob_tx(0, 1), malformed],
            exception: Some(BlockException::IncorrectBlockFormat.into()),
            ..Default::default()
        }],
        ..Default::default()
    };

    let (_, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let fixture = filler.fill_blockchain("malformed", &test).await.unwrap();
    let FixtureBlockEntry::Invalid(block) = &fixture.blocks[0] else {
        panic!("expected an invalid block");
    };
    assert!(block.rlp_decoded.is_none());
    assert_eq!(fixture.last_block_hash, fixture.genesis_block_header.hash);

    let (_, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let fixture = filler.fill_engine("malformed", &test).await.unwrap();
    let payload = &fixture.engine_new_payloads[0];
    assert!(payload.validation_error.is_some());
    assert_eq!(payload.execution_payload.blob_gas_used, Some(0x20000));
    assert_eq!(payload.blob_versioned_hashes.as_deref(), Some(&[B256::with_last_byte(1)][..]));
}

#[tokio::test]
async fn test_sync_without_blocks() {
    let (_, filler) = setup(MockTransitionTool::default(), Fork::Cancun);
    let test = BlockchainTest { pre: pre(), verify_sync: true, ..Default::default() };
    assert!(matches!(
        filler.fill_engine("sync", &test).await,
        Err(FillerError::Authoring(AuthoringError::SyncWithoutBlocks))
    ));
}

#[tokio::test]
async fn test_statelessness_witness() {
    let keys = MockTransitionTool::default();
    let (account_stem, _) = split_tree_key(&keys.single_key(SENDER, None).await.unwrap());
    let history_key = keys.single_key(HISTORY_STORAGE_ADDRESS, Some(U256::ZERO)).await.unwrap();
    let (history_stem, history_suffix) = split_tree_key(&history_key);

    let balance = B256::with_last_byte(1);
    let state_diff = StateDiff(vec![
        StemStateDiff {
            stem: account_stem,
            suffix_diffs: vec![SuffixStateDiff {
                suffix: AccountHeaderEntry::Balance.suffix(),
                current_value: Some(balance),
                new_value: None,
            }],
        },
        StemStateDiff {
            stem: history_stem,
            suffix_diffs: vec![SuffixStateDiff {
                suffix: history_suffix,
                current_value: None,
                new_value: Some(B256::repeat_byte(0xaa)),
            }],
        },
    ]);
    let tool = MockTransitionTool::new([MockBlock {
        state_diff: Some(state_diff.clone()),
        ..Default::default()
    }]);
    let tool = Arc::new(tool);
    let filler = BlockchainFiller::new(tool.clone(), Fork::Verkle.into(), FillerConfig::default());

    let mut check = WitnessCheck::default();
    check.add_account_entry(SENDER, AccountHeaderEntry::Balance, Some(balance));
    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block { witness_check: Some(check.clone()), ..Default::default() }],
        ..Default::default()
    };
    let fixture = filler.fill_blockchain("verkle", &test).await.unwrap();
    let FixtureBlockEntry::Valid(block) = &fixture.blocks[0] else {
        panic!("expected a valid block");
    };
    assert_eq!(block.block.witness.as_ref().map(|w| &w.state_diff), Some(&state_diff));
    assert!(tool.requests()[0].vkt.is_some());

    // Without the implicit history slot the state diff touches an unexpected stem.
    let tool = Arc::new(MockTransitionTool::new([MockBlock {
        state_diff: Some(state_diff),
        ..Default::default()
    }]));
    let config = FillerConfig { implicit_slots: Vec::new(), ..Default::default() };
    let filler = BlockchainFiller::new(tool, Fork::Verkle.into(), config);
    assert!(matches!(
        filler.fill_blockchain("verkle", &test).await,
        Err(FillerError::Consistency(ConsistencyError::Witness(_)))
    ));
}

#[tokio::test]
async fn test_debug_dirs() {
    let tool = Arc::new(MockTransitionTool::default());
    let config = FillerConfig {
        debug_dir: Some(PathBuf::from("/tmp/eft-debug")),
        eips: vec![7702],
        ..Default::default()
    };
    let filler = BlockchainFiller::new(tool.clone(), Fork::Prague.into(), config);
    let test = BlockchainTest {
        pre: pre(),
        blocks: vec![Block::default(), Block::default()],
        ..Default::default()
    };
    let fixture = filler.fill_blockchain("debug", &test).await.unwrap();
    assert_eq!(fixture.network, "Prague+7702");

    let requests = tool.requests();
    assert_eq!(requests[0].debug_dir, Some(PathBuf::from("/tmp/eft-debug/debug/0")));
    assert_eq!(requests[1].debug_dir, Some(PathBuf::from("/tmp/eft-debug/debug/1")));
    assert_eq!(requests[0].fork, "Prague+7702");
}
