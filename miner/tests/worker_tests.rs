use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use num_bigint::BigInt;
use tokio::time::timeout;

use ember_crypto::{header_hash, Keypair};
use ember_engine::Engine;
use ember_miner::{BlockWriter, MinerError, TxPool, Worker, WorkerConfig};
use ember_nullables::{genesis_with_signers, MemStakingDb, NullChain, NullState};
use ember_types::config::EngineConfig;
use ember_types::{Block, ChainConfig, StateView, Transaction};

struct EmptyPool;

impl TxPool for EmptyPool {
    fn pending(&self) -> Vec<Transaction> {
        Vec::new()
    }
}

#[derive(Default)]
struct RecordingWriter {
    written: Mutex<Vec<Block>>,
}

impl BlockWriter for RecordingWriter {
    fn write_block(&self, block: &Block, _state: Box<dyn StateView>) -> Result<(), MinerError> {
        self.written.lock().unwrap().push(block.clone());
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[tokio::test(flavor = "multi_thread")]
async fn worker_seals_a_block_end_to_end() {
    let keypair = Keypair::from_seed(&[7u8; 32]).unwrap();
    let coinbase = keypair.address();

    // Genesis authorises the local signer and sits far enough in the past
    // that the prepared header needs no waiting.
    let mut state = NullState::new();
    let root = state.intermediate_root();
    let genesis = genesis_with_signers(&[coinbase], unix_now() - 1000, root);

    let chain = Arc::new(NullChain::new(ChainConfig::dev()));
    chain.insert_block(Block::new(genesis.clone(), Vec::new()), state);

    let engine = Arc::new(Engine::new(
        EngineConfig {
            period: 1,
            ..EngineConfig::default()
        },
        Arc::new(MemStakingDb::new()),
    ));
    let signer = keypair.clone();
    engine.authorize(
        coinbase,
        Arc::new(move |_, digest| signer.sign_prehash(digest)),
    );

    let writer = Arc::new(RecordingWriter::default());
    let handle = Worker::new(
        WorkerConfig {
            coinbase,
            recommit: Duration::from_secs(2),
        },
        Arc::clone(&engine),
        chain.clone(),
        Arc::new(EmptyPool),
        writer.clone(),
    )
    .spawn();

    let mut sealed = handle.subscribe_sealed();
    handle.notify_chain_head(genesis.clone()).await.unwrap();

    let header = timeout(Duration::from_secs(10), sealed.recv())
        .await
        .expect("timed out waiting for a sealed block")
        .expect("sealed event channel closed");

    assert_eq!(header.number, 1);
    assert_eq!(header.parent_hash, header_hash(&genesis));
    assert_eq!(header.coinbase, coinbase);
    // Target is genesis, so the legacy constant difficulty and rank apply.
    assert_eq!(header.difficulty, BigInt::from(1234));
    assert_eq!(header.nonce.as_u64(), 1);
    // The seal recovers to the producer.
    assert_eq!(engine.author(&header).unwrap(), coinbase);

    let written = writer.written.lock().unwrap();
    assert!(!written.is_empty());
    assert_eq!(written[0].number(), 1);
    drop(written);

    handle.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthorized_worker_stays_silent() {
    let keypair = Keypair::from_seed(&[8u8; 32]).unwrap();
    let outsider = Keypair::from_seed(&[9u8; 32]).unwrap();

    let mut state = NullState::new();
    let root = state.intermediate_root();
    // Genesis authorises someone else entirely.
    let genesis = genesis_with_signers(&[keypair.address()], unix_now() - 1000, root);

    let chain = Arc::new(NullChain::new(ChainConfig::dev()));
    chain.insert_block(Block::new(genesis.clone(), Vec::new()), state);

    let engine = Arc::new(Engine::new(
        EngineConfig {
            period: 1,
            ..EngineConfig::default()
        },
        Arc::new(MemStakingDb::new()),
    ));
    let signer = outsider.clone();
    engine.authorize(
        outsider.address(),
        Arc::new(move |_, digest| signer.sign_prehash(digest)),
    );

    let writer = Arc::new(RecordingWriter::default());
    let handle = Worker::new(
        WorkerConfig {
            coinbase: outsider.address(),
            recommit: Duration::from_secs(2),
        },
        Arc::clone(&engine),
        chain.clone(),
        Arc::new(EmptyPool),
        writer.clone(),
    )
    .spawn();

    let mut sealed = handle.subscribe_sealed();
    handle.notify_chain_head(genesis).await.unwrap();

    // The outsider is not in the genesis signer list: the seal must never
    // fire.
    let result = timeout(Duration::from_millis(1500), sealed.recv()).await;
    assert!(result.is_err(), "unauthorized signer produced a block");
    assert!(writer.written.lock().unwrap().is_empty());

    handle.shutdown();
}
