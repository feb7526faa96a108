//! The worker: four cooperating loops around the consensus engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use ember_crypto::header_hash;
use ember_engine::{seal_hash, Engine, EngineError};
use ember_types::{Address, Block, ChainReader, Hash, Header, StateView, Transaction};

use crate::error::MinerError;
use crate::interrupt::{CommitInterrupt, InterruptReason};
use crate::recommit::RecommitCalculator;

/// Only the freshest work request matters.
const NEW_WORK_CAPACITY: usize = 1;
const TASK_CAPACITY: usize = 4;
const RESULT_CAPACITY: usize = 16;
const CHAIN_HEAD_CAPACITY: usize = 16;
const SEALED_EVENT_CAPACITY: usize = 16;

/// Default recommit interval.
const DEFAULT_RECOMMIT: Duration = Duration::from_secs(3);

/// Pending-transaction source (the pool itself lives outside this
/// workspace).
pub trait TxPool: Send + Sync {
    fn pending(&self) -> Vec<Transaction>;
}

/// Sink for sealed blocks: persist the block together with the state the
/// miner built it against.
pub trait BlockWriter: Send + Sync {
    fn write_block(&self, block: &Block, state: Box<dyn StateView>) -> Result<(), MinerError>;
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Producer address credited in sealed headers.
    pub coinbase: Address,
    /// Configured recommit interval; sanitised into `[1 s, 15 s]`.
    pub recommit: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            coinbase: Address::ZERO,
            recommit: DEFAULT_RECOMMIT,
        }
    }
}

struct NewWorkReq {
    interrupt: CommitInterrupt,
    parent: Header,
}

struct SealTask {
    block: Block,
    state: Box<dyn StateView>,
}

struct AdjustFeedback {
    target: Duration,
    increase: bool,
}

type PendingStates = Arc<Mutex<HashMap<Hash, Box<dyn StateView>>>>;

/// The miner driver. [`Worker::spawn`] wires the loops and returns the
/// handle the embedding node signals.
pub struct Worker {
    config: WorkerConfig,
    engine: Arc<Engine>,
    chain: Arc<dyn ChainReader>,
    tx_pool: Arc<dyn TxPool>,
    writer: Arc<dyn BlockWriter>,
}

/// Channels into a running worker.
pub struct WorkerHandle {
    chain_head_tx: mpsc::Sender<Header>,
    tx_notify_tx: mpsc::Sender<()>,
    sealed_tx: broadcast::Sender<Header>,
    shutdown: CancellationToken,
}

impl WorkerHandle {
    /// Feed a new canonical head; triggers a fresh work round.
    pub async fn notify_chain_head(&self, header: Header) -> Result<(), MinerError> {
        self.chain_head_tx
            .send(header)
            .await
            .map_err(|_| MinerError::ChannelClosed)
    }

    /// Signal that the pending-transaction set changed.
    pub async fn notify_transactions(&self) -> Result<(), MinerError> {
        self.tx_notify_tx
            .send(())
            .await
            .map_err(|_| MinerError::ChannelClosed)
    }

    /// Subscribe to headers of sealed, written blocks.
    pub fn subscribe_sealed(&self) -> broadcast::Receiver<Header> {
        self.sealed_tx.subscribe()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        engine: Arc<Engine>,
        chain: Arc<dyn ChainReader>,
        tx_pool: Arc<dyn TxPool>,
        writer: Arc<dyn BlockWriter>,
    ) -> Self {
        Self {
            config,
            engine,
            chain,
            tx_pool,
            writer,
        }
    }

    /// Start the work, main, task, and result loops.
    pub fn spawn(self) -> WorkerHandle {
        let (chain_head_tx, chain_head_rx) = mpsc::channel(CHAIN_HEAD_CAPACITY);
        let (tx_notify_tx, tx_notify_rx) = mpsc::channel(CHAIN_HEAD_CAPACITY);
        let (new_work_tx, new_work_rx) = mpsc::channel(NEW_WORK_CAPACITY);
        let (task_tx, task_rx) = mpsc::channel(TASK_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel(RESULT_CAPACITY);
        let (adjust_tx, adjust_rx) = mpsc::channel(RESULT_CAPACITY);
        let (sealed_tx, _) = broadcast::channel(SEALED_EVENT_CAPACITY);
        let shutdown = CancellationToken::new();

        let pending: PendingStates = Arc::default();

        tokio::spawn(work_loop(
            self.config.recommit,
            chain_head_rx,
            tx_notify_rx,
            adjust_rx,
            new_work_tx,
            shutdown.clone(),
        ));
        tokio::spawn(main_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.chain),
            Arc::clone(&self.tx_pool),
            self.config.coinbase,
            new_work_rx,
            task_tx,
            adjust_tx,
            shutdown.clone(),
        ));
        tokio::spawn(task_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.chain),
            task_rx,
            result_tx,
            Arc::clone(&pending),
            shutdown.clone(),
        ));
        tokio::spawn(result_loop(
            Arc::clone(&self.writer),
            pending,
            result_rx,
            sealed_tx.clone(),
            chain_head_tx.clone(),
            shutdown.clone(),
        ));

        WorkerHandle {
            chain_head_tx,
            tx_notify_tx,
            sealed_tx,
            shutdown,
        }
    }
}

/// Issue the next commit round: signal the previous interrupt and mint a
/// fresh one.
fn next_round(
    current: &mut Option<CommitInterrupt>,
    parent: Header,
    reason: InterruptReason,
) -> NewWorkReq {
    if let Some(prev) = current.take() {
        prev.signal(reason);
    }
    let interrupt = CommitInterrupt::new();
    *current = Some(interrupt.clone());
    NewWorkReq { interrupt, parent }
}

/// Listens for chain-head and tx-pool signals plus the recommit timer and
/// emits work requests; folds interval feedback into the EMA.
async fn work_loop(
    recommit: Duration,
    mut chain_head_rx: mpsc::Receiver<Header>,
    mut tx_notify_rx: mpsc::Receiver<()>,
    mut adjust_rx: mpsc::Receiver<AdjustFeedback>,
    new_work_tx: mpsc::Sender<NewWorkReq>,
    shutdown: CancellationToken,
) {
    let mut calc = RecommitCalculator::new(recommit);
    let mut head: Option<Header> = None;
    let mut current: Option<CommitInterrupt> = None;

    let timer = tokio::time::sleep(calc.current());
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            maybe_head = chain_head_rx.recv() => {
                let Some(header) = maybe_head else { break };
                let req = next_round(&mut current, header.clone(), InterruptReason::NewHead);
                head = Some(header);
                if new_work_tx.send(req).await.is_err() {
                    break;
                }
                timer.as_mut().reset(Instant::now() + calc.current());
            }

            maybe_notify = tx_notify_rx.recv() => {
                if maybe_notify.is_none() {
                    break;
                }
                // Fresh transactions: resubmit on top of the same parent.
                if let Some(parent) = head.clone() {
                    let req = next_round(&mut current, parent, InterruptReason::Resubmit);
                    if new_work_tx.send(req).await.is_err() {
                        break;
                    }
                    timer.as_mut().reset(Instant::now() + calc.current());
                }
            }

            () = &mut timer => {
                if let Some(parent) = head.clone() {
                    let req = next_round(&mut current, parent, InterruptReason::Resubmit);
                    if new_work_tx.send(req).await.is_err() {
                        break;
                    }
                }
                timer.as_mut().reset(Instant::now() + calc.current());
            }

            maybe_feedback = adjust_rx.recv() => {
                let Some(feedback) = maybe_feedback else { break };
                let next = calc.adjust(feedback.target, feedback.increase);
                tracing::trace!(interval_ms = next.as_millis() as u64, "recommit interval adjusted");
            }
        }
    }
}

/// Consumes work requests: prepare, gather transactions under the
/// interrupt word, finalize, and push the seal task.
async fn main_loop(
    engine: Arc<Engine>,
    chain: Arc<dyn ChainReader>,
    tx_pool: Arc<dyn TxPool>,
    coinbase: Address,
    mut new_work_rx: mpsc::Receiver<NewWorkReq>,
    task_tx: mpsc::Sender<SealTask>,
    adjust_tx: mpsc::Sender<AdjustFeedback>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            maybe_req = new_work_rx.recv() => {
                let Some(req) = maybe_req else { break };
                if let Some(task) =
                    commit_new_work(&engine, chain.as_ref(), tx_pool.as_ref(), coinbase, &req, &adjust_tx)
                {
                    if task_tx.send(task).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

fn commit_new_work(
    engine: &Engine,
    chain: &dyn ChainReader,
    tx_pool: &dyn TxPool,
    coinbase: Address,
    req: &NewWorkReq,
    adjust_tx: &mpsc::Sender<AdjustFeedback>,
) -> Option<SealTask> {
    let parent = &req.parent;
    let mut header = Header {
        parent_hash: header_hash(parent),
        number: parent.number + 1,
        coinbase,
        ..Header::default()
    };

    if let Err(e) = engine.prepare(chain, &mut header) {
        match e {
            EngineError::Unauthorized => {
                tracing::trace!(number = header.number, "not elected for this round")
            }
            other => tracing::debug!(number = header.number, error = %other, "prepare failed"),
        }
        return None;
    }

    let started = Instant::now();
    let mut txs: Vec<Transaction> = Vec::new();
    for tx in tx_pool.pending() {
        match req.interrupt.reason() {
            InterruptReason::NewHead => {
                tracing::trace!(number = header.number, "commit abandoned for new head");
                return None;
            }
            InterruptReason::Resubmit => {
                // Submit what is gathered as a partial block; tell the
                // work loop the interval was too short.
                let _ = adjust_tx.try_send(AdjustFeedback {
                    target: started.elapsed(),
                    increase: true,
                });
                break;
            }
            InterruptReason::None => {}
        }
        txs.push(tx);
    }

    let Some(mut state) = chain.state_at(&parent.state_root) else {
        tracing::debug!(number = header.number, "parent state unavailable");
        return None;
    };

    let block = match engine.finalize(chain, &mut header, state.as_mut(), &txs) {
        Ok(block) => block,
        Err(e) => {
            tracing::debug!(number = header.number, error = %e, "finalize failed");
            return None;
        }
    };

    let _ = adjust_tx.try_send(AdjustFeedback {
        target: started.elapsed(),
        increase: false,
    });
    Some(SealTask {
        block,
        state,
    })
}

/// Feeds finalized blocks into the engine's timed seal, cancelling the
/// previous attempt.
async fn task_loop(
    engine: Arc<Engine>,
    chain: Arc<dyn ChainReader>,
    mut task_rx: mpsc::Receiver<SealTask>,
    result_tx: mpsc::Sender<Block>,
    pending: PendingStates,
    shutdown: CancellationToken,
) {
    let mut prev_seal: Option<Hash> = None;
    let mut cancel: Option<CancellationToken> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if let Some(token) = cancel.take() {
                    token.cancel();
                }
                break;
            }
            maybe_task = task_rx.recv() => {
                let Some(task) = maybe_task else { break };
                let digest = seal_hash(task.block.header());
                if prev_seal == Some(digest) {
                    continue;
                }
                if let Some(token) = cancel.take() {
                    token.cancel();
                }

                let token = CancellationToken::new();
                pending
                    .lock()
                    .expect("pending states poisoned")
                    .insert(digest, task.state);

                match engine.seal(chain.as_ref(), task.block, result_tx.clone(), token.clone()) {
                    Ok(()) => {
                        prev_seal = Some(digest);
                        cancel = Some(token);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "seal attempt rejected");
                        pending
                            .lock()
                            .expect("pending states poisoned")
                            .remove(&digest);
                    }
                }
            }
        }
    }
}

/// Drains sealed blocks: write them with their state, publish the new
/// head, and feed the work loop for the next round.
async fn result_loop(
    writer: Arc<dyn BlockWriter>,
    pending: PendingStates,
    mut result_rx: mpsc::Receiver<Block>,
    sealed_tx: broadcast::Sender<Header>,
    chain_head_tx: mpsc::Sender<Header>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            maybe_block = result_rx.recv() => {
                let Some(block) = maybe_block else { break };
                let digest = seal_hash(block.header());
                let Some(state) = pending
                    .lock()
                    .expect("pending states poisoned")
                    .remove(&digest)
                else {
                    tracing::warn!(number = block.number(), "sealed block without pending state");
                    continue;
                };

                if let Err(e) = writer.write_block(&block, state) {
                    tracing::error!(number = block.number(), error = %e, "failed to write sealed block");
                    continue;
                }

                tracing::info!(
                    number = block.number(),
                    hash = %header_hash(block.header()),
                    "sealed block written"
                );
                let _ = sealed_tx.send(block.header().clone());
                let _ = chain_head_tx.try_send(block.header().clone());
            }
        }
    }
}
