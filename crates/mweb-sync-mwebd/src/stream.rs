//! UTXO stream consumer
//!
//! Drives the daemon's Utxos stream on a spawned task and accumulates the
//! outputs into a [`UtxoSet`]. The delivery task is the only writer of the
//! set; everyone else gets cloned snapshots.
//!
//! State machine: `Idle -> Streaming -> (Idle | Failed)`. A failed stream is
//! never resumed automatically. Resuming mid-stream could silently skip
//! outputs, so a new [`UtxoStreamConsumer::start`] from a caller-chosen
//! height is required.

use crate::cancel::CancelToken;
use crate::client::{MwebRpc, UtxoStream};
use crate::{Error, Result, RpcError};
use futures::StreamExt;
use mweb_core::{Balance, ScanSecret, Utxo, UtxoSet};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const EVENT_CAPACITY: usize = 256;

/// Consumer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// No stream open
    #[default]
    Idle,
    /// Delivery task running
    Streaming,
    /// Stream broke; restart required
    Failed,
}

/// How a stream run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Server closed the stream cleanly
    Completed {
        /// Distinct outputs in the set
        outputs: usize,
        /// Duplicate messages dropped
        duplicates: usize,
    },
    /// Server closed the stream without any outputs. Informational.
    NoOutputsFound,
    /// Stopped by the caller
    Cancelled {
        /// Messages received before the stop
        received: usize,
    },
}

/// Observable stream events
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtxoStreamEvent {
    /// Stream opened
    Started { from_height: u32 },
    /// New output inserted
    UtxoAdded(Utxo),
    /// Output id already present; message dropped
    DuplicateSkipped { output_id: String },
    /// Server closed the stream
    Completed { outputs: usize, duplicates: usize },
    /// Server closed the stream and the set is empty
    NoOutputsFound,
    /// Transport or daemon failure
    Failed { received: usize, error: RpcError },
    /// Stopped by the caller
    Cancelled { received: usize },
}

fn log_event(event: &UtxoStreamEvent) {
    match event {
        UtxoStreamEvent::Started { from_height } => {
            info!(event = "utxo_stream_started", from_height, "UTXO stream started");
        }
        UtxoStreamEvent::UtxoAdded(utxo) => {
            debug!(
                event = "utxo_added",
                output_id = %utxo.output_id,
                value = utxo.value,
                height = utxo.height,
                "UTXO added"
            );
        }
        UtxoStreamEvent::DuplicateSkipped { output_id } => {
            debug!(event = "utxo_duplicate_skipped", output_id = %output_id, "Duplicate UTXO skipped");
        }
        UtxoStreamEvent::Completed {
            outputs,
            duplicates,
        } => {
            info!(event = "utxo_stream_completed", outputs, duplicates, "UTXO stream completed");
        }
        UtxoStreamEvent::NoOutputsFound => {
            info!(event = "utxo_stream_no_outputs", "No UTXOs found");
        }
        UtxoStreamEvent::Failed { received, error } => {
            error!(
                event = "utxo_stream_failed",
                received,
                code = ?error.code,
                message = %error.message,
                "UTXO stream failed"
            );
        }
        UtxoStreamEvent::Cancelled { received } => {
            info!(event = "utxo_stream_cancelled", received, "UTXO stream cancelled");
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: StreamState,
    utxos: UtxoSet,
    last_error: Option<RpcError>,
    // Bumped on every start; a delivery task only writes while it matches
    generation: u64,
}

struct RunningStream {
    cancel: CancelToken,
    handle: Option<JoinHandle<Result<StreamOutcome>>>,
}

/// Consumes the Utxos stream into a deduplicated set
pub struct UtxoStreamConsumer {
    rpc: Arc<dyn MwebRpc>,
    shared: Arc<RwLock<Shared>>,
    events: broadcast::Sender<UtxoStreamEvent>,
    running: Mutex<Option<RunningStream>>,
}

impl UtxoStreamConsumer {
    /// Consumer over `rpc`
    pub fn new(rpc: Arc<dyn MwebRpc>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            rpc,
            shared: Arc::new(RwLock::new(Shared::default())),
            events,
            running: Mutex::new(None),
        }
    }

    /// Reset the set and stream outputs from `from_height`.
    ///
    /// Any running stream is stopped first. An error opening the stream is
    /// returned here and leaves the consumer `Failed`; failures after that
    /// are reported by [`wait`](Self::wait) and the event channel.
    pub async fn start(&self, from_height: u32, scan_secret: &ScanSecret) -> Result<()> {
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            stop_running(previous).await;
        }

        let generation = {
            let mut shared = self.shared.write();
            shared.generation += 1;
            shared.utxos.reset();
            shared.last_error = None;
            shared.state = StreamState::Streaming;
            shared.generation
        };

        let stream = match self.rpc.utxos(from_height, scan_secret).await {
            Ok(stream) => stream,
            Err(e) => {
                let source = e.to_rpc_error();
                {
                    let mut shared = self.shared.write();
                    shared.state = StreamState::Failed;
                    shared.last_error = Some(source.clone());
                }
                emit(
                    &self.events,
                    UtxoStreamEvent::Failed {
                        received: 0,
                        error: source,
                    },
                );
                return Err(e);
            }
        };

        emit(&self.events, UtxoStreamEvent::Started { from_height });

        let cancel = CancelToken::new();
        let delivery = Delivery {
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
            cancel: cancel.clone(),
            generation,
        };
        let handle = tokio::spawn(delivery.run(stream));
        *running = Some(RunningStream {
            cancel,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Cancel the running stream and return to `Idle`.
    ///
    /// Already inserted outputs are kept. No-op when nothing is running.
    pub async fn stop(&self) {
        let previous = self.running.lock().await.take();
        if let Some(previous) = previous {
            stop_running(previous).await;
        }
        let mut shared = self.shared.write();
        if shared.state == StreamState::Streaming {
            shared.state = StreamState::Idle;
        }
    }

    /// Wait for the current stream run to end and return its outcome
    pub async fn wait(&self) -> Result<StreamOutcome> {
        let handle = {
            let mut running = self.running.lock().await;
            running.as_mut().and_then(|r| r.handle.take())
        };
        match handle {
            Some(handle) => join(handle).await,
            None => Err(Error::InvalidRequest(
                "no UTXO stream is running".to_string(),
            )),
        }
    }

    /// Copy of the current set
    pub fn snapshot(&self) -> UtxoSet {
        self.shared.read().utxos.clone()
    }

    /// Current balances
    pub fn balance(&self) -> Balance {
        self.shared.read().utxos.balance()
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        self.shared.read().state
    }

    /// Error that put the consumer into `Failed`
    pub fn last_error(&self) -> Option<RpcError> {
        self.shared.read().last_error.clone()
    }

    /// Subscribe to stream events
    pub fn subscribe(&self) -> broadcast::Receiver<UtxoStreamEvent> {
        self.events.subscribe()
    }
}

impl Drop for UtxoStreamConsumer {
    fn drop(&mut self) {
        if let Ok(running) = self.running.try_lock() {
            if let Some(running) = running.as_ref() {
                running.cancel.cancel();
            }
        }
    }
}

async fn stop_running(running: RunningStream) {
    running.cancel.cancel();
    if let Some(handle) = running.handle {
        // Outcome belongs to whoever stopped it; only panics are worth surfacing
        if let Err(e) = handle.await {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
        }
    }
}

async fn join(handle: JoinHandle<Result<StreamOutcome>>) -> Result<StreamOutcome> {
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(Error::Cancelled),
    }
}

fn emit(events: &broadcast::Sender<UtxoStreamEvent>, event: UtxoStreamEvent) {
    log_event(&event);
    // No subscribers is fine
    let _ = events.send(event);
}

struct Delivery {
    shared: Arc<RwLock<Shared>>,
    events: broadcast::Sender<UtxoStreamEvent>,
    cancel: CancelToken,
    generation: u64,
}

enum Next {
    Item(Option<Result<Utxo>>),
    Cancelled,
}

impl Delivery {
    async fn run(self, mut stream: UtxoStream) -> Result<StreamOutcome> {
        let mut received = 0usize;
        let mut duplicates = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Next::Cancelled,
                item = stream.next() => Next::Item(item),
            };

            match next {
                Next::Cancelled => {
                    drop(stream);
                    self.with_current(|shared| {
                        shared.state = StreamState::Idle;
                        Some(UtxoStreamEvent::Cancelled { received })
                    });
                    return Ok(StreamOutcome::Cancelled { received });
                }
                Next::Item(Some(Ok(utxo))) => {
                    received += 1;
                    let current = self.with_current(|shared| {
                        if shared.utxos.insert(utxo.clone()) {
                            Some(UtxoStreamEvent::UtxoAdded(utxo))
                        } else {
                            duplicates += 1;
                            Some(UtxoStreamEvent::DuplicateSkipped {
                                output_id: utxo.output_id,
                            })
                        }
                    });
                    if !current {
                        return Ok(StreamOutcome::Cancelled { received });
                    }
                }
                Next::Item(Some(Err(e))) => {
                    drop(stream);
                    let source = e.to_rpc_error();
                    self.with_current(|shared| {
                        shared.state = StreamState::Failed;
                        shared.last_error = Some(source.clone());
                        Some(UtxoStreamEvent::Failed {
                            received,
                            error: source.clone(),
                        })
                    });
                    return Err(Error::StreamFailure { received, source });
                }
                Next::Item(None) => {
                    let mut outcome = StreamOutcome::Cancelled { received };
                    self.with_current(|shared| {
                        shared.state = StreamState::Idle;
                        let outputs = shared.utxos.len();
                        if outputs == 0 {
                            outcome = StreamOutcome::NoOutputsFound;
                            Some(UtxoStreamEvent::NoOutputsFound)
                        } else {
                            outcome = StreamOutcome::Completed {
                                outputs,
                                duplicates,
                            };
                            Some(UtxoStreamEvent::Completed {
                                outputs,
                                duplicates,
                            })
                        }
                    });
                    return Ok(outcome);
                }
            }
        }
    }

    /// Apply `update` and emit its event, unless a newer run has started.
    ///
    /// The lock is held across the emit so nothing from this run can follow
    /// the next run's `Started`.
    fn with_current(&self, update: impl FnOnce(&mut Shared) -> Option<UtxoStreamEvent>) -> bool {
        let mut shared = self.shared.write();
        if shared.generation != self.generation {
            return false;
        }
        if let Some(event) = update(&mut shared) {
            emit(&self.events, event);
        }
        true
    }
}
