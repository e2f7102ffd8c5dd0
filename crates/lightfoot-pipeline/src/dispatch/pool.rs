//! Fixed set of execution units, each an OS thread running classifiers.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatch::pending::PendingTable;
use crate::dispatch::wire::{UnitMessage, WireRequest, WireResponse};
use crate::events::Event;
use crate::feature::Feature;
use crate::processors::ProcessorRegistry;
use crate::Error;

/// A pool of isolated execution units.
///
/// Each unit owns a thread with its own single-threaded runtime and handles
/// one request at a time, in arrival order. Replies travel back over a
/// channel to a per-unit task on the caller's runtime, which completes the
/// matching pending request.
pub struct WorkerPool {
    units: Vec<Unit>,
    cursor: AtomicUsize,
}

struct Unit {
    index: usize,
    requests: mpsc::UnboundedSender<WireRequest>,
    pending: Arc<Mutex<PendingTable>>,
    thread: JoinHandle<()>,
}

impl WorkerPool {
    /// Start `size` units. Must be called from within a tokio runtime.
    pub fn start(size: usize, registry: Arc<ProcessorRegistry>) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::PoolUnavailable("pool size is zero".to_string()));
        }
        let runtime = Handle::try_current()
            .map_err(|err| Error::PoolUnavailable(format!("no async runtime: {err}")))?;

        let mut units = Vec::with_capacity(size);
        for index in 0..size {
            units.push(Unit::spawn(index, registry.clone(), &runtime)?);
        }

        info!(units = size, "Worker pool started");
        Ok(Self {
            units,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn size(&self) -> usize {
        self.units.len()
    }

    /// Requests accepted by units and not yet completed.
    pub fn pending_count(&self) -> usize {
        self.units
            .iter()
            .map(|unit| unit.pending.lock().map(|table| table.len()).unwrap_or(0))
            .sum()
    }

    /// Index of the unit that takes the next request.
    pub(crate) fn next_index(&self) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % self.units.len()
    }

    /// Send `event` to the next unit and wait for its answer.
    pub async fn submit(
        &self,
        event: Event,
        timeout: Option<Duration>,
    ) -> Result<Option<Feature>, Error> {
        let unit = &self.units[self.next_index()];
        let token = Uuid::new_v4();
        let event_id = event.id.clone();
        let (tx, rx) = oneshot::channel();

        {
            let mut table = unit.pending.lock().map_err(|_| Error::MutexPoisoned)?;
            if table.is_closed() {
                return Err(Error::PoolFault {
                    event_id,
                    reason: format!("execution unit {} has no reply forwarder", unit.index),
                });
            }
            table.insert(token, event_id.clone(), tx);
        }
        let _guard = ForgetOnDrop {
            pending: &unit.pending,
            token,
        };

        debug!(unit = unit.index, token = %token, event_id = %event_id, "Dispatching event");
        if unit.requests.send(WireRequest { token, event }).is_err() {
            return Err(Error::PoolFault {
                event_id,
                reason: format!("execution unit {} is not running", unit.index),
            });
        }

        let received = match timeout.filter(|after| !after.is_zero()) {
            Some(after) => match tokio::time::timeout(after, rx).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(unit = unit.index, event_id = %event_id, ?after, "Event timed out");
                    return Err(Error::Timeout { event_id, after });
                }
            },
            None => rx.await,
        };

        received.unwrap_or_else(|_| {
            Err(Error::PoolFault {
                event_id,
                reason: "response channel closed".to_string(),
            })
        })
    }

    /// Stop every unit and wait for its thread to exit.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for unit in self.units.drain(..) {
            unit.stop();
        }
    }
}

impl Unit {
    fn spawn(
        index: usize,
        registry: Arc<ProcessorRegistry>,
        runtime: &Handle,
    ) -> Result<Self, Error> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(PendingTable::new(index)));

        let thread = thread::Builder::new()
            .name(format!("lightfoot-unit-{index}"))
            .spawn(move || run_unit(index, registry, request_rx, message_tx))
            .map_err(|err| {
                Error::PoolUnavailable(format!("failed to spawn execution unit {index}: {err}"))
            })?;

        let closer = CloseOnExit {
            index,
            pending: pending.clone(),
        };
        runtime.spawn(forward_messages(message_rx, closer));

        Ok(Self {
            index,
            requests: request_tx,
            pending,
            thread,
        })
    }

    fn stop(self) {
        let Unit {
            index,
            requests,
            thread,
            ..
        } = self;
        drop(requests);
        if thread.join().is_err() {
            warn!(unit = index, "Execution unit exited abnormally");
        } else {
            debug!(unit = index, "Execution unit stopped");
        }
    }
}

/// Removes the pending entry however the caller leaves `submit`.
struct ForgetOnDrop<'a> {
    pending: &'a Mutex<PendingTable>,
    token: Uuid,
}

impl Drop for ForgetOnDrop<'_> {
    fn drop(&mut self) {
        if let Ok(mut table) = self.pending.lock() {
            table.forget(&self.token);
        }
    }
}

/// Closes a unit's pending table when its forwarding task ends.
///
/// Owned by the task's future, so it also fires when the runtime the task
/// was spawned on shuts down before the task ever ran.
struct CloseOnExit {
    index: usize,
    pending: Arc<Mutex<PendingTable>>,
}

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        if let Ok(mut table) = self.pending.lock() {
            let failed = table.close("execution unit stopped");
            if failed > 0 {
                warn!(
                    unit = self.index,
                    failed, "Execution unit stopped with requests outstanding"
                );
            }
        }
    }
}

/// Apply unit messages to the pending table until the unit goes away.
async fn forward_messages(
    mut messages: mpsc::UnboundedReceiver<UnitMessage>,
    closer: CloseOnExit,
) {
    while let Some(message) = messages.recv().await {
        match closer.pending.lock() {
            Ok(mut table) => table.handle(message),
            Err(_) => {
                error!(unit = closer.index, "Pending table poisoned");
                return;
            }
        }
    }
}

fn unit_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
}

fn run_unit(
    index: usize,
    registry: Arc<ProcessorRegistry>,
    mut requests: mpsc::UnboundedReceiver<WireRequest>,
    messages: mpsc::UnboundedSender<UnitMessage>,
) {
    let mut runtime = match unit_runtime() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(unit = index, error = %err, "Failed to build unit runtime");
            let _ = messages.send(UnitMessage::Fault {
                token: None,
                reason: format!("unit runtime unavailable: {err}"),
            });
            return;
        }
    };
    debug!(unit = index, "Execution unit started");

    while let Some(WireRequest { token, event }) = requests.blocking_recv() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let processor = registry.create_processor(&event);
            runtime.block_on(processor.process(&event))
        }));

        let message = match outcome {
            Ok(outcome) => UnitMessage::Response(WireResponse::from_outcome(token, outcome)),
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                error!(
                    unit = index,
                    token = %token,
                    event_id = %event.id,
                    reason = %reason,
                    "Classifier panicked"
                );
                // Start over on a clean runtime.
                match unit_runtime() {
                    Ok(fresh) => runtime = fresh,
                    Err(err) => {
                        error!(unit = index, error = %err, "Failed to rebuild unit runtime");
                        let _ = messages.send(UnitMessage::Fault {
                            token: Some(token),
                            reason,
                        });
                        return;
                    }
                }
                UnitMessage::Fault {
                    token: Some(token),
                    reason,
                }
            }
        };

        if messages.send(message).is_err() {
            break;
        }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("classifier panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("classifier panicked: {message}")
    } else {
        "classifier panicked".to_string()
    }
}
