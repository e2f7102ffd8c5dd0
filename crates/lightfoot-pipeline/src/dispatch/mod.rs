//! Dispatch layer: hands events to the worker pool and correlates replies.
//!
//! When no pool can be started (zero workers, or no async runtime at
//! construction) every event is classified in the caller's task instead.

mod pending;
mod pool;
mod wire;

pub use pending::PendingTable;
pub use pool::WorkerPool;
pub use wire::{UnitMessage, WireError, WireRequest, WireResponse};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::DispatchConfig;
use crate::events::Event;
use crate::feature::Feature;
use crate::processors::ProcessorRegistry;
use crate::Error;

/// Entry point for turning events into features.
pub struct EventDispatcher {
    registry: Arc<ProcessorRegistry>,
    pool: Option<WorkerPool>,
    request_timeout: Option<Duration>,
    warned_direct: AtomicBool,
}

impl EventDispatcher {
    /// Build a dispatcher, starting a pool sized from `config`.
    ///
    /// Replies from the pool are forwarded on the runtime active here. Once
    /// that runtime shuts down, pooled requests fail with
    /// [`Error::PoolFault`] instead of waiting for a reply.
    pub fn new(registry: ProcessorRegistry, config: &DispatchConfig) -> Self {
        let registry = Arc::new(registry);
        let size = config.pool_size();

        let pool = if size == 0 {
            info!("Worker pool disabled, classifying events in-process");
            None
        } else {
            match WorkerPool::start(size, registry.clone()) {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!(error = %err, "Worker pool unavailable, classifying events in-process");
                    None
                }
            }
        };

        Self {
            registry,
            pool,
            request_timeout: config.request_timeout,
            warned_direct: AtomicBool::new(false),
        }
    }

    /// Dispatcher that never uses a pool.
    pub fn direct(registry: ProcessorRegistry) -> Self {
        Self::new(registry, &DispatchConfig::direct())
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.as_ref().map(WorkerPool::size).unwrap_or(0)
    }

    pub fn pending_count(&self) -> usize {
        self.pool.as_ref().map(WorkerPool::pending_count).unwrap_or(0)
    }

    /// Classify one event.
    ///
    /// Resolves to the feature, `None` when the event is not a point of
    /// interest, or the classifier's error. Pool faults and timeouts are
    /// reported as [`Error::PoolFault`] and [`Error::Timeout`].
    pub async fn process(&self, event: Event) -> Result<Option<Feature>, Error> {
        match &self.pool {
            Some(pool) => pool.submit(event, self.request_timeout).await,
            None => {
                if !self.warned_direct.swap(true, Ordering::Relaxed) {
                    warn!("No worker pool, classifying events in-process");
                }
                process_direct(&self.registry, &event).await
            }
        }
    }

    /// Classify a batch concurrently. Results keep the input order.
    pub async fn process_many(&self, events: Vec<Event>) -> Vec<Result<Option<Feature>, Error>> {
        join_all(events.into_iter().map(|event| self.process(event))).await
    }

    /// Stop the pool, if any, and wait for its units to exit.
    pub fn shutdown(self) {
        if let Some(pool) = self.pool {
            pool.shutdown();
        }
    }
}

/// Classify `event` in the current task.
pub async fn process_direct(
    registry: &ProcessorRegistry,
    event: &Event,
) -> Result<Option<Feature>, Error> {
    let processor = registry.create_processor(event);
    processor.process(event).await
}
