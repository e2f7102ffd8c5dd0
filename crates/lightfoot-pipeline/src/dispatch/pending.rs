//! Outstanding requests of one execution unit, keyed by correlation token.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dispatch::wire::{UnitMessage, WireResponse};
use crate::feature::Feature;
use crate::Error;

pub type Completion = oneshot::Sender<Result<Option<Feature>, Error>>;

struct PendingEntry {
    event_id: String,
    seq: u64,
    completion: Completion,
}

/// Tracks requests a unit has accepted but not yet answered.
///
/// Every entry leaves the table exactly once: resolved by a response,
/// rejected by a fault, or forgotten by its caller. Once closed, nothing
/// can answer new entries, so callers must check [`PendingTable::is_closed`]
/// before inserting.
pub struct PendingTable {
    unit: usize,
    entries: HashMap<Uuid, PendingEntry>,
    next_seq: u64,
    closed: bool,
}

impl PendingTable {
    pub fn new(unit: usize) -> Self {
        Self {
            unit,
            entries: HashMap::new(),
            next_seq: 0,
            closed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, token: &Uuid) -> bool {
        self.entries.contains_key(token)
    }

    pub fn insert(&mut self, token: Uuid, event_id: impl Into<String>, completion: Completion) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            token,
            PendingEntry {
                event_id: event_id.into(),
                seq,
                completion,
            },
        );
    }

    /// Drop an entry without completing it. Returns whether it was present.
    pub fn forget(&mut self, token: &Uuid) -> bool {
        self.entries.remove(token).is_some()
    }

    /// Complete the request named by `response`. Unknown tokens are ignored.
    pub fn resolve(&mut self, response: WireResponse) -> bool {
        let Some(entry) = self.entries.remove(&response.token) else {
            debug!(
                unit = self.unit,
                token = %response.token,
                "Ignoring response for unknown token"
            );
            return false;
        };
        let outcome = response.into_outcome(&entry.event_id);
        // The caller may have given up already.
        let _ = entry.completion.send(outcome);
        true
    }

    /// Fail one request with a pool fault.
    pub fn reject(&mut self, token: &Uuid, reason: &str) -> bool {
        match self.entries.remove(token) {
            Some(entry) => {
                complete_with_fault(entry, reason);
                true
            }
            None => false,
        }
    }

    /// Fail the most recently dispatched request that is still pending.
    ///
    /// Used for faults that do not name a token; any other requests on the
    /// unit keep waiting.
    pub fn reject_most_recent(&mut self, reason: &str) -> Option<Uuid> {
        let token = self
            .entries
            .iter()
            .max_by_key(|(_, entry)| entry.seq)
            .map(|(token, _)| *token)?;
        self.reject(&token, reason);
        Some(token)
    }

    /// Fail every outstanding request. Returns how many were failed.
    pub fn reject_all(&mut self, reason: &str) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            complete_with_fault(entry, reason);
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop accepting work and fail everything outstanding.
    pub fn close(&mut self, reason: &str) -> usize {
        self.closed = true;
        self.reject_all(reason)
    }

    /// Apply one message from the unit.
    pub fn handle(&mut self, message: UnitMessage) {
        match message {
            UnitMessage::Response(response) => {
                self.resolve(response);
            }
            UnitMessage::Fault {
                token: Some(token),
                reason,
            } => {
                if !self.reject(&token, &reason) {
                    debug!(unit = self.unit, token = %token, "Fault for unknown token");
                }
            }
            UnitMessage::Fault {
                token: None,
                reason,
            } => match self.reject_most_recent(&reason) {
                Some(token) => warn!(
                    unit = self.unit,
                    token = %token,
                    reason = %reason,
                    "Unattributed unit fault, failing most recent request"
                ),
                None => warn!(
                    unit = self.unit,
                    reason = %reason,
                    "Unit fault with nothing pending"
                ),
            },
        }
    }
}

fn complete_with_fault(entry: PendingEntry, reason: &str) {
    let _ = entry.completion.send(Err(Error::PoolFault {
        event_id: entry.event_id,
        reason: reason.to_string(),
    }));
}
