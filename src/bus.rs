//! Change bus: fan-out of committed mutations to `events` subscribers.
//!
//! Every mutation gets a sequence number and a wall-clock timestamp under a
//! single lock and is sent while that lock is held, so all subscribers see
//! records in the same order with non-decreasing timestamps.
//!
//! Each subscriber has a bounded buffer. A slow subscriber loses the oldest
//! records and is told how many it missed ([`BusEvent::Gap`]); publishers
//! never block.

use crate::tree::{ChangeKind, Mutation, NodePath, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// An observed mutation, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    /// Position in the global order (starts at 1)
    pub sequence: u64,
    /// When the mutation was published
    pub timestamp: DateTime<Utc>,
    /// Changed node
    pub path: NodePath,
    /// Change category
    pub kind: ChangeKind,
    /// Previous value (`None` for added nodes)
    pub old_value: Option<Value>,
    /// New value (`Absent` for removed nodes)
    pub new_value: Value,
}

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// Next record in order
    Record(ChangeRecord),
    /// Records dropped because the subscriber fell behind
    Gap {
        /// Number of records lost
        missed: u64,
    },
}

#[derive(Debug)]
struct Sequencer {
    next: u64,
    last: Option<DateTime<Utc>>,
}

struct Inner {
    sender: broadcast::Sender<ChangeRecord>,
    sequencer: Mutex<Sequencer>,
}

/// Shared publish side of the bus. Cheap to clone.
#[derive(Clone)]
pub struct ChangeBus {
    inner: Arc<Inner>,
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ChangeBus {
    /// Create a bus buffering up to `capacity` records per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                sender,
                sequencer: Mutex::new(Sequencer {
                    next: 1,
                    last: None,
                }),
            }),
        }
    }

    /// Stamp and deliver a mutation to all current subscribers.
    ///
    /// Never blocks on subscribers. Returns the record that was published.
    pub fn publish(&self, mutation: Mutation) -> ChangeRecord {
        let mut seq = self
            .inner
            .sequencer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let now = Utc::now();
        let timestamp = match seq.last {
            Some(last) if last > now => last,
            _ => now,
        };
        let record = ChangeRecord {
            sequence: seq.next,
            timestamp,
            path: mutation.path,
            kind: mutation.kind,
            old_value: mutation.old,
            new_value: mutation.new,
        };
        seq.next += 1;
        seq.last = Some(timestamp);

        log::trace!("publish #{} {:?} {}", record.sequence, record.kind, record.path);
        // No subscribers is fine
        let _ = self.inner.sender.send(record.clone());
        record
    }

    /// Register a subscriber. It only sees records published after this call.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }

    /// Sink adapter for tree mutations.
    pub fn sink(&self) -> impl FnMut(Mutation) + '_ {
        move |mutation| {
            self.publish(mutation);
        }
    }
}

/// Receive side of one subscriber. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeRecord>,
}

impl Subscription {
    /// Wait for the next event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        match self.receiver.recv().await {
            Ok(record) => Some(BusEvent::Record(record)),
            Err(RecvError::Lagged(missed)) => {
                log::debug!("subscriber lagged, {} records dropped", missed);
                Some(BusEvent::Gap { missed })
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        match self.receiver.try_recv() {
            Ok(record) => Some(BusEvent::Record(record)),
            Err(TryRecvError::Lagged(missed)) => Some(BusEvent::Gap { missed }),
            Err(TryRecvError::Empty | TryRecvError::Closed) => None,
        }
    }
}
