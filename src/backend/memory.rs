//! Scriptable in-memory backend.
//!
//! Holds a [`Snapshot`] of the whole garage and serves fetches from it. Tests
//! and demos script it: change values behind the shell's back, inject
//! failures or latency, count calls, and push updates.

use super::{Backend, BackendError, Push};
use crate::tree::{NodePath, Snapshot, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// In-memory backend.
#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<Snapshot>,
    latency: Mutex<Duration>,
    failure: Mutex<Option<BackendError>>,
    pushes: Mutex<Option<mpsc::Sender<Push>>>,
    fetches: AtomicUsize,
    updates: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryBackend {
    /// Backend serving `snapshot` as the root.
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            latency: Mutex::new(Duration::ZERO),
            failure: Mutex::new(None),
            pushes: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    /// Change a leaf value without telling anyone. Returns false if there is
    /// no leaf at `path`.
    pub fn set_value(&self, path: &NodePath, value: impl Into<Value>) -> bool {
        match lock(&self.state).get_mut(path) {
            Some(Snapshot::Leaf(leaf)) => {
                leaf.value = value.into();
                true
            }
            _ => false,
        }
    }

    /// Insert or replace a subtree.
    pub fn insert(&self, path: &NodePath, snapshot: Snapshot) -> bool {
        lock(&self.state).insert(path, snapshot)
    }

    /// Remove a subtree.
    pub fn remove(&self, path: &NodePath) -> Option<Snapshot> {
        lock(&self.state).remove(path)
    }

    /// Current backend-side state of a subtree.
    pub fn snapshot(&self, path: &NodePath) -> Option<Snapshot> {
        lock(&self.state).get(path).cloned()
    }

    /// Make every following call fail with `err` until [`recover`](Self::recover).
    pub fn fail_with(&self, err: BackendError) {
        *lock(&self.failure) = Some(err);
    }

    /// Stop failing.
    pub fn recover(&self) {
        *lock(&self.failure) = None;
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// Number of `fetch` calls so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `update` calls so far.
    pub fn update_calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Reset both call counters.
    pub fn reset_calls(&self) {
        self.fetches.store(0, Ordering::SeqCst);
        self.updates.store(0, Ordering::SeqCst);
    }

    /// Open the push channel. Replaces any previous one.
    pub fn push_channel(&self, capacity: usize) -> mpsc::Receiver<Push> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        *lock(&self.pushes) = Some(tx);
        rx
    }

    /// Push the current state of `path` to the push channel.
    pub async fn announce(&self, path: &NodePath) -> Result<(), BackendError> {
        let snapshot = self.snapshot(path).ok_or(BackendError::NotFound)?;
        let sender = lock(&self.pushes)
            .clone()
            .ok_or_else(|| BackendError::Unavailable("push channel not open".into()))?;
        sender
            .send(Push {
                path: path.clone(),
                snapshot,
            })
            .await
            .map_err(|_| BackendError::Unavailable("push channel closed".into()))
    }

    async fn simulate_call(&self) -> Result<(), BackendError> {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match lock(&self.failure).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Backend for MemoryBackend {
    async fn fetch(&self, path: &NodePath) -> Result<Snapshot, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await?;
        self.snapshot(path).ok_or(BackendError::NotFound)
    }

    async fn update(&self, path: &NodePath, value: &Value) -> Result<(), BackendError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await?;
        match lock(&self.state).get_mut(path) {
            Some(Snapshot::Leaf(leaf)) if leaf.settable => {
                leaf.value = value.clone();
                Ok(())
            }
            Some(Snapshot::Leaf(_)) => Err(BackendError::Rejected("read-only".into())),
            _ => Err(BackendError::NotFound),
        }
    }
}
