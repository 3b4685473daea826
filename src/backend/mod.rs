//! Connectivity backend abstraction.
//!
//! A backend is the authoritative source of vehicle data. The shell only
//! talks to it through [`Backend`]: fetch a fresh snapshot of a subtree, or
//! ask it to apply a new leaf value. Backends may additionally push
//! unsolicited snapshots through a channel ([`Push`]), which the context
//! pumps into the tree.

use crate::tree::{NodePath, Snapshot, Value};
use std::future::Future;

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Backend call failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Backend could not be reached or failed internally
    #[error("{0}")]
    Unavailable(String),

    /// Backend refused the value (out of range, vehicle offline, ...)
    #[error("{0}")]
    Rejected(String),

    /// Backend has no object at this path
    #[error("no such object")]
    NotFound,
}

/// Source of vehicle data.
///
/// Implementations must be safe to call concurrently; the cache guarantees at
/// most one in-flight `fetch` per node, but different nodes may be fetched in
/// parallel.
pub trait Backend: Send + Sync + 'static {
    /// Fetch a snapshot of the subtree rooted at `path`.
    fn fetch(&self, path: &NodePath) -> impl Future<Output = Result<Snapshot, BackendError>> + Send;

    /// Apply a new value to the leaf at `path`.
    ///
    /// On `Ok` the backend has accepted the value; the caller commits it to
    /// the tree.
    fn update(
        &self,
        path: &NodePath,
        value: &Value,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Unsolicited update pushed by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Push {
    /// Subtree the snapshot describes
    pub path: NodePath,
    /// New state of that subtree
    pub snapshot: Snapshot,
}
