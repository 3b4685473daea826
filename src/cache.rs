//! Freshness cache: decides when a cached value may be served and when the
//! backend must be asked first.
//!
//! A read within `max_age` of the node's last successful refresh is answered
//! from the tree without touching the backend. Otherwise one refresh of the
//! node's subtree is started; concurrent readers of the same node join it and
//! all receive the identical outcome.
//!
//! Failed or timed out refreshes leave the cached value and its timestamp
//! untouched.

use crate::backend::{Backend, BackendError};
use crate::bus::ChangeBus;
use crate::config::Config;
use crate::error::ShellError;
use crate::tree::{AttributeNode, AttributeTree, Stamp, Value, ValueKind};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Result of one backend refresh, shared by every joined caller.
type Outcome = Option<Result<Value, ShellError>>;

/// Per-node single-flight slot.
///
/// Holds a receiver for the refresh currently in flight, if any. The refresh
/// task clears the slot before publishing its outcome.
#[derive(Debug, Default)]
pub(crate) struct FlightSlot(Mutex<Option<watch::Receiver<Outcome>>>);

impl FlightSlot {
    fn lock(&self) -> MutexGuard<'_, Option<watch::Receiver<Outcome>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear(&self) {
        *self.lock() = None;
    }
}

/// How fresh a read must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Longest time since the last refresh at which the cached value is served
    pub max_age: Duration,
    /// Always refresh (`no_cache` mode, explicit `update`)
    pub force_refresh: bool,
}

impl CachePolicy {
    /// Serve values younger than `max_age` from cache.
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            force_refresh: false,
        }
    }

    /// Refresh on every read.
    pub fn no_cache() -> Self {
        Self {
            max_age: Duration::ZERO,
            force_refresh: true,
        }
    }

    /// Policy described by the configuration.
    pub fn from_config(config: &Config) -> Self {
        if config.no_cache {
            Self::no_cache()
        } else {
            Self::new(config.max_age())
        }
    }

    /// Same policy with refresh forced.
    pub fn forced(self) -> Self {
        Self {
            force_refresh: true,
            ..self
        }
    }

    /// Whether a value refreshed at `updated` may be served at `now`.
    pub fn is_fresh(&self, updated: Option<Stamp>, now: Instant) -> bool {
        !self.force_refresh
            && updated.is_some_and(|stamp| now.saturating_duration_since(stamp.at) <= self.max_age)
    }
}

/// Cache front of a backend.
pub struct FreshnessCache<B> {
    backend: Arc<B>,
    tree: Arc<AttributeTree>,
    bus: ChangeBus,
    timeout: Duration,
}

impl<B> Clone for FreshnessCache<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            tree: Arc::clone(&self.tree),
            bus: self.bus.clone(),
            timeout: self.timeout,
        }
    }
}

impl<B> fmt::Debug for FreshnessCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreshnessCache")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> FreshnessCache<B> {
    /// Cache over `tree`, refreshing from `backend` and publishing on `bus`.
    pub fn new(backend: Arc<B>, tree: Arc<AttributeTree>, bus: ChangeBus, timeout: Duration) -> Self {
        Self {
            backend,
            tree,
            bus,
            timeout,
        }
    }

    /// Backend behind the cache.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Current value of `node`, refreshed first if `policy` requires it.
    pub async fn ensure_fresh(
        &self,
        node: &Arc<AttributeNode>,
        policy: CachePolicy,
    ) -> Result<Value, ShellError> {
        let (value, updated) = node.read();
        if policy.is_fresh(updated, Instant::now()) {
            log::debug!("cache hit for {}", node.path());
            return Ok(value);
        }
        log::debug!("cache miss for {}", node.path());
        self.refresh(node).await
    }

    /// Refresh `node`'s subtree from the backend, joining a refresh that is
    /// already in flight for the same node.
    pub async fn refresh(&self, node: &Arc<AttributeNode>) -> Result<Value, ShellError> {
        let mut flight = self.join_or_start(node);
        let outcome = match flight.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| {
            Err(ShellError::BackendUnavailable {
                path: node.path().to_string(),
                reason: "refresh was abandoned".into(),
            })
        })
    }

    fn join_or_start(&self, node: &Arc<AttributeNode>) -> watch::Receiver<Outcome> {
        let mut slot = node.flight.lock();
        if let Some(flight) = slot.as_ref()
            && flight.has_changed().is_ok()
        {
            log::debug!("joining refresh in flight for {}", node.path());
            return flight.clone();
        }

        let (tx, rx) = watch::channel(None);
        *slot = Some(rx.clone());
        drop(slot);

        // Detached: waiters are released even if the starting caller is dropped
        let cache = self.clone();
        let node = Arc::clone(node);
        tokio::spawn(async move {
            let result = cache.fetch_and_merge(&node).await;
            node.flight.clear();
            let _ = tx.send(Some(result));
        });
        rx
    }

    async fn fetch_and_merge(&self, node: &Arc<AttributeNode>) -> Result<Value, ShellError> {
        let path = node.path().clone();
        log::info!("refreshing {}", path);

        let snapshot = match tokio::time::timeout(self.timeout, self.backend.fetch(&path)).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(BackendError::NotFound)) => {
                log::info!("{} no longer exists", path);
                self.tree.remove(&path, &mut self.bus.sink());
                return Err(ShellError::PathNotFound(path.to_string()));
            }
            Ok(Err(err)) => {
                log::warn!("refresh of {} failed: {}", path, err);
                return Err(ShellError::BackendUnavailable {
                    path: path.to_string(),
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                log::warn!("refresh of {} timed out after {:?}", path, self.timeout);
                return Err(ShellError::BackendTimeout {
                    path: path.to_string(),
                    after: self.timeout,
                });
            }
        };

        self.tree
            .apply_to(node, snapshot, Stamp::now(), &mut self.bus.sink());

        // Re-resolve: a shape change may have replaced the node, and a push
        // or another refresh may have removed it while the fetch was out
        match self.tree.get(&path) {
            Some(current) if current.is_attached() => Ok(current.current_value()),
            _ => {
                log::info!("{} was removed while refreshing", path);
                Err(ShellError::PathNotFound(path.to_string()))
            }
        }
    }

    /// Write a new value for a settable leaf.
    ///
    /// The raw input is validated against the leaf's kind, forwarded to the
    /// backend, and committed (and published) only once the backend accepts
    /// it. The change record is on the bus before this returns.
    pub async fn set(&self, node: &Arc<AttributeNode>, raw: &str) -> Result<Value, ShellError> {
        let path = node.path().to_string();
        if !node.is_leaf() || !node.is_settable() {
            return Err(ShellError::NotSettable(path));
        }

        let kind = node.value_kind().unwrap_or(ValueKind::Text);
        let value = kind
            .parse(raw)
            .map_err(|reason| ShellError::Validation {
                path: path.clone(),
                reason,
            })?;

        log::info!("setting {} to {}", path, value);
        match tokio::time::timeout(self.timeout, self.backend.update(node.path(), &value)).await {
            Ok(Ok(())) => {
                if node.commit(value.clone(), Stamp::now(), &mut self.bus.sink()) {
                    Ok(value)
                } else {
                    log::info!("{} was removed while setting", path);
                    Err(ShellError::PathNotFound(path))
                }
            }
            Ok(Err(BackendError::Rejected(reason))) => Err(ShellError::Validation { path, reason }),
            Ok(Err(BackendError::NotFound)) => Err(ShellError::PathNotFound(path)),
            Ok(Err(err)) => Err(ShellError::BackendUnavailable {
                path,
                reason: err.to_string(),
            }),
            Err(_) => Err(ShellError::BackendTimeout {
                path,
                after: self.timeout,
            }),
        }
    }
}
