//! Explicitly constructed owner of the shared state: tree, cache, bus and
//! backend. Every session and one-shot command borrows one `Context`.

use crate::backend::{Backend, Push};
use crate::bus::ChangeBus;
use crate::cache::{CachePolicy, FreshnessCache};
use crate::config::Config;
use crate::error::ShellError;
use crate::tree::resolve::resolve;
use crate::tree::{AttributeNode, AttributeTree, NodePath, Stamp};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shared state of one shell/CLI instance.
pub struct Context<B> {
    tree: Arc<AttributeTree>,
    bus: ChangeBus,
    cache: FreshnessCache<B>,
    policy: CachePolicy,
}

impl<B> Clone for Context<B> {
    fn clone(&self) -> Self {
        Self {
            tree: Arc::clone(&self.tree),
            bus: self.bus.clone(),
            cache: self.cache.clone(),
            policy: self.policy,
        }
    }
}

impl<B> fmt::Debug for Context<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("policy", &self.policy)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Context<B> {
    /// Context with an empty tree. Call [`sync_topology`](Self::sync_topology)
    /// to populate it.
    pub fn new(backend: Arc<B>, config: &Config) -> Self {
        Self::with_tree(backend, AttributeTree::new(), config)
    }

    /// Context over an already populated tree.
    pub fn with_tree(backend: Arc<B>, tree: AttributeTree, config: &Config) -> Self {
        let tree = Arc::new(tree);
        let bus = ChangeBus::new(config.event_buffer);
        let cache = FreshnessCache::new(
            backend,
            Arc::clone(&tree),
            bus.clone(),
            config.backend_timeout(),
        );
        Self {
            tree,
            bus,
            cache,
            policy: CachePolicy::from_config(config),
        }
    }

    /// The attribute tree.
    pub fn tree(&self) -> &Arc<AttributeTree> {
        &self.tree
    }

    /// The change bus.
    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// The freshness cache.
    pub fn cache(&self) -> &FreshnessCache<B> {
        &self.cache
    }

    /// The backend.
    pub fn backend(&self) -> &Arc<B> {
        self.cache.backend()
    }

    /// Configured read policy.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Resolve a user path against `cwd`.
    pub fn resolve(&self, input: &str, cwd: &NodePath) -> Result<Arc<AttributeNode>, ShellError> {
        resolve(&self.tree, input, cwd)
    }

    /// Force-refresh the whole tree (startup, `update /`).
    pub async fn sync_topology(&self) -> Result<(), ShellError> {
        self.cache.refresh(self.tree.root()).await.map(|_| ())
    }

    /// Apply one backend push to the tree, publishing the resulting changes.
    pub fn apply_push(&self, push: Push) {
        log::debug!("push for {}", push.path);
        if let Err(err) = self
            .tree
            .apply(&push.path, push.snapshot, Stamp::now(), &mut self.bus.sink())
        {
            log::warn!("dropping push: {}", err);
        }
    }

    /// Consume backend pushes until the channel closes.
    ///
    /// This task is the single consumer of the channel; pushes are applied in
    /// the order they were sent.
    pub fn attach_pushes(&self, mut pushes: mpsc::Receiver<Push>) -> JoinHandle<()> {
        let ctx = self.clone();
        tokio::spawn(async move {
            while let Some(push) = pushes.recv().await {
                ctx.apply_push(push);
            }
            log::debug!("push channel closed");
        })
    }

    /// Force-refresh the whole tree every `period` until the task is aborted.
    ///
    /// Failed polls are logged and retried on the next tick; the tree keeps
    /// its stale values in between.
    pub fn spawn_poller(&self, period: Duration) -> JoinHandle<()> {
        let ctx = self.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately
            ticks.tick().await;
            loop {
                ticks.tick().await;
                if let Err(err) = ctx.sync_topology().await {
                    log::warn!("poll failed: {}", err);
                }
            }
        })
    }
}
