//! # car-shell
//!
//! Command-line interface and interactive shell over a live, path-addressed
//! tree of vehicle telemetry attributes.
//!
//! **Key pieces:**
//! - **Attribute tree** - containers and typed leaves addressed like files (`/garage/<vin>/odometer`)
//! - **Freshness cache** - values younger than `max_age` are served without a backend call;
//!   concurrent stale reads of one node share a single refresh
//! - **Change bus** - ordered, timestamped change records fanned out to every subscriber,
//!   with a gap marker when a slow subscriber falls behind
//! - **Shell** - `cd`/`ls`/`cat`/`update` navigation with line editing
//! - **One-shot commands** - `get`, `set`, `list`, `save`, `events`
//!
//! Everything hangs off an explicitly constructed [`Context`]; there is no
//! process-wide state, so several sessions (or tests) can share one process.
//!
//! ## Optional Features
//!
//! - `completion` - Tab completion for commands and paths
//! - `history` - Command history with up/down arrow navigation
//!
//! The library provides a `#[derive(EnumValue)]` macro for enumeration leaves.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

// Lets the derive macro name `car_shell::...` from inside this crate too
extern crate self as car_shell;

// Re-export derive macro (same name as the trait, separate namespace)
pub use car_shell_macros::EnumValue;

// ============================================================================
// Module Declarations
// ============================================================================

pub mod backend;
pub mod bus;
pub mod cache;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod render;
pub mod response;
pub mod shell;
pub mod tree;

// ============================================================================
// Re-exports - Public API
// ============================================================================

pub use backend::{Backend, BackendError, FileBackend, MemoryBackend, Push};
pub use bus::{BusEvent, ChangeBus, ChangeRecord, Subscription};
pub use cache::{CachePolicy, FreshnessCache};
pub use config::{Config, ConfigError};
pub use context::Context;
pub use dispatch::{Command, dispatch};
pub use error::ShellError;
pub use io::CharIo;
pub use render::Format;
pub use response::Response;
pub use shell::{Shell, ShellState};
pub use tree::{
    AttributeNode, AttributeTree, ChangeKind, EnumValue, Mutation, NodePath, Path, Snapshot,
    Stamp, Value, ValueKind,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
