//! Test fixtures and utilities for car-shell testing.
//!
//! Provides:
//! - `MockIo`: Test implementation of CharIo trait
//! - `LockState`, `ClimatisationCommand`: enumeration leaf types
//! - `demo_garage()`: a two-vehicle garage tree
//! - Context builders over a `MemoryBackend`

#![allow(dead_code)]

use car_shell::tree::{LeafSnapshot, NodePath, Snapshot, Stamp, Value, ValueKind};
use car_shell::{AttributeTree, CharIo, Config, Context, EnumValue, MemoryBackend};
use std::sync::Arc;

// ============================================================================
// MockIo - Test I/O Implementation
// ============================================================================

/// Output capture for a shell under test.
#[derive(Debug, Default)]
pub struct MockIo {
    output: String,
}

impl MockIo {
    /// Create new MockIo with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured output.
    pub fn output(&self) -> String {
        self.output.clone()
    }

    /// Clear output buffer.
    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}

impl CharIo for MockIo {
    type Error = ();

    fn put_char(&mut self, c: char) -> Result<(), Self::Error> {
        self.output.push(c);
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.output.push_str(s);
        Ok(())
    }
}

// ============================================================================
// Enumeration leaves
// ============================================================================

/// Door lock state (read-only).
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumValue)]
pub enum LockState {
    Locked,
    Unlocked,
}

/// Climatisation command (settable).
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumValue)]
pub enum ClimatisationCommand {
    Start,
    Stop,
}

// ============================================================================
// Demo garage
// ============================================================================

pub const VIN1: &str = "/garage/VIN1";
pub const VIN2: &str = "/garage/VIN2";
pub const ODOMETER: &str = "/garage/VIN1/odometer";
pub const CLIMATISATION_COMMAND: &str = "/garage/VIN1/climatisation/command";
pub const TARGET_LEVEL: &str = "/garage/VIN1/charging/settings/target_level";

/// Read-only enumeration leaf.
pub fn enum_leaf<E: EnumValue>(variant: E) -> Snapshot {
    Snapshot::Leaf(LeafSnapshot {
        value: Value::from_enum(variant),
        kind: ValueKind::of::<E>(),
        settable: false,
    })
}

/// Settable enumeration leaf.
pub fn enum_setting<E: EnumValue>(variant: E) -> Snapshot {
    Snapshot::settable(Value::from_enum(variant), ValueKind::of::<E>())
}

/// Garage with two vehicles.
///
/// ```text
/// /garage
///   VIN1/
///     odometer = 12345
///     doors/lock_state = locked
///     climatisation/state = off
///     climatisation/command = stop            (settable)
///     charging/settings/target_level = 80     (settable)
///   VIN2/
///     odometer = 5210
///     doors/                                  (empty)
/// ```
pub fn demo_garage() -> Snapshot {
    Snapshot::container().with(
        "garage",
        Snapshot::container()
            .with(
                "VIN1",
                Snapshot::container()
                    .with("odometer", Snapshot::leaf(12345))
                    .with(
                        "doors",
                        Snapshot::container().with("lock_state", enum_leaf(LockState::Locked)),
                    )
                    .with(
                        "climatisation",
                        Snapshot::container()
                            .with("state", Snapshot::leaf("off"))
                            .with("command", enum_setting(ClimatisationCommand::Stop)),
                    )
                    .with(
                        "charging",
                        Snapshot::container().with(
                            "settings",
                            Snapshot::container().with(
                                "target_level",
                                Snapshot::settable(80, ValueKind::Integer),
                            ),
                        ),
                    ),
            )
            .with(
                "VIN2",
                Snapshot::container()
                    .with("odometer", Snapshot::leaf(5210))
                    .with("doors", Snapshot::container()),
            ),
    )
}

/// Parse an absolute path.
pub fn at(path: &str) -> NodePath {
    NodePath::parse_absolute(path).unwrap()
}

/// Backend serving the demo garage.
pub fn demo_backend() -> Arc<MemoryBackend> {
    Arc::new(MemoryBackend::new(demo_garage()))
}

/// Context whose tree already holds the demo garage, refreshed just now.
pub fn demo_context(config: &Config) -> (Arc<MemoryBackend>, Context<MemoryBackend>) {
    let backend = demo_backend();
    let ctx = Context::with_tree(
        Arc::clone(&backend),
        AttributeTree::from_snapshot(demo_garage(), Some(Stamp::now())),
        config,
    );
    (backend, ctx)
}

/// Context whose tree mirrors the demo garage but was never refreshed.
pub fn stale_context(config: &Config) -> (Arc<MemoryBackend>, Context<MemoryBackend>) {
    let backend = demo_backend();
    let ctx = Context::with_tree(
        Arc::clone(&backend),
        AttributeTree::from_snapshot(demo_garage(), None),
        config,
    );
    (backend, ctx)
}
