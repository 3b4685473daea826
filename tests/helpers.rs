//! Shared test helpers to reduce duplication across integration tests.

#![allow(dead_code)]

#[allow(clippy::duplicate_mod)]
#[path = "fixtures/mod.rs"]
pub mod fixtures;

use car_shell::bus::{BusEvent, ChangeRecord, Subscription};
use car_shell::{Context, MemoryBackend, Shell};
use fixtures::MockIo;
use std::time::Duration;

pub type TestShell<'ctx> = Shell<'ctx, MemoryBackend, MockIo>;

// ============================================================================
// Shell Creation Helpers
// ============================================================================

/// Create an activated shell with the welcome output already cleared.
pub fn create_test_shell(ctx: &Context<MemoryBackend>) -> TestShell<'_> {
    let mut shell = Shell::new(ctx, MockIo::new());
    shell.activate().unwrap();
    shell.io_mut().clear_output();
    shell
}

// ============================================================================
// Keystroke Helpers
// ============================================================================

/// Type a command, press Enter and return everything the shell printed.
pub async fn execute_command(shell: &mut TestShell<'_>, cmd: &str) -> String {
    shell.io_mut().clear_output();
    type_input(shell, cmd).await;
    if !cmd.ends_with('\r') {
        press_enter(shell).await;
    }
    shell.io().output()
}

/// Type input without executing.
pub async fn type_input(shell: &mut TestShell<'_>, input: &str) {
    for c in input.chars() {
        shell.process_char(c).await.unwrap();
    }
}

pub async fn press_enter(shell: &mut TestShell<'_>) {
    shell.process_char('\r').await.unwrap();
}

pub async fn press_tab(shell: &mut TestShell<'_>) {
    shell.process_char('\t').await.unwrap();
}

pub async fn press_backspace(shell: &mut TestShell<'_>) {
    shell.process_char('\x7f').await.unwrap();
}

pub async fn press_up(shell: &mut TestShell<'_>) {
    type_input(shell, "\x1b[A").await;
}

pub async fn press_down(shell: &mut TestShell<'_>) {
    type_input(shell, "\x1b[B").await;
}

pub async fn press_double_esc(shell: &mut TestShell<'_>) {
    type_input(shell, "\x1b\x1b").await;
}

// ============================================================================
// Change Bus Helpers
// ============================================================================

/// Next record on the subscription; panics on a gap or after one second.
pub async fn next_record(subscription: &mut Subscription) -> ChangeRecord {
    match tokio::time::timeout(Duration::from_secs(1), subscription.recv()).await {
        Ok(Some(BusEvent::Record(record))) => record,
        other => panic!("expected a change record, got {:?}", other),
    }
}

/// Everything already buffered on the subscription.
pub fn drain(subscription: &mut Subscription) -> Vec<BusEvent> {
    std::iter::from_fn(|| subscription.try_recv()).collect()
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that output ends with the given prompt.
pub fn assert_prompt(output: &str, prompt: &str) {
    assert!(
        output.ends_with(prompt),
        "Expected output to end with prompt {:?}, got: {:?}",
        prompt,
        output
    );
}

/// Assert that output contains an ANSI escape sequence.
pub fn assert_contains_ansi(output: &str, sequence: &str) {
    assert!(
        output.contains(sequence),
        "Expected ANSI sequence '{}' in output, got: {:?}",
        sequence.escape_default(),
        output
    );
}

/// Assert that output contains all expected strings.
pub fn assert_contains_all(output: &str, expected: &[&str]) {
    for exp in expected {
        assert!(
            output.contains(exp),
            "Expected '{}' in output, got: {}",
            exp,
            output
        );
    }
}

/// Assert that output does NOT contain any of the strings.
pub fn assert_contains_none(output: &str, forbidden: &[&str]) {
    for forbid in forbidden {
        assert!(
            !output.contains(forbid),
            "Did not expect '{}' in output, got: {}",
            forbid,
            output
        );
    }
}
