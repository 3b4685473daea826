//! Shell command tests: navigation, reading values, `update`, and error
//! reporting, driven keystroke by keystroke through `MockIo`.

#[allow(clippy::duplicate_mod)]
#[path = "helpers.rs"]
mod helpers;

use car_shell::{BackendError, Config, Shell, ShellState, Value};
use helpers::fixtures::{MockIo, ODOMETER, VIN2, at, demo_context, stale_context};
use helpers::{
    assert_contains_all, assert_contains_none, assert_prompt, create_test_shell, execute_command,
};

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_welcome_and_first_prompt() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = Shell::new(&ctx, MockIo::new());
    assert_eq!(shell.state(), ShellState::Inactive);

    shell.activate().unwrap();
    assert_eq!(shell.state(), ShellState::Active);
    assert_eq!(shell.io().output(), "Welcome! Type ? to list commands\r\nccs:/$ ");
}

#[tokio::test]
async fn test_exit_aliases() {
    let (_backend, ctx) = demo_context(&Config::default());
    for command in ["exit", "x", "q"] {
        let mut shell = create_test_shell(&ctx);
        let output = execute_command(&mut shell, command).await;
        assert!(output.ends_with("\r\nBye\r\n"), "{}: {:?}", command, output);
        assert!(shell.is_terminated());

        // Input after exit is ignored
        let output = execute_command(&mut shell, "pwd").await;
        assert!(output.is_empty());
    }
}

#[tokio::test]
async fn test_empty_line_just_prompts_again() {
    let (backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);
    let output = execute_command(&mut shell, "").await;
    assert_eq!(output, "\r\nccs:/$ ");
    assert_eq!(backend.fetch_calls(), 0);
}

// ============================================================================
// Navigation
// ============================================================================

#[tokio::test]
async fn test_cd_changes_prompt() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);

    let output = execute_command(&mut shell, "cd garage/VIN1").await;
    assert_prompt(&output, "ccs:/garage/VIN1$ ");

    let output = execute_command(&mut shell, "cd ../VIN2/doors").await;
    assert_prompt(&output, "ccs:/garage/VIN2/doors$ ");

    let output = execute_command(&mut shell, "cd").await;
    assert_prompt(&output, "ccs:/$ ");
    assert!(shell.cwd().is_root());
}

#[tokio::test]
async fn test_cd_errors_keep_cwd() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);
    execute_command(&mut shell, "cd /garage/VIN1").await;

    let output = execute_command(&mut shell, "cd VIN9").await;
    assert_contains_all(&output, &["*** VIN9 does not exist or is not accessible\r\n"]);
    assert_prompt(&output, "ccs:/garage/VIN1$ ");

    let output = execute_command(&mut shell, "cd odometer").await;
    assert_contains_all(&output, &["*** /garage/VIN1/odometer is not a directory\r\n"]);
    assert_prompt(&output, "ccs:/garage/VIN1$ ");

    let output = execute_command(&mut shell, "cd a b").await;
    assert_contains_all(&output, &["*** Expected 0-1 arguments, got 2"]);
}

#[tokio::test]
async fn test_cd_above_root_stays_at_root() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);
    let output = execute_command(&mut shell, "cd ../../..").await;
    assert_prompt(&output, "ccs:/$ ");

    // More `..` than any path is deep
    execute_command(&mut shell, "cd /garage/VIN1").await;
    let ups = vec![".."; 20].join("/");
    let output = execute_command(&mut shell, &format!("cd {}", ups)).await;
    assert_contains_none(&output, &["***"]);
    assert_prompt(&output, "ccs:/$ ");
}

#[tokio::test]
async fn test_ls_lists_children_in_order() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);

    let output = execute_command(&mut shell, "ls").await;
    assert_eq!(output, "ls\r\ngarage\r\nccs:/$ ");

    execute_command(&mut shell, "cd /garage/VIN1").await;
    let output = execute_command(&mut shell, "ls").await;
    assert_eq!(
        output,
        "ls\r\n.\r\n..\r\nodometer\r\ndoors\r\nclimatisation\r\ncharging\r\nccs:/garage/VIN1$ "
    );
}

#[tokio::test]
async fn test_ls_is_stable_without_backend_changes() {
    let (backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);

    let first = execute_command(&mut shell, "ls /garage").await;
    let second = execute_command(&mut shell, "ls /garage").await;
    assert_eq!(first, second);
    assert_eq!(backend.fetch_calls(), 0);
}

#[tokio::test]
async fn test_ls_other_path_and_leaf() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);

    let output = execute_command(&mut shell, "ls garage/VIN2").await;
    assert_contains_all(&output, &["odometer\r\n", "doors\r\n"]);
    assert_prompt(&output, "ccs:/$ ");

    let output = execute_command(&mut shell, "ls /garage/VIN2/odometer").await;
    assert_contains_all(&output, &["*** /garage/VIN2/odometer is not a directory"]);
}

#[tokio::test]
async fn test_pwd() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);
    execute_command(&mut shell, "cd /garage/VIN1/charging").await;

    let output = execute_command(&mut shell, "pwd").await;
    assert_eq!(output, "pwd\r\n/garage/VIN1/charging\r\nccs:/garage/VIN1/charging$ ");

    let output = execute_command(&mut shell, "pwd /").await;
    assert_contains_all(&output, &["*** Expected 0 arguments, got 1"]);
}

// ============================================================================
// Reading values
// ============================================================================

#[tokio::test]
async fn test_cat_fresh_leaf_uses_cache() {
    let (backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);

    let output = execute_command(&mut shell, "cat /garage/VIN1/odometer").await;
    assert_contains_all(&output, &["/garage/VIN1/odometer: 12345 (last updated "]);
    assert_contains_none(&output, &["***", "never"]);
    assert_eq!(backend.fetch_calls(), 0);
}

#[tokio::test]
async fn test_cat_stale_leaf_refreshes() {
    let (backend, ctx) = stale_context(&Config::default());
    backend.set_value(&at(ODOMETER), 12400);
    let mut shell = create_test_shell(&ctx);
    execute_command(&mut shell, "cd /garage/VIN1").await;

    let output = execute_command(&mut shell, "cat odometer").await;
    assert_contains_all(&output, &["/garage/VIN1/odometer: 12400 (last updated "]);
    assert_eq!(backend.fetch_calls(), 1);
}

#[tokio::test]
async fn test_cat_shows_cached_value_when_backend_is_down() {
    let (backend, ctx) = stale_context(&Config::default());
    backend.fail_with(BackendError::Unavailable("vehicle asleep".into()));
    let mut shell = create_test_shell(&ctx);

    let output = execute_command(&mut shell, "cat /garage/VIN1/odometer").await;
    assert_contains_all(
        &output,
        &[
            "/garage/VIN1/odometer: 12345 (last updated never)\r\n",
            "*** backend unavailable for /garage/VIN1/odometer: vehicle asleep (cached value shown)\r\n",
        ],
    );
    assert_prompt(&output, "ccs:/$ ");
}

#[tokio::test]
async fn test_cat_container_shows_settable_values() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);
    execute_command(&mut shell, "cd /garage/VIN1").await;

    let output = execute_command(&mut shell, "cat").await;
    assert_contains_all(
        &output,
        &[
            "/garage/VIN1/climatisation/command: stop",
            "/garage/VIN1/charging/settings/target_level: 80",
        ],
    );
    assert_contains_none(&output, &["odometer", "lock_state"]);

    let output = execute_command(&mut shell, "cat -a").await;
    assert_contains_all(
        &output,
        &[
            "/garage/VIN1/odometer: 12345",
            "/garage/VIN1/doors/lock_state: locked",
            "/garage/VIN1/climatisation/state: off",
            "/garage/VIN1/climatisation/command: stop",
        ],
    );
}

#[tokio::test]
async fn test_cat_missing_path() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);
    let output = execute_command(&mut shell, "cat /garage/VIN9/odometer").await;
    assert_contains_all(
        &output,
        &["*** /garage/VIN9/odometer does not exist or is not accessible\r\n"],
    );
}

#[tokio::test]
async fn test_find_lists_attribute_paths() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);

    let output = execute_command(&mut shell, "find /garage/VIN2").await;
    assert_eq!(output, "find /garage/VIN2\r\n/garage/VIN2/odometer\r\nccs:/$ ");

    let output = execute_command(&mut shell, "find -s").await;
    assert_contains_all(
        &output,
        &[
            "/garage/VIN1/climatisation/command\r\n",
            "/garage/VIN1/charging/settings/target_level\r\n",
        ],
    );
    assert_contains_none(&output, &["odometer"]);

    let output = execute_command(&mut shell, "find -x").await;
    assert_contains_all(&output, &["*** Unknown syntax: find -x"]);
}

// ============================================================================
// Update
// ============================================================================

#[tokio::test]
async fn test_update_forces_refresh() {
    let (backend, ctx) = demo_context(&Config::default());
    backend.set_value(&at(ODOMETER), 12500);
    let mut shell = create_test_shell(&ctx);

    let output = execute_command(&mut shell, "update /garage/VIN1").await;
    assert_contains_all(&output, &["update done\r\n"]);
    assert_eq!(backend.fetch_calls(), 1);
    assert_eq!(
        ctx.tree().get(&at(ODOMETER)).unwrap().current_value(),
        Value::Integer(12500)
    );
}

#[tokio::test]
async fn test_update_moves_cwd_out_of_removed_subtree() {
    let (backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);
    execute_command(&mut shell, "cd /garage/VIN2/doors").await;

    backend.remove(&at(VIN2));
    let output = execute_command(&mut shell, "update /").await;
    assert_contains_all(&output, &["update done\r\n"]);
    assert_prompt(&output, "ccs:/garage$ ");
    assert_eq!(shell.cwd(), &at("/garage"));
}

#[tokio::test]
async fn test_update_failure_is_reported() {
    let (backend, ctx) = demo_context(&Config::default());
    backend.fail_with(BackendError::Unavailable("no connection".into()));
    let mut shell = create_test_shell(&ctx);

    let output = execute_command(&mut shell, "update garage").await;
    assert_contains_all(&output, &["*** backend unavailable for /garage: no connection\r\n"]);
    assert_contains_none(&output, &["update done"]);
}

// ============================================================================
// Misc commands
// ============================================================================

#[tokio::test]
async fn test_unknown_command() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);
    let output = execute_command(&mut shell, "reboot now").await;
    assert_eq!(output, "reboot now\r\n*** Unknown syntax: reboot now\r\nccs:/$ ");
}

#[tokio::test]
async fn test_help_lists_commands() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);

    for command in ["?", "help"] {
        let output = execute_command(&mut shell, command).await;
        assert_contains_all(
            &output,
            &["  cd [path]", "  ls [path]", "  cat [-a] [path]", "  update [path]", "  exit | x | q"],
        );
        assert_prompt(&output, "ccs:/$ ");
    }
}

#[tokio::test]
async fn test_clear_command() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);
    let output = execute_command(&mut shell, "clear").await;
    helpers::assert_contains_ansi(&output, "\x1b[2J\x1b[H");
    assert_prompt(&output, "ccs:/$ ");
}

#[tokio::test]
async fn test_execute_directly() {
    let (_backend, ctx) = demo_context(&Config::default());
    let mut shell = create_test_shell(&ctx);

    let response = shell.execute("cd /garage").await.unwrap();
    assert!(response.message.is_empty());
    let response = shell.execute("ls").await.unwrap();
    assert_eq!(response.message, ".\n..\nVIN1\nVIN2");
}
