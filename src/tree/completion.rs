//! Tab completion for shell commands and tree paths.
//!
//! Provides prefix matching with container handling. Uses the stub function
//! pattern: the module always exists, functions return empty results when the
//! `completion` feature is disabled.

#![cfg_attr(not(feature = "completion"), allow(unused_variables))]

use super::{AttributeTree, NodePath};

#[cfg(feature = "completion")]
use super::resolve::{nearest_existing, resolve_container};

/// Completion result containing the completed text and match information.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResult {
    /// Replacement for the token being completed (common prefix if several matches)
    pub completion: String,

    /// True if exactly one match found
    pub is_complete: bool,

    /// True if the single match is a container
    pub is_directory: bool,

    /// All matching names (for display)
    pub all_matches: Vec<String>,
}

impl CompletionResult {
    /// Create empty completion result.
    pub fn empty() -> Self {
        Self::default()
    }
}

// ============================================================================
// Feature-enabled implementation
// ============================================================================

/// Suggest completions for a partial (absolute or relative) path.
///
/// Everything up to the last `/` must name an existing container; the rest is
/// prefix-matched against its children. A single container match is flagged
/// with `is_directory`; the caller appends the `/`.
///
/// # Examples
///
/// ```rust,ignore
/// // cwd = /garage/VIN1, children "odometer", "doors"
/// let result = suggest_paths(&tree, &cwd, "od");
/// assert_eq!(result.completion, "odometer");
///
/// let result = suggest_paths(&tree, &cwd, "../V");
/// assert_eq!(result.completion, "../VIN");  // VIN1, VIN2
/// ```
#[cfg(feature = "completion")]
pub fn suggest_paths(tree: &AttributeTree, cwd: &NodePath, input: &str) -> CompletionResult {
    let (dir_part, prefix) = match input.rfind('/') {
        Some(idx) => input.split_at(idx + 1),
        None => ("", input),
    };

    let dir = if dir_part.is_empty() {
        nearest_existing(tree, cwd)
    } else {
        match resolve_container(tree, dir_part, cwd) {
            Ok(dir) => dir,
            Err(_) => return CompletionResult::empty(),
        }
    };

    let children = dir.children();
    let candidates: Vec<(&str, bool)> = children
        .iter()
        .map(|child| (child.name(), child.is_container()))
        .collect();

    complete_from(&candidates, dir_part, prefix)
}

/// Suggest completions for a command name.
#[cfg(feature = "completion")]
pub fn suggest_commands(commands: &[&str], input: &str) -> CompletionResult {
    let candidates: Vec<(&str, bool)> = commands.iter().map(|name| (*name, false)).collect();
    complete_from(&candidates, "", input)
}

#[cfg(feature = "completion")]
fn complete_from(candidates: &[(&str, bool)], base: &str, prefix: &str) -> CompletionResult {
    let matches: Vec<(&str, bool)> = candidates
        .iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .copied()
        .collect();

    // No matches
    if matches.is_empty() {
        return CompletionResult::empty();
    }

    // Single match - complete!
    if let [(name, is_dir)] = matches[..] {
        return CompletionResult {
            completion: format!("{}{}", base, name),
            is_complete: true,
            is_directory: is_dir,
            all_matches: vec![name.to_string()],
        };
    }

    // Multiple matches - find common prefix
    CompletionResult {
        completion: format!("{}{}", base, find_common_prefix(&matches)),
        is_complete: false,
        is_directory: false,
        all_matches: matches.iter().map(|(name, _)| name.to_string()).collect(),
    }
}

/// Find common prefix among multiple matches.
#[cfg(feature = "completion")]
fn find_common_prefix<'a>(matches: &[(&'a str, bool)]) -> &'a str {
    let Some(&(first, _)) = matches.first() else {
        return "";
    };

    let mut prefix_len = first.len();
    for (name, _) in &matches[1..] {
        prefix_len = first
            .char_indices()
            .zip(name.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((i, a), _)| i + a.len_utf8())
            .min(prefix_len);
    }

    &first[..prefix_len]
}

// ============================================================================
// Feature-disabled stub implementation
// ============================================================================

/// Stub implementation when completion feature is disabled.
#[cfg(not(feature = "completion"))]
pub fn suggest_paths(_tree: &AttributeTree, _cwd: &NodePath, _input: &str) -> CompletionResult {
    CompletionResult::empty()
}

/// Stub implementation when completion feature is disabled.
#[cfg(not(feature = "completion"))]
pub fn suggest_commands(_commands: &[&str], _input: &str) -> CompletionResult {
    CompletionResult::empty()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Snapshot;

    fn tree() -> AttributeTree {
        AttributeTree::from_snapshot(
            Snapshot::container().with(
                "garage",
                Snapshot::container()
                    .with(
                        "VIN1",
                        Snapshot::container()
                            .with("odometer", Snapshot::leaf(12345))
                            .with("doors", Snapshot::container())
                            .with("drives", Snapshot::container()),
                    )
                    .with("VIN2", Snapshot::container()),
            ),
            None,
        )
    }

    fn vin1() -> NodePath {
        NodePath::parse_absolute("/garage/VIN1").unwrap()
    }

    #[test]
    #[cfg(feature = "completion")]
    fn test_single_match_leaf() {
        let result = suggest_paths(&tree(), &vin1(), "od");

        assert_eq!(result.completion, "odometer");
        assert!(result.is_complete);
        assert!(!result.is_directory);
        assert_eq!(result.all_matches, ["odometer"]);
    }

    #[test]
    #[cfg(feature = "completion")]
    fn test_single_match_container() {
        let result = suggest_paths(&tree(), &vin1(), "doo");

        assert_eq!(result.completion, "doors");
        assert!(result.is_complete);
        assert!(result.is_directory);
    }

    #[test]
    #[cfg(feature = "completion")]
    fn test_multiple_matches_with_common_prefix() {
        let result = suggest_paths(&tree(), &vin1(), "d");

        assert_eq!(result.completion, "d");
        assert!(!result.is_complete);
        assert_eq!(result.all_matches, ["doors", "drives"]);
    }

    #[test]
    #[cfg(feature = "completion")]
    fn test_nested_relative_path() {
        let result = suggest_paths(&tree(), &vin1(), "../V");

        assert_eq!(result.completion, "../VIN");
        assert!(!result.is_complete);
        assert_eq!(result.all_matches.len(), 2);
    }

    #[test]
    #[cfg(feature = "completion")]
    fn test_absolute_path() {
        let result = suggest_paths(&tree(), &NodePath::root(), "/ga");
        assert_eq!(result.completion, "/garage");
        assert!(result.is_directory);

        let result = suggest_paths(&tree(), &NodePath::root(), "/garage/VIN1/o");
        assert_eq!(result.completion, "/garage/VIN1/odometer");
    }

    #[test]
    #[cfg(feature = "completion")]
    fn test_no_matches() {
        let result = suggest_paths(&tree(), &vin1(), "xyz");
        assert_eq!(result, CompletionResult::empty());

        // Directory part does not exist
        let result = suggest_paths(&tree(), &vin1(), "nowhere/x");
        assert_eq!(result, CompletionResult::empty());
    }

    #[test]
    #[cfg(feature = "completion")]
    fn test_case_sensitive_matching() {
        let result = suggest_paths(&tree(), &vin1(), "OD");
        assert!(result.all_matches.is_empty());
    }

    #[test]
    #[cfg(feature = "completion")]
    fn test_command_completion() {
        let commands = ["cd", "cat", "clear", "ls", "update"];
        let result = suggest_commands(&commands, "up");
        assert_eq!(result.completion, "update");
        assert!(result.is_complete);

        let result = suggest_commands(&commands, "c");
        assert_eq!(result.completion, "c");
        assert_eq!(result.all_matches.len(), 3);
    }

    #[test]
    #[cfg(not(feature = "completion"))]
    fn test_stub_returns_empty() {
        let result = suggest_paths(&tree(), &vin1(), "od");
        assert_eq!(result, CompletionResult::empty());
    }

    #[test]
    #[cfg(feature = "completion")]
    fn test_common_prefix_calculation() {
        let matches = [("start", false), ("status", false), ("stop", false)];
        assert_eq!(find_common_prefix(&matches), "st");

        let matches = [("network", false), ("netscan", false)];
        assert_eq!(find_common_prefix(&matches), "net");

        let matches = [("abc", false), ("xyz", false)];
        assert_eq!(find_common_prefix(&matches), "");
    }
}
