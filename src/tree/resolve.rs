//! Path resolution against the live tree.
//!
//! Resolution is stack based: each segment either pushes a child, pops the
//! stack (`..`, clamped at root) or is skipped (`.`). A missing child, or a
//! segment below a leaf, fails the whole lookup.

use super::{AttributeNode, AttributeTree, NodePath, Path};
use crate::error::ShellError;
use std::sync::Arc;

/// Resolve `input` (absolute, or relative to `cwd`) to a node.
///
/// A `cwd` that vanished from the tree is replaced by its nearest surviving
/// ancestor before relative segments are applied.
pub fn resolve(
    tree: &AttributeTree,
    input: &str,
    cwd: &NodePath,
) -> Result<Arc<AttributeNode>, ShellError> {
    let path = Path::parse(input)?;

    let start = if path.is_absolute() {
        Arc::clone(tree.root())
    } else {
        nearest_existing(tree, cwd)
    };

    let mut stack = vec![start];
    for segment in path.segments() {
        match *segment {
            "." => {}
            ".." => {
                if stack.len() > 1 {
                    stack.pop();
                } else if let Some(top) = stack.first_mut()
                    && !top.path().is_root()
                {
                    // Relative walk above the starting node
                    let parent = nearest_existing(tree, &top.path().parent());
                    *top = parent;
                }
            }
            name => {
                let child = stack
                    .last()
                    .and_then(|top| top.child(name))
                    .ok_or_else(|| ShellError::PathNotFound(input.trim().to_string()))?;
                stack.push(child);
            }
        }
    }

    stack
        .pop()
        .ok_or_else(|| ShellError::PathNotFound(input.trim().to_string()))
}

/// Resolve `input` and require a container (`cd`, `ls`, `find`).
pub fn resolve_container(
    tree: &AttributeTree,
    input: &str,
    cwd: &NodePath,
) -> Result<Arc<AttributeNode>, ShellError> {
    let node = resolve(tree, input, cwd)?;
    if node.is_container() {
        Ok(node)
    } else {
        Err(ShellError::NotAContainer(node.path().to_string()))
    }
}

/// Deepest existing node on the way from the root to `path`.
pub fn nearest_existing(tree: &AttributeTree, path: &NodePath) -> Arc<AttributeNode> {
    let mut node = Arc::clone(tree.root());
    for segment in path.segments() {
        match node.child(segment) {
            Some(child) => node = child,
            None => break,
        }
    }
    node
}
