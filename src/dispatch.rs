//! One-shot commands: `get`, `set`, `list`, `save` and `events`.
//!
//! Each command resolves its path against the root, makes exactly one cache
//! (or bus) interaction and writes its result to the given writer. Paths in
//! one-shot mode have no working directory, so relative paths are taken from
//! `/`.

use crate::backend::Backend;
use crate::context::Context;
use crate::error::ShellError;
use crate::render::{self, Format};
use crate::tree::{AttributeNode, NodePath};
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// A parsed one-shot command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the value at `path`
    Get {
        /// Target node
        path: String,
        /// Output format
        format: Format,
    },
    /// Set the leaf at `path`; the words of `value` are joined with spaces
    Set {
        /// Target leaf
        path: String,
        /// New value
        value: Vec<String>,
    },
    /// Print every leaf path below `path` (default `/`)
    List {
        /// Subtree to list
        path: Option<String>,
        /// Only settable leaves
        setters: bool,
    },
    /// Write the subtree at `path` as JSON to `file`
    Save {
        /// Subtree to save (default `/`)
        path: Option<String>,
        /// Destination file
        file: PathBuf,
    },
    /// Print change records until `shutdown` completes
    Events,
}

/// Run one command.
///
/// `shutdown` only matters for [`Command::Events`], which otherwise runs
/// until the bus closes.
pub async fn dispatch<B, W, S>(
    ctx: &Context<B>,
    command: Command,
    out: &mut W,
    shutdown: S,
) -> Result<(), ShellError>
where
    B: Backend,
    W: Write,
    S: Future<Output = ()>,
{
    log::debug!("dispatching {:?}", command);
    match command {
        Command::Get { path, format } => get(ctx, &path, format, out).await,
        Command::Set { path, value } => set(ctx, &path, &value.join(" ")).await,
        Command::List { path, setters } => {
            list(ctx, path.as_deref().unwrap_or("/"), setters, out).await
        }
        Command::Save { path, file } => save(ctx, path.as_deref().unwrap_or("/"), &file).await,
        Command::Events => events(ctx, out, shutdown).await,
    }
}

/// Resolve and refresh per policy; returns the node as it is after the refresh.
async fn fresh_node<B: Backend>(
    ctx: &Context<B>,
    path: &str,
) -> Result<Arc<AttributeNode>, ShellError> {
    let node = ctx.resolve(path, &NodePath::root())?;
    ctx.cache().ensure_fresh(&node, ctx.policy()).await?;
    ctx.tree()
        .get(node.path())
        .ok_or_else(|| ShellError::PathNotFound(path.to_string()))
}

async fn get<B: Backend, W: Write>(
    ctx: &Context<B>,
    path: &str,
    format: Format,
    out: &mut W,
) -> Result<(), ShellError> {
    let node = fresh_node(ctx, path).await?;
    match format {
        Format::Json => writeln!(out, "{}", render::to_json(&node.current_value())?)?,
        Format::String if node.is_leaf() => writeln!(out, "{}", node.current_value())?,
        Format::String => {
            let mut leaves = node.leaves();
            leaves.sort_by(|a, b| a.path().cmp(b.path()));
            for leaf in leaves {
                writeln!(out, "{}", render::value_line(leaf.path(), &leaf.current_value()))?;
            }
        }
    }
    Ok(())
}

async fn set<B: Backend>(ctx: &Context<B>, path: &str, raw: &str) -> Result<(), ShellError> {
    let node = ctx.resolve(path, &NodePath::root())?;
    ctx.cache().set(&node, raw).await?;
    Ok(())
}

async fn list<B: Backend, W: Write>(
    ctx: &Context<B>,
    path: &str,
    setters: bool,
    out: &mut W,
) -> Result<(), ShellError> {
    let node = fresh_node(ctx, path).await?;
    let mut paths: Vec<NodePath> = node
        .leaves()
        .iter()
        .filter(|leaf| !setters || leaf.is_settable())
        .map(|leaf| leaf.path().clone())
        .collect();
    paths.sort();
    for path in paths {
        writeln!(out, "{}", path)?;
    }
    Ok(())
}

async fn save<B: Backend>(
    ctx: &Context<B>,
    path: &str,
    file: &std::path::Path,
) -> Result<(), ShellError> {
    let node = fresh_node(ctx, path).await?;
    let json = render::to_json(&node.current_value())?;
    tokio::fs::write(file, json + "\n").await?;
    log::info!("saved {} to {}", node.path(), file.display());
    Ok(())
}

async fn events<B, W, S>(ctx: &Context<B>, out: &mut W, shutdown: S) -> Result<(), ShellError>
where
    B: Backend,
    W: Write,
    S: Future<Output = ()>,
{
    let mut subscription = ctx.bus().subscribe();
    let mut shutdown = std::pin::pin!(shutdown);
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            event = subscription.recv() => match event {
                Some(event) => {
                    writeln!(out, "{}", render::event_line(&event))?;
                    out.flush()?;
                }
                None => break,
            },
        }
    }
    Ok(())
}
