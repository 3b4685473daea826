//! Path parsing and canonical node paths.
//!
//! [`Path`] is the borrowed, unresolved form typed by a user: absolute or
//! relative, possibly containing `.` and `..`. [`NodePath`] is the owned,
//! canonical absolute path of a node in the tree.
//!
//! # Example
//!
//! ```rust,ignore
//! use car_shell::tree::path::Path;
//!
//! let path = Path::parse("/garage/VIN1/odometer")?;
//! assert!(path.is_absolute());
//! assert_eq!(path.segments(), &["garage", "VIN1", "odometer"]);
//!
//! let path = Path::parse("../VIN2/doors")?;
//! assert!(!path.is_absolute());
//! assert_eq!(path.segments(), &["..", "VIN2", "doors"]);
//! ```

use crate::config::MAX_PATH_DEPTH;
use crate::error::ShellError;
use serde::{Serialize, Serializer};
use std::fmt;

/// Unix-style path as typed by the user.
///
/// Segments borrow from the input. The depth the path can reach below its
/// starting point is bounded by [`MAX_PATH_DEPTH`]; any number of `..` is
/// accepted since they only ever climb.
///
/// # Path Syntax
///
/// - **Absolute paths**: Start with `/` (e.g., `/garage/VIN1`)
/// - **Relative paths**: No leading `/` (e.g., `odometer`, `../VIN2`)
/// - **Parent navigation**: `..` goes up one level, clamped at root
/// - **Current directory**: `.` stays at current level
#[derive(Debug, PartialEq)]
pub struct Path<'a> {
    is_absolute: bool,

    /// Includes `.` and `..`; they are processed during resolution
    segments: Vec<&'a str>,
}

impl<'a> Path<'a> {
    /// Parse path string into Path structure.
    ///
    /// # Returns
    ///
    /// - `Ok(Path)` - Successfully parsed
    /// - `Err(ShellError::InvalidPath)` - Empty path
    /// - `Err(ShellError::PathTooDeep)` - Descends more than MAX_PATH_DEPTH
    ///   levels below its starting point
    pub fn parse(input: &'a str) -> Result<Self, ShellError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ShellError::InvalidPath);
        }

        let is_absolute = input.starts_with('/');
        let mut segments = Vec::new();
        let mut depth = 0usize;

        // Split by '/' and drop empty segments ("//", trailing "/")
        for segment in input.split('/').filter(|s| !s.is_empty()) {
            match segment {
                "." => {}
                ".." => depth = depth.saturating_sub(1),
                _ => {
                    depth += 1;
                    if depth > MAX_PATH_DEPTH {
                        return Err(ShellError::PathTooDeep);
                    }
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            is_absolute,
            segments,
        })
    }

    /// Check if this is an absolute path (starts with `/`).
    pub fn is_absolute(&self) -> bool {
        self.is_absolute
    }

    /// Get path segments, including `.` and `..`.
    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    /// Get number of segments in path.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

/// Canonical absolute path of a node: the ordered segments from the root.
///
/// The root is the empty path and displays as `/`. Unique per node, and the
/// key by which the shell remembers positions in a tree that may be
/// restructured underneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// The root path (`/`).
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from already-canonical segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Lexically normalise an absolute path string (no tree lookup).
    ///
    /// `.` is dropped and `..` pops, clamped at the root. Relative input is
    /// rejected because it has no meaning without a working directory.
    pub fn parse_absolute(input: &str) -> Result<Self, ShellError> {
        let path = Path::parse(input)?;
        if !path.is_absolute() {
            return Err(ShellError::InvalidPath);
        }
        let mut out = Self::root();
        for segment in path.segments() {
            match *segment {
                "." => {}
                ".." => {
                    out.segments.pop();
                }
                name => out.segments.push(name.to_string()),
            }
        }
        Ok(out)
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments from the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (0 for root).
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Last segment, `None` for root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path. The root's parent is the root.
    pub fn parent(&self) -> NodePath {
        let mut parent = self.clone();
        parent.segments.pop();
        parent
    }

    /// Child path `self/name`.
    pub fn join(&self, name: &str) -> NodePath {
        let mut child = self.clone();
        child.segments.push(name.to_string());
        child
    }

    /// True if `self` equals `ancestor` or lies below it.
    pub fn starts_with(&self, ancestor: &NodePath) -> bool {
        self.segments.starts_with(&ancestor.segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
