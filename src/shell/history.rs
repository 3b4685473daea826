//! Shell command history (up/down arrow recall).
//!
//! The struct always exists; with the `history` feature disabled it is a
//! zero-size stub whose operations do nothing.

#![cfg_attr(not(feature = "history"), allow(unused_variables))]

/// Recently entered shell lines, oldest first, bounded to `N` entries.
#[derive(Debug)]
pub struct CommandHistory<const N: usize> {
    #[cfg(feature = "history")]
    entries: heapless::Deque<String, N>,

    /// Index into `entries` while browsing, `None` at the live line
    #[cfg(feature = "history")]
    cursor: Option<usize>,
}

#[cfg(feature = "history")]
impl<const N: usize> CommandHistory<N> {
    /// Empty history.
    pub fn new() -> Self {
        Self {
            entries: heapless::Deque::new(),
            cursor: None,
        }
    }

    /// Record a submitted line.
    ///
    /// Blank lines and repeats of the newest entry are skipped. When full,
    /// the oldest entry is dropped. Browsing restarts from the newest entry.
    pub fn add(&mut self, line: &str) {
        self.cursor = None;

        let line = line.trim();
        if line.is_empty() || self.entries.back().is_some_and(|last| last == line) {
            return;
        }
        if self.entries.is_full() {
            self.entries.pop_front();
        }
        let _ = self.entries.push_back(line.to_string());
    }

    /// Step to an older entry (up arrow). Stays on the oldest one.
    pub fn previous_command(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let index = match self.cursor {
            None => self.entries.len() - 1,
            Some(index) => index.saturating_sub(1),
        };
        self.cursor = Some(index);
        self.entries.iter().nth(index).map(String::as_str)
    }

    /// Step to a newer entry (down arrow). `None` once back at the live line.
    pub fn next_command(&mut self) -> Option<&str> {
        let index = self.cursor? + 1;
        if index >= self.entries.len() {
            self.cursor = None;
            return None;
        }
        self.cursor = Some(index);
        self.entries.iter().nth(index).map(String::as_str)
    }

    /// Stop browsing.
    pub fn reset_position(&mut self) {
        self.cursor = None;
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(not(feature = "history"))]
impl<const N: usize> CommandHistory<N> {
    /// Empty history (stub).
    pub fn new() -> Self {
        Self {}
    }

    /// No-op.
    pub fn add(&mut self, _line: &str) {}

    /// Always `None`.
    pub fn previous_command(&mut self) -> Option<&str> {
        None
    }

    /// Always `None`.
    pub fn next_command(&mut self) -> Option<&str> {
        None
    }

    /// No-op.
    pub fn reset_position(&mut self) {}

    /// Always 0.
    pub fn len(&self) -> usize {
        0
    }

    /// Always true.
    pub fn is_empty(&self) -> bool {
        true
    }
}

impl<const N: usize> Default for CommandHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}
