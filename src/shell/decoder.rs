//! Keystroke decoder for the interactive shell.
//!
//! Turns raw terminal characters (as delivered in raw mode) into editing
//! keys: printable characters, line submission, history navigation, Tab,
//! and the control keys the shell reacts to (Ctrl-C, Ctrl-D, Ctrl-L,
//! double ESC). Holds no buffers and performs no I/O.

/// Position inside an escape sequence.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
enum Escape {
    #[default]
    Idle,
    /// After ESC
    Esc,
    /// After ESC [
    Csi,
}

/// Editing key produced by the decoder.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Key {
    /// Nothing to do (inside an escape sequence, or an ignored key)
    Ignored,

    /// Printable character
    Char(char),

    /// BS or DEL
    Backspace,

    /// CR or LF
    Enter,

    /// Tab
    Tab,

    /// Up arrow
    HistoryUp,

    /// Down arrow
    HistoryDown,

    /// ESC ESC
    ClearLine,

    /// Ctrl-C
    Interrupt,

    /// Ctrl-D
    EndOfInput,

    /// Ctrl-L
    ClearScreen,
}

/// Terminal keystroke decoder.
#[derive(Debug, Default)]
pub struct KeyDecoder {
    escape: Escape,
}

impl KeyDecoder {
    /// Decoder outside any escape sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one character.
    ///
    /// ```rust,ignore
    /// let mut keys = KeyDecoder::new();
    /// assert_eq!(keys.feed('\x1b'), Key::Ignored);
    /// assert_eq!(keys.feed('['), Key::Ignored);
    /// assert_eq!(keys.feed('A'), Key::HistoryUp);
    /// ```
    pub fn feed(&mut self, c: char) -> Key {
        let (next, key) = match (self.escape, c) {
            (Escape::Idle, '\x1b') => (Escape::Esc, Key::Ignored),
            (Escape::Idle, c) => (Escape::Idle, plain_key(c)),

            (Escape::Esc, '\x1b') => (Escape::Idle, Key::ClearLine),
            (Escape::Esc, '[') => (Escape::Csi, Key::Ignored),
            // A lone ESC is dropped, the character after it counts
            (Escape::Esc, c) => (Escape::Idle, plain_key(c)),

            (Escape::Csi, 'A') => (Escape::Idle, Key::HistoryUp),
            (Escape::Csi, 'B') => (Escape::Idle, Key::HistoryDown),
            // Parameter bytes, e.g. the 3 in ESC [ 3 ~ (Delete)
            (Escape::Csi, '0'..='9' | ';') => (Escape::Csi, Key::Ignored),
            (Escape::Csi, _) => (Escape::Idle, Key::Ignored),
        };
        self.escape = next;
        key
    }

    /// Whether the decoder sits between keys (not inside an escape sequence).
    pub fn is_idle(&self) -> bool {
        self.escape == Escape::Idle
    }
}

fn plain_key(c: char) -> Key {
    match c {
        '\r' | '\n' => Key::Enter,
        '\t' => Key::Tab,
        '\x08' | '\x7f' => Key::Backspace,
        '\x03' => Key::Interrupt,
        '\x04' => Key::EndOfInput,
        '\x0c' => Key::ClearScreen,
        c if c.is_control() => Key::Ignored,
        c => Key::Char(c),
    }
}
