//! Character output sink for the interactive shell.
//!
//! The shell never reads input itself: the caller feeds keystrokes through
//! [`Shell::process_char`](crate::shell::Shell::process_char) and the shell
//! writes its echo, prompts and command output through a `CharIo`. That keeps
//! the session independent of where characters come from (a raw-mode
//! terminal, a script, a test).

/// Character output used by the shell.
///
/// Output may be buffered; the shell calls [`flush`](CharIo::flush) after
/// every processed character.
pub trait CharIo {
    /// Platform-specific error type
    type Error;

    /// Write one character.
    fn put_char(&mut self, c: char) -> Result<(), Self::Error>;

    /// Write a string.
    ///
    /// Default implementation uses `put_char()` repeatedly.
    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        for c in s.chars() {
            self.put_char(c)?;
        }
        Ok(())
    }

    /// Push buffered output to the terminal.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Every `std::io::Write` is a `CharIo`.
impl<W: std::io::Write> CharIo for W {
    type Error = std::io::Error;

    fn put_char(&mut self, c: char) -> Result<(), Self::Error> {
        let mut buf = [0u8; 4];
        self.write_all(c.encode_utf8(&mut buf).as_bytes())
    }

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.write_all(s.as_bytes())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(self)
    }
}
