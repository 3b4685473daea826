//! Shell command output with formatting flags.
//!
//! A successful shell command yields a `Response`; a failed one yields a
//! `ShellError`, which the shell prints as `*** <message>`.

/// Command output and how to present it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Output text, lines separated by `\n`
    pub message: String,

    /// Indent every line by two spaces
    pub indent_message: bool,

    /// Terminate the output with a newline
    pub postfix_newline: bool,

    /// Print the prompt afterwards
    pub show_prompt: bool,

    /// Clear the terminal before printing
    pub clear_screen: bool,
}

impl Response {
    /// Plain output followed by a newline and the prompt.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            indent_message: false,
            postfix_newline: true,
            show_prompt: true,
            clear_screen: false,
        }
    }

    /// Output built from lines.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let message = lines
            .into_iter()
            .map(|line| line.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Self::success(message)
    }

    /// No output at all (the prompt still follows).
    pub fn empty() -> Self {
        Self::success("").without_postfix_newline()
    }

    /// Builder: indent output.
    pub fn indented(mut self) -> Self {
        self.indent_message = true;
        self
    }

    /// Builder: no trailing newline.
    pub fn without_postfix_newline(mut self) -> Self {
        self.postfix_newline = false;
        self
    }

    /// Builder: no prompt afterwards (used by `exit`).
    pub fn without_prompt(mut self) -> Self {
        self.show_prompt = false;
        self
    }

    /// Builder: clear the screen first.
    pub fn clearing_screen(mut self) -> Self {
        self.clear_screen = true;
        self
    }
}
