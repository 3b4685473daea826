//! Interactive shell session.
//!
//! The `Shell` owns one navigation session over a [`Context`]: the working
//! path, the line being edited, and the command history. Keystrokes are fed
//! in one at a time through [`Shell::process_char`]; complete lines can also
//! be run directly through [`Shell::execute`], which is what scripts and
//! tests use.

use crate::backend::Backend;
use crate::config::{HISTORY_SIZE, MAX_INPUT};
use crate::context::Context;
use crate::error::ShellError;
use crate::io::CharIo;
use crate::render;
use crate::response::Response;
use crate::tree::completion::{CompletionResult, suggest_commands, suggest_paths};
use crate::tree::resolve::{nearest_existing, resolve_container};
use crate::tree::{AttributeNode, NodePath};
use std::sync::Arc;

pub mod decoder;
pub mod history;

pub use decoder::{Key, KeyDecoder};
pub use history::CommandHistory;

/// Shell command names, offered by Tab on the first word.
pub const COMMANDS: &[&str] = &[
    "?", "cat", "cd", "clear", "exit", "find", "help", "ls", "pwd", "q", "update", "x",
];

const WELCOME: &str = "Welcome! Type ? to list commands";

const HELP: &[&str] = &[
    "cd [path]         change the current path (no path: /)",
    "ls [path]         list the children of a path",
    "pwd               print the current path",
    "cat [-a] [path]   print a value; on a container its settable values (-a: all)",
    "find [-s] [path]  list every attribute below a path (-s: settable only)",
    "update [path]     reload a path from the backend",
    "clear             clear the screen",
    "exit | x | q      leave the shell (also Ctrl-D)",
    "? | help          show this help",
];

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Session lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShellState {
    /// Created, welcome not shown yet; input is ignored
    Inactive,

    /// Accepting commands
    Active,

    /// Left via `exit`; input is ignored
    Terminated,
}

/// One interactive session.
pub struct Shell<'ctx, B, IO>
where
    IO: CharIo,
{
    ctx: &'ctx Context<B>,

    state: ShellState,

    /// Always an existing container (or the root)
    cwd: NodePath,

    input_buffer: String,

    keys: KeyDecoder,

    history: CommandHistory<HISTORY_SIZE>,

    io: IO,
}

impl<'ctx, B, IO> std::fmt::Debug for Shell<'ctx, B, IO>
where
    IO: CharIo,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("state", &self.state)
            .field("cwd", &self.cwd)
            .field("input_buffer", &self.input_buffer)
            .finish_non_exhaustive()
    }
}

impl<'ctx, B, IO> Shell<'ctx, B, IO>
where
    B: Backend,
    IO: CharIo,
{
    /// Create a session at `/`.
    ///
    /// Starts `Inactive`. Call [`activate`](Self::activate) to show the
    /// welcome line and the first prompt.
    pub fn new(ctx: &'ctx Context<B>, io: IO) -> Self {
        Self {
            ctx,
            state: ShellState::Inactive,
            cwd: NodePath::root(),
            input_buffer: String::new(),
            keys: KeyDecoder::new(),
            history: CommandHistory::new(),
            io,
        }
    }

    /// Show the welcome line and prompt; start accepting input.
    pub fn activate(&mut self) -> Result<(), IO::Error> {
        self.state = ShellState::Active;
        self.io.write_str(WELCOME)?;
        self.io.write_str("\r\n")?;
        self.write_prompt()?;
        self.io.flush()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ShellState {
        self.state
    }

    /// Whether the session has ended.
    pub fn is_terminated(&self) -> bool {
        self.state == ShellState::Terminated
    }

    /// Current working path.
    pub fn cwd(&self) -> &NodePath {
        &self.cwd
    }

    /// `ccs:<cwd>$ `
    pub fn prompt(&self) -> String {
        format!("ccs:{}$ ", self.cwd)
    }

    /// Output sink.
    pub fn io(&self) -> &IO {
        &self.io
    }

    /// Mutable output sink.
    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    /// Line being edited.
    pub fn input_buffer(&self) -> &str {
        &self.input_buffer
    }

    /// Process one keystroke.
    pub async fn process_char(&mut self, c: char) -> Result<(), IO::Error> {
        if self.state != ShellState::Active {
            return Ok(());
        }

        match self.keys.feed(c) {
            Key::Ignored => {}

            Key::Char(ch) => {
                if self.input_buffer.chars().count() < MAX_INPUT {
                    self.input_buffer.push(ch);
                    self.io.put_char(ch)?;
                } else {
                    // Line full
                    self.io.put_char('\x07')?;
                }
            }

            Key::Backspace => {
                if self.input_buffer.pop().is_some() {
                    self.io.write_str("\x08 \x08")?;
                }
            }

            Key::ClearLine => {
                self.input_buffer.clear();
                self.history.reset_position();
                self.clear_line_and_redraw()?;
            }

            Key::Interrupt => {
                self.input_buffer.clear();
                self.history.reset_position();
                self.io.write_str("^C\r\n")?;
                self.write_prompt()?;
            }

            Key::EndOfInput => {
                if self.input_buffer.is_empty() {
                    self.io.write_str("\r\n")?;
                    let response = self.exit();
                    self.write_formatted_response(&response)?;
                }
            }

            Key::ClearScreen => {
                self.io.write_str(CLEAR_SCREEN)?;
                self.write_prompt()?;
                self.io.write_str(&self.input_buffer)?;
            }

            Key::Enter => self.handle_enter().await?,

            Key::Tab => self.handle_tab()?,

            Key::HistoryUp => {
                if let Some(entry) = self.history.previous_command().map(str::to_string) {
                    self.input_buffer = entry;
                    self.clear_line_and_redraw()?;
                }
            }

            Key::HistoryDown => {
                if let Some(entry) = self.history.next_command().map(str::to_string) {
                    self.input_buffer = entry;
                    self.clear_line_and_redraw()?;
                }
            }
        }

        self.io.flush()
    }

    /// Run one command line and return its output.
    ///
    /// Errors leave the session state (working path included) unchanged.
    pub async fn execute(&mut self, line: &str) -> Result<Response, ShellError> {
        self.resync_cwd();

        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Response::empty());
        };
        let args: Vec<&str> = words.collect();
        log::debug!("shell command {:?} {:?}", command, args);

        match command {
            "cd" => self.cd(&args),
            "ls" => self.ls(&args),
            "pwd" => {
                expect_args(&args, 0, 0)?;
                Ok(Response::success(self.cwd.to_string()))
            }
            "cat" => self.cat(line, &args).await,
            "find" => self.find(line, &args),
            "update" => self.update(&args).await,
            "clear" => {
                expect_args(&args, 0, 0)?;
                Ok(Response::empty().clearing_screen())
            }
            "exit" | "x" | "q" => {
                expect_args(&args, 0, 0)?;
                Ok(self.exit())
            }
            "?" | "help" => Ok(Response::lines(HELP).indented()),
            _ => Err(ShellError::UnknownCommand(line.trim().to_string())),
        }
    }

    fn cd(&mut self, args: &[&str]) -> Result<Response, ShellError> {
        expect_args(args, 0, 1)?;
        let target = args.first().copied().unwrap_or("/");
        let node = resolve_container(self.ctx.tree(), target, &self.cwd)?;
        self.cwd = node.path().clone();
        Ok(Response::empty())
    }

    fn ls(&self, args: &[&str]) -> Result<Response, ShellError> {
        expect_args(args, 0, 1)?;
        let target = args.first().copied().unwrap_or(".");
        let node = resolve_container(self.ctx.tree(), target, &self.cwd)?;

        let mut lines = Vec::new();
        if !node.path().is_root() {
            lines.push(".".to_string());
            lines.push("..".to_string());
        }
        lines.extend(node.children().iter().map(|child| child.name().to_string()));
        Ok(Response::lines(lines))
    }

    async fn cat(&mut self, line: &str, args: &[&str]) -> Result<Response, ShellError> {
        let (all, args) = take_flag(line, args, "-a")?;
        expect_args(&args, 0, 1)?;
        let target = args.first().copied().unwrap_or(".");
        let node = self.ctx.resolve(target, &self.cwd)?;

        // Stale data is still shown when the backend is down
        let warning = match self.ctx.cache().ensure_fresh(&node, self.ctx.policy()).await {
            Ok(_) => None,
            Err(err) if err.is_backend() => {
                log::warn!("showing cached value of {}: {}", node.path(), err);
                Some(err)
            }
            Err(err) => return Err(err),
        };
        let node = self.ctx.tree().get(node.path()).unwrap_or(node);

        let shown: Vec<Arc<AttributeNode>> = if node.is_leaf() {
            vec![node]
        } else {
            node.leaves()
                .into_iter()
                .filter(|leaf| all || leaf.is_settable())
                .collect()
        };

        let mut lines: Vec<String> = shown
            .iter()
            .map(|leaf| {
                let (value, updated) = leaf.read();
                render::leaf_line(leaf.path(), &value, updated)
            })
            .collect();
        if let Some(err) = warning {
            lines.push(format!("*** {} (cached value shown)", err));
        }

        if lines.is_empty() {
            Ok(Response::empty())
        } else {
            Ok(Response::lines(lines))
        }
    }

    fn find(&self, line: &str, args: &[&str]) -> Result<Response, ShellError> {
        let (setters, args) = take_flag(line, args, "-s")?;
        expect_args(&args, 0, 1)?;
        let target = args.first().copied().unwrap_or(".");
        let node = self.ctx.resolve(target, &self.cwd)?;

        let lines: Vec<String> = node
            .leaves()
            .iter()
            .filter(|leaf| !setters || leaf.is_settable())
            .map(|leaf| leaf.path().to_string())
            .collect();
        if lines.is_empty() {
            Ok(Response::empty())
        } else {
            Ok(Response::lines(lines))
        }
    }

    async fn update(&mut self, args: &[&str]) -> Result<Response, ShellError> {
        expect_args(args, 0, 1)?;
        let target = args.first().copied().unwrap_or(".");
        let node = self.ctx.resolve(target, &self.cwd)?;

        log::info!("updating {}", node.path());
        self.ctx.cache().refresh(&node).await?;
        self.resync_cwd();
        Ok(Response::success("update done"))
    }

    fn exit(&mut self) -> Response {
        self.state = ShellState::Terminated;
        self.input_buffer.clear();
        Response::success("Bye").without_prompt()
    }

    /// Move `cwd` up to its nearest surviving container.
    fn resync_cwd(&mut self) {
        let tree = self.ctx.tree();
        let mut node = nearest_existing(tree, &self.cwd);
        if !node.is_container() {
            node = nearest_existing(tree, &node.path().parent());
        }
        if node.path() != &self.cwd {
            log::debug!("{} vanished, moving to {}", self.cwd, node.path());
            self.cwd = node.path().clone();
        }
    }

    async fn handle_enter(&mut self) -> Result<(), IO::Error> {
        self.io.write_str("\r\n")?;
        let line = std::mem::take(&mut self.input_buffer);
        self.history.add(&line);

        let show_prompt = match self.execute(&line).await {
            Ok(response) => {
                self.write_formatted_response(&response)?;
                response.show_prompt
            }
            Err(err) => {
                self.io.write_str(&format!("*** {}\r\n", err))?;
                true
            }
        };

        if show_prompt && self.state == ShellState::Active {
            self.write_prompt()?;
        }
        Ok(())
    }

    /// Complete the command name (first word) or the path being typed.
    fn handle_tab(&mut self) -> Result<(), IO::Error> {
        let word_start = self
            .input_buffer
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8());

        let (head, token, result) = match word_start {
            None => {
                let mut result = suggest_commands(COMMANDS, &self.input_buffer);
                if result.is_complete {
                    result.completion.push(' ');
                }
                (String::new(), self.input_buffer.clone(), result)
            }
            Some(idx) => {
                let (head, token) = self.input_buffer.split_at(idx);
                let mut result = suggest_paths(self.ctx.tree(), &self.cwd, token);
                if result.is_directory {
                    result.completion.push('/');
                }
                (head.to_string(), token.to_string(), result)
            }
        };

        match result {
            CompletionResult {
                completion,
                is_complete: true,
                ..
            } => self.replace_token(&head, &completion),
            CompletionResult {
                completion,
                all_matches,
                ..
            } if !all_matches.is_empty() => {
                if completion.len() > token.len() {
                    self.input_buffer = format!("{}{}", head, completion);
                }
                self.io.write_str("\r\n")?;
                self.io.write_str(&all_matches.join("  "))?;
                self.io.write_str("\r\n")?;
                self.write_prompt()?;
                self.io.write_str(&self.input_buffer)
            }
            _ => self.io.put_char('\x07'),
        }
    }

    fn replace_token(&mut self, head: &str, completion: &str) -> Result<(), IO::Error> {
        let line = format!("{}{}", head, completion);
        if line.chars().count() > MAX_INPUT {
            return self.io.put_char('\x07');
        }
        self.input_buffer = line;
        self.clear_line_and_redraw()
    }

    fn write_prompt(&mut self) -> Result<(), IO::Error> {
        let prompt = self.prompt();
        self.io.write_str(&prompt)
    }

    /// Write a response, applying its formatting flags.
    fn write_formatted_response(&mut self, response: &Response) -> Result<(), IO::Error> {
        if response.clear_screen {
            self.io.write_str(CLEAR_SCREEN)?;
        }

        for (i, line) in response.message.split('\n').enumerate() {
            if i > 0 {
                self.io.write_str("\r\n")?;
            }
            if response.indent_message {
                self.io.write_str("  ")?;
            }
            self.io.write_str(line)?;
        }

        if response.postfix_newline {
            self.io.write_str("\r\n")?;
        }

        Ok(())
    }

    fn clear_line_and_redraw(&mut self) -> Result<(), IO::Error> {
        self.io.write_str("\r\x1b[K")?;
        self.write_prompt()?;
        self.io.write_str(&self.input_buffer)
    }
}

fn expect_args(args: &[&str], min: usize, max: usize) -> Result<(), ShellError> {
    if args.len() < min || args.len() > max {
        return Err(ShellError::InvalidArgumentCount {
            expected_min: min,
            expected_max: max,
            received: args.len(),
        });
    }
    Ok(())
}

/// Split off `flag`; any other option is a syntax error.
fn take_flag<'a>(line: &str, args: &[&'a str], flag: &str) -> Result<(bool, Vec<&'a str>), ShellError> {
    let mut found = false;
    let mut rest = Vec::with_capacity(args.len());
    for &arg in args {
        if arg == flag {
            found = true;
        } else if arg.len() > 1 && arg.starts_with('-') {
            return Err(ShellError::UnknownCommand(line.trim().to_string()));
        } else {
            rest.push(arg);
        }
    }
    Ok((found, rest))
}
