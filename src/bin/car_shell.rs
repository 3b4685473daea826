//! `car-shell` command-line front end.
//!
//! ```bash
//! car-shell demos/config.json                 # interactive shell
//! car-shell demos/config.json get /garage/WVWZZZ1JZ3W386752/odometer
//! car-shell demos/config.json list -s
//! car-shell demos/config.json events
//! ```

use anyhow::{Context as _, Result, bail};
use car_shell::dispatch::{Command, dispatch};
use car_shell::{Config, Context, FileBackend, Format, Shell};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use clap::{ArgAction, Parser, Subcommand};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, is_raw_mode_enabled};
use env_logger::Env;
use log::{Level, LevelFilter};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const DEFAULT_LOG_FORMAT: &str = "{time}:{level}:{message}";
const DEFAULT_LOG_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Parser)]
#[command(version, about = "Shell and one-shot commands over a vehicle telemetry tree", long_about = None)]
struct Cli {
    /// Configuration file (JSON, or TOML with a .toml extension)
    #[arg(value_name = "FILE")]
    config: PathBuf,

    /// More log output; repeat for more (-v warn, -vv info, -vvv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Suppress consecutive identical log lines
    #[arg(long)]
    hide_repeated_log: bool,

    /// Log line template with {time}, {level}, {target} and {message}
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_LOG_FORMAT)]
    logging_format: String,

    /// strftime format of {time} in log lines
    #[arg(long, value_name = "FORMAT", default_value = DEFAULT_LOG_DATE_FORMAT)]
    logging_date_format: String,

    /// Seconds a fetched value stays fresh (overrides the file)
    #[arg(long, value_name = "SECONDS")]
    max_age: Option<u64>,

    /// Ask the backend on every read
    #[arg(long)]
    no_cache: bool,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// List attribute paths
    #[command(visible_alias = "l")]
    List {
        /// Subtree to list (default: /)
        path: Option<String>,

        /// Only attributes that can be set
        #[arg(short, long)]
        setters: bool,
    },

    /// Print an attribute or subtree
    #[command(visible_alias = "g")]
    Get {
        /// Attribute path
        path: String,

        /// Output format
        #[arg(long, default_value_t = Format::String)]
        format: Format,
    },

    /// Change an attribute
    #[command(visible_alias = "s")]
    Set {
        /// Attribute path
        path: String,

        /// New value
        #[arg(required = true, num_args = 1..)]
        value: Vec<String>,
    },

    /// Write a subtree as JSON to a file
    Save {
        /// Subtree to save
        path: String,

        /// Destination file
        file: PathBuf,
    },

    /// Print changes until interrupted
    #[command(visible_alias = "e")]
    Events,

    /// Interactive shell (the default)
    #[command(visible_alias = "sh")]
    Shell,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = match LogFormat::new(
        cli.logging_format.clone(),
        cli.logging_date_format.clone(),
        cli.hide_repeated_log,
    ) {
        Ok(format) => format,
        Err(err) => {
            eprintln!("*** {:#}", err);
            return ExitCode::from(2);
        }
    };
    init_logging(cli.verbose, format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("*** {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, format: LogFormat) {
    let default_level = match verbose {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    builder.format(move |buf, record| {
        let line = format.line(
            &Local::now(),
            record.level(),
            record.target(),
            &record.args().to_string(),
        );
        let Some(line) = line else {
            return Ok(());
        };
        // Raw mode does not translate \n, the shell session needs \r\n
        let eol = if is_raw_mode_enabled().unwrap_or(false) {
            "\r\n"
        } else {
            "\n"
        };
        write!(buf, "{}{}", line, eol)
    });

    let _ = builder.try_init();
}

/// Layout of log lines, set by `--logging-format` and `--logging-date-format`.
///
/// The template knows `{time}`, `{level}`, `{target}` and `{message}`.
#[derive(Debug)]
struct LogFormat {
    template: String,
    date_format: String,
    hide_repeated: bool,
    last: Mutex<Option<(String, String)>>,
}

impl LogFormat {
    fn new(template: String, date_format: String, hide_repeated: bool) -> Result<Self> {
        if StrftimeItems::new(&date_format).any(|item| matches!(item, Item::Error)) {
            bail!("invalid --logging-date-format '{}'", date_format);
        }
        if !template.contains("{message}") {
            bail!("--logging-format '{}' has no {{message}}", template);
        }
        Ok(Self {
            template,
            date_format,
            hide_repeated,
            last: Mutex::new(None),
        })
    }

    /// Rendered line without terminator, `None` for a hidden repeat.
    fn line(&self, time: &DateTime<Local>, level: Level, target: &str, message: &str) -> Option<String> {
        if self.hide_repeated {
            let entry = (target.to_string(), message.to_string());
            let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if last.as_ref() == Some(&entry) {
                return None;
            }
            *last = Some(entry);
        }

        // Message last, so braces inside it are left alone
        let line = self
            .template
            .replace("{time}", &time.format(&self.date_format).to_string())
            .replace("{level}", level.as_str())
            .replace("{target}", target);
        Some(line.replace("{message}", message))
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)?;
    if let Some(max_age) = cli.max_age {
        config.max_age = max_age;
    }
    if cli.no_cache {
        config.no_cache = true;
    }

    let Some(file) = config.backend.file.clone() else {
        bail!("{}: backend.file is not set", cli.config.display());
    };
    log::info!("serving vehicle data from {}", file.display());

    let ctx = Context::new(Arc::new(FileBackend::new(file)), &config);
    ctx.sync_topology()
        .await
        .context("could not load the vehicle tree")?;

    let mut stdout = io::stdout();
    let command = match cli.command.unwrap_or(CliCommand::Shell) {
        CliCommand::Shell => return run_shell(&ctx).await,
        CliCommand::Events => {
            let poller = ctx.spawn_poller(config.poll_interval());
            let result = dispatch(&ctx, Command::Events, &mut stdout, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;
            poller.abort();
            return Ok(result?);
        }
        CliCommand::List { path, setters } => Command::List { path, setters },
        CliCommand::Get { path, format } => Command::Get { path, format },
        CliCommand::Set { path, value } => Command::Set { path, value },
        CliCommand::Save { path, file } => Command::Save {
            path: Some(path),
            file,
        },
    };

    dispatch(&ctx, command, &mut stdout, std::future::pending()).await?;
    Ok(())
}

/// Restores the terminal when dropped, also on error paths.
struct RawModeGuard;

impl RawModeGuard {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

async fn run_shell(ctx: &Context<FileBackend>) -> Result<()> {
    let _raw_mode_guard = RawModeGuard::new().context("could not switch the terminal to raw mode")?;

    // Blocking stdin reads stay off the runtime
    let (keys_tx, mut keys_rx) = mpsc::channel::<char>(64);
    std::thread::spawn(move || read_keys(keys_tx));

    let mut shell = Shell::new(ctx, io::stdout());
    shell.activate()?;

    while let Some(c) = keys_rx.recv().await {
        shell.process_char(c).await?;
        if shell.is_terminated() {
            break;
        }
    }
    Ok(())
}

/// Forward stdin as characters until EOF or the shell goes away.
fn read_keys(keys: mpsc::Sender<char>) {
    let mut stdin = io::stdin().lock();
    let mut pending: Vec<u8> = Vec::with_capacity(4);
    let mut byte = [0u8; 1];

    loop {
        match stdin.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => pending.push(byte[0]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                log::error!("reading stdin: {}", err);
                break;
            }
        }

        let chars: Vec<char> = match std::str::from_utf8(&pending) {
            Ok(text) => text.chars().collect(),
            // Incomplete multi-byte sequence
            Err(err) if err.error_len().is_none() => continue,
            Err(_) => Vec::new(),
        };
        pending.clear();

        for c in chars {
            if keys.blocking_send(c).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn default_format(hide_repeated: bool) -> LogFormat {
        LogFormat::new(
            DEFAULT_LOG_FORMAT.to_string(),
            DEFAULT_LOG_DATE_FORMAT.to_string(),
            hide_repeated,
        )
        .unwrap()
    }

    #[test]
    fn test_default_log_line() {
        let line = default_format(false).line(&noon(), Level::Warn, "car_shell::cache", "refresh failed");
        assert_eq!(line.as_deref(), Some("2026-10-16 12:00:00.000:WARN:refresh failed"));
    }

    #[test]
    fn test_custom_log_format() {
        let format = LogFormat::new("[{level}] {target} {time}: {message}".into(), "%H:%M".into(), false).unwrap();
        let line = format.line(&noon(), Level::Info, "car_shell::bus", "value is {level}");
        assert_eq!(line.as_deref(), Some("[INFO] car_shell::bus 12:00: value is {level}"));
    }

    #[test]
    fn test_repeated_lines_hidden() {
        let format = default_format(true);
        assert!(format.line(&noon(), Level::Warn, "a", "poll failed").is_some());
        assert!(format.line(&noon(), Level::Warn, "a", "poll failed").is_none());
        assert!(format.line(&noon(), Level::Warn, "b", "poll failed").is_some());
        assert!(format.line(&noon(), Level::Warn, "a", "poll failed").is_some());

        let format = default_format(false);
        assert!(format.line(&noon(), Level::Warn, "a", "poll failed").is_some());
        assert!(format.line(&noon(), Level::Warn, "a", "poll failed").is_some());
    }

    #[test]
    fn test_bad_log_formats_rejected() {
        assert!(LogFormat::new("{time}".into(), DEFAULT_LOG_DATE_FORMAT.into(), false).is_err());
        assert!(LogFormat::new(DEFAULT_LOG_FORMAT.into(), "%Q".into(), false).is_err());
    }

    #[test]
    fn test_logging_flags_parse() {
        let cli = Cli::try_parse_from([
            "car-shell",
            "config.json",
            "--logging-format",
            "{level} {message}",
            "--logging-date-format",
            "%H:%M:%S",
            "-vv",
            "list",
        ])
        .unwrap();
        assert_eq!(cli.logging_format, "{level} {message}");
        assert_eq!(cli.logging_date_format, "%H:%M:%S");
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["car-shell", "config.json"]).unwrap();
        assert_eq!(cli.logging_format, DEFAULT_LOG_FORMAT);
        assert!(cli.command.is_none());
    }
}
