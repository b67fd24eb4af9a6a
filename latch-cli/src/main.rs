//! Latch terminal host
//!
//! Runs the passcode lock screen in a terminal. Each line read from stdin is
//! treated as a sequence of keypad presses: digits are entered, `-` is the
//! delete/cancel key.
//!
//! ```text
//! latch set          choose and confirm a passcode
//! latch authorize    ask for the stored passcode
//! latch status       show whether a passcode is stored
//! latch reset        delete the stored passcode
//! ```

mod terminal;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use latch_core::{
    load_config, Key, LatchConfig, Outcome, PasscodeController, StoragePaths,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use terminal::{Signal, TerminalView};

/// Numeric passcode lock screen
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding the passcode file
    #[arg(long, default_value = ".latch")]
    data_dir: PathBuf,

    /// Default passcode list copied into the data directory on first use
    #[arg(long)]
    seed: Option<PathBuf>,

    /// JSON configuration file (defaults are used if omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Choose and confirm a new passcode
    Set,
    /// Ask for the stored passcode
    Authorize,
    /// Show whether a passcode is stored
    Status,
    /// Delete the stored passcode
    Reset,
}

fn load_latch_config(path: Option<&PathBuf>) -> Result<LatchConfig> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => Ok(LatchConfig::default()),
    }
}

/// Forward stdin lines from a dedicated thread so a pending read never
/// blocks runtime shutdown.
fn spawn_keypad() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Feed keypad input to the controller until the lock screen is dismissed.
///
/// Returns the outcome reported before dismissal, or `None` if the session
/// was cancelled or input ended first.
async fn run_session(
    controller: &PasscodeController,
    signals: &mut mpsc::UnboundedReceiver<Signal>,
) -> Result<Option<Outcome>> {
    let mut keypad = spawn_keypad();
    let mut input_open = true;
    let mut outcome = None;

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(Signal::Outcome(o)) => {
                    debug!("Session outcome: {:?}", o);
                    outcome = Some(o);
                }
                Some(Signal::Dismissed) | None => return Ok(outcome),
            },
            line = keypad.recv(), if input_open => match line {
                Some(line) => {
                    let line = line.context("Failed to read keypad input")?;
                    for c in line.trim().chars() {
                        match Key::try_from(c) {
                            Ok(key) => controller.key_pressed(key),
                            Err(e) => warn!("Ignoring key: {}", e),
                        }
                    }
                }
                None => {
                    info!("Input closed, dismissing lock screen");
                    input_open = false;
                    controller.dismiss();
                }
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "latch_cli=info,latch_core=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_latch_config(args.config.as_ref())?;

    let mut paths = StoragePaths::new(&args.data_dir, &config.storage_file);
    if let Some(seed) = &args.seed {
        paths = paths.with_seed(seed);
    }

    let (tx, mut signals) = mpsc::unbounded_channel();
    let terminal = Arc::new(TerminalView::new(config.clone(), tx));
    let controller = PasscodeController::new(
        &config,
        &paths,
        terminal.clone(),
        terminal,
        Handle::current(),
    );

    match args.command {
        Command::Status => {
            let status = if controller.is_passcode_set() {
                "set"
            } else {
                "not set"
            };
            println!("Passcode {} ({:?})", status, paths.file);
            return Ok(());
        }
        Command::Reset => {
            controller
                .clear_passcode()
                .context("Failed to clear passcode")?;
            println!("Passcode cleared");
            return Ok(());
        }
        Command::Set => controller.set_passcode(),
        Command::Authorize => controller
            .authorize()
            .context("Cannot authorize; run `latch set` first")?,
    }

    match (args.command, run_session(&controller, &mut signals).await?) {
        (_, Some(Outcome::Granted)) => println!("Access granted"),
        (_, Some(Outcome::Set)) => println!("Passcode set"),
        (_, Some(Outcome::Failed(reason))) => bail!("Lock screen failed: {}", reason),
        (Command::Set, None) => bail!("Set passcode cancelled"),
        (_, None) => bail!("Authorization cancelled"),
    }

    Ok(())
}
