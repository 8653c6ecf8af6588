//! Command-line entry point for the IFS operator console.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ifs_console::config::Settings;
use ifs_console::detector::{next_filename, DetectorConsole, ReadMode};
use ifs_console::dispatch::{CommandDispatcher, ShellDispatcher};
use ifs_console::engine::SyncEngine;
use ifs_console::mechanism::{MechanismController, Selection};
use ifs_console::state::InstrumentState;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "ifs-console",
    about = "Operator console and state-synchronization engine for the IFS instrument"
)]
struct Cli {
    /// Configuration file (default: ifs-console.toml in the working dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the session TARGET field.
    #[arg(long)]
    target: Option<String>,

    /// Override the session OBSERVER field.
    #[arg(long)]
    observer: Option<String>,

    /// Override the session COMMENTS field.
    #[arg(long)]
    comments: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the data directory and tag new files (the default).
    Run,
    /// Move one mechanism to a position label or raw encoder target.
    Move {
        /// Mechanism name as configured, e.g. "Filter".
        mechanism: String,
        /// Position label (discrete) or integer target (continuous).
        position: String,
    },
    /// Print the current header keywords and mechanism positions.
    Status,
    /// Start the detector server and initialize the hardware.
    Init,
    /// Configure and take exposures, auto-incrementing the filename.
    Expose {
        /// Integration time in seconds.
        #[arg(long, default_value_t = 1.4)]
        itime: f64,
        /// Readout as "mode nreads ncoadds" (modes: 1=single, 2=CDS,
        /// 3=MCDS, 4=UTR).
        #[arg(long, default_value = "2 1 1")]
        mode: String,
        /// Output directory for the frames (default: today's date, e.g.
        /// 250823).
        #[arg(long)]
        dir: Option<String>,
        /// Base filename; a trailing counter is incremented per frame.
        #[arg(long, default_value = "test0001")]
        name: String,
        /// Number of exposures to take.
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Shut the detector server down.
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(target) = cli.target {
        settings.session.target = target;
    }
    if let Some(observer) = cli.observer {
        settings.session.observer = observer;
    }
    if let Some(comments) = cli.comments {
        settings.session.comments = comments;
    }

    let dispatcher: Arc<dyn CommandDispatcher> = Arc::new(ShellDispatcher::new());

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("Starting the IFS operator console.");
            let mut engine = SyncEngine::new(&settings, dispatcher)?;
            engine.state().log_keywords();
            engine.run().await;
        }
        Command::Move {
            mechanism,
            position,
        } => {
            let mut state =
                InstrumentState::new(settings.mechanism_states(), settings.session.to_session());
            let controller =
                MechanismController::new(dispatcher.as_ref(), &settings.console.move_program);
            let value = state
                .move_mechanism(&mechanism, &Selection::Raw(position), &controller)
                .with_context(|| format!("move of '{mechanism}' failed"))?;
            info!("{mechanism} now at {value}");
        }
        Command::Status => {
            let state =
                InstrumentState::new(settings.mechanism_states(), settings.session.to_session());
            state.log_keywords();
        }
        Command::Init => {
            let detector = DetectorConsole::new(dispatcher.as_ref(), &settings.console);
            let code = detector.initialize()?;
            if code != 0 {
                bail!("detector initialization returned exit code {code}");
            }
        }
        Command::Expose {
            itime,
            mode,
            dir,
            name,
            count,
        } => {
            let mode: ReadMode = mode
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("invalid --mode")?;
            let detector = DetectorConsole::new(dispatcher.as_ref(), &settings.console);
            detector.configure(itime, &mode)?;

            let dir = dir.unwrap_or_else(ifs_console::detector::default_output_dir);
            let mut base = name;
            for _ in 0..count {
                let out_path = format!("{dir}/{base}.fits");
                detector.take_exposure(&out_path)?;
                // The counter advances regardless of the exit code; the
                // code is already in the log.
                match next_filename(&base) {
                    Some(next) => base = next,
                    None => break,
                }
            }
        }
        Command::Shutdown => {
            let detector = DetectorConsole::new(dispatcher.as_ref(), &settings.console);
            detector.shutdown()?;
        }
    }
    Ok(())
}
