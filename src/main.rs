// Offline tooling entry point
//
// The live recorder is driven in-process by the jam server through
// `RecorderController`; this binary exposes the one offline operation: the
// reconstruction of a project file from a session directory's contents.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use jamrec::recorder::project::{output_path, render_project, write_output, PROJECT_EXTENSION};
use jamrec::recorder::scan::scan_session_dir;
use jamrec::recorder::types::{DEFAULT_FRAME_SIZE, DEFAULT_SAMPLE_RATE};

#[derive(Parser)]
#[command(name = "jamrec", about = "Jam session recording tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild the project file for a session from its directory contents
    Regenerate {
        /// Session directory holding the recorded track files
        session_dir: PathBuf,
        /// Samples per frame per audio channel used during the session
        #[arg(long, default_value_t = DEFAULT_FRAME_SIZE)]
        frame_size: usize,
        /// Sample rate of the session in Hz
        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Regenerate {
            session_dir,
            frame_size,
            sample_rate,
        } => regenerate(session_dir, frame_size, sample_rate),
    }
}

fn regenerate(session_dir: PathBuf, frame_size: usize, sample_rate: u32) -> Result<()> {
    if frame_size == 0 {
        bail!("frame size cannot be zero");
    }
    if !session_dir.is_dir() {
        bail!(
            "{} does not exist or is not a directory",
            session_dir.display()
        );
    }

    let base_name = session_dir
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", session_dir.display()))?
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("session directory has no name")?;

    let tracks = scan_session_dir(&session_dir, frame_size)
        .with_context(|| format!("cannot scan {}", session_dir.display()))?;

    let target = output_path(&session_dir, &base_name, PROJECT_EXTENSION);
    let content = render_project(&tracks, sample_rate, frame_size);
    write_output(&target, &content)?;

    info!(
        "regenerated {} from {} track files",
        target.display(),
        tracks.values().map(Vec::len).sum::<usize>()
    );
    Ok(())
}
