//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use alist_mirror::DEFAULT_WORKERS;
use alist_mirror::remote::DEFAULT_MAX_RETRIES;

/// Mirror an Alist file listing to local storage.
///
/// Video files become `.strm` pointer files; everything else is downloaded.
/// Progress is stored next to the output so interrupted runs resume.
#[derive(Parser, Debug)]
#[command(name = "alist-mirror")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mirror a remote directory tree into a local directory
    Sync(SyncArgs),

    /// Create an empty state database
    InitDb {
        /// Database file to create
        path: PathBuf,
    },

    /// Show processed directories and queued failures
    Status {
        /// Database file to inspect
        #[arg(long)]
        db: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
pub struct SyncArgs {
    /// Remote directory URL, e.g. http://nas:5244/Movies
    pub source_url: String,

    /// Local directory to mirror into (created if missing)
    #[arg(short, long)]
    pub output: PathBuf,

    /// State database path [default: <OUTPUT>/.alist-mirror.db]
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Maximum concurrent directory visits (1-100)
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: u8,

    /// Retries after the first attempt for listings and downloads (0-20)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=20))]
    pub max_retries: u8,

    /// Keep parents unprocessed while any subdirectory is unreachable
    #[arg(long)]
    pub strict_completion: bool,

    /// Disable per-file progress bars
    #[arg(long)]
    pub no_progress: bool,
}
