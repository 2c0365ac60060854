//! Command line interface built on clap.
//!
//! [`Cli`] carries the global overrides (`--config`, `--workers`,
//! `--max-attempts`, `--verbose`) and one [`Command`].

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Uploads a folder of videos into Bunny Stream collections.
#[derive(Debug, Parser)]
#[command(name = "stream-uploader", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./stream-uploader.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of uploads running at once.
    #[arg(long, short, global = true)]
    pub workers: Option<usize>,

    /// Attempts per step before a job is marked failed.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Log every attempt to stderr instead of drawing a progress bar.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Uploads every matching video in the directory.
    Upload {
        /// Source directory (overrides `source_dir`).
        dir: Option<PathBuf>,

        /// Keep local files after a successful upload.
        #[arg(long)]
        keep_files: bool,

        /// Write per-job results as JSON to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Lists the collection and title derived for each file, without uploading.
    Scan {
        /// Source directory (overrides `source_dir`).
        dir: Option<PathBuf>,
    },
}
