//! Command line parsing.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "montage", about = "Headless timeline player", version)]
pub struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Print the format of a media file
    Probe {
        path: String,
    },
    /// Play a source through the pipeline
    Play(PlayArgs),
    /// Print the effective pipeline configuration
    Config,
}

#[derive(Debug, Clone, PartialEq, Args)]
pub struct PlayArgs {
    /// Media file or synthetic:<seconds>
    pub source: String,

    /// Seconds of the source to play; the whole source when omitted
    #[arg(long)]
    pub seconds: Option<f64>,

    /// Playhead start, seconds
    #[arg(long, default_value_t = 0.0)]
    pub from: f64,

    #[arg(long)]
    pub backward: bool,

    /// Project frame rate; the source's when omitted
    #[arg(long)]
    pub fps: Option<u32>,

    /// Built-in filter applied to the clip, by name
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Render through wgpu when an adapter is available
    #[arg(long)]
    pub gpu: bool,
}
