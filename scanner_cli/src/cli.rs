//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "filmscan", version, about = "8mm film scanner CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/scanner_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Drive the real GPIO transport instead of the simulated devices
    /// (requires a build with the `hardware` feature)
    #[arg(long, action = ArgAction::SetTrue)]
    pub hardware: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a reel frame by frame into a directory
    Scan {
        /// Directory receiving the frames and the session log
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
        /// Number of frames to scan
        #[arg(short = 'n', long, value_name = "FRAMES", default_value_t = 3900)]
        frames: u32,
        /// Resume a partial reel: first frame index to capture
        #[arg(long, value_name = "INDEX", default_value_t = 0)]
        start_index: u32,
    },
    /// Advance the film by one or more frames
    Advance {
        #[arg(short = 'n', long, value_name = "FRAMES", default_value_t = 1)]
        frames: u32,
    },
    /// Run the transport forward until Ctrl-C (or for a fixed time)
    FastForward {
        /// Stop automatically after this many seconds
        #[arg(long, value_name = "SECS")]
        seconds: Option<u64>,
    },
    /// Toggle the backlight
    Light,
    /// Print the scanner state as JSON
    Status,
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
