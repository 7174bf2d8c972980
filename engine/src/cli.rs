//! CLI interface for Ludo
//!
//! This module provides the command-line interface using clap's derive
//! API. The speech layer normally feeds utterances in over the device
//! channel; the CLI exists for development and for driving the engine
//! from scripts.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Ludo voice-assistant engine
///
/// Resolves natural-language game requests into launch commands for a
/// remote game-launching appliance.
#[derive(Parser, Debug)]
#[command(name = "ludo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output run reports in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve and dispatch a single utterance, then exit
    Ask {
        /// The utterance to resolve (e.g. "play super mario world")
        utterance: String,
    },

    /// Read utterances from stdin, one per line, until EOF
    Serve,
}
