//! CLI interface for Flowr
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for the Flowr engine.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Flowr Orchestration Engine
///
/// Takes one free-form instruction, decomposes it into typed subtasks,
/// dispatches them concurrently to the structured-operations and
/// natural-language workers, and merges the results into one deliverable.
#[derive(Parser, Debug)]
#[command(name = "flowr")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
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
    /// Process one instruction and print the deliverable
    Run {
        /// The instruction to process
        instruction: String,

        /// Session id providing context continuity across runs
        #[arg(short, long, default_value = "default")]
        session: String,
    },

    /// Show recent run history
    History {
        /// Number of runs to show (default: 10)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Manage sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Session management actions
#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Show a session's tone, turn count, and recent deliverables
    Show {
        /// Session id
        id: String,
    },

    /// Set a session's tone preference
    Tone {
        /// Session id
        id: String,

        /// Tone: professional, friendly, executive, or technical
        tone: String,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the active configuration
    Show,

    /// Write a default configuration file
    Init,
}
