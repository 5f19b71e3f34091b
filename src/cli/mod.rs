//! CLI Module
//!
//! Command-line front end over the codec: validate, inspect and round-trip
//! DAWProject XML files.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DAWProject XML tool
#[derive(Parser, Debug)]
#[command(name = "dawproject-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode and validate project files
    #[command(name = "validate")]
    Validate {
        /// Files or directories (searched recursively for *.xml)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print a summary of a project
    #[command(name = "inspect")]
    Inspect {
        /// Path to the project file
        path: PathBuf,

        /// Dump the decoded project as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode, re-encode and compare fingerprints
    #[command(name = "roundtrip")]
    Roundtrip {
        /// Path to the project file
        path: PathBuf,
    },

    /// Write a small two-track example project
    #[command(name = "demo")]
    Demo {
        /// Output file
        output: PathBuf,
    },
}
