//! Command-line argument structures and enums

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flowdeck")]
#[command(version)]
#[command(about = "Inspect and compare Flowdeck workflow files", long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare two workflow files (JSON)
    Diff {
        /// The older workflow
        old: PathBuf,

        /// The newer workflow
        new: PathBuf,

        /// Compare links and comment boxes too, not only operators
        #[arg(short, long)]
        all: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the links of a workflow file against its operators' ports
    Validate {
        /// Workflow file (JSON)
        file: PathBuf,
    },

    /// Replay the delete/undo walkthrough between two in-process replicas
    Demo,

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
