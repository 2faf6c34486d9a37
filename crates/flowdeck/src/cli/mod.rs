/// Clap argument definitions
mod args;

/// Config command handlers
mod config;

/// Two-replica walkthrough
mod demo;

/// `flowdeck diff`
mod diff;

/// `flowdeck validate`
mod validate;

use clap::Parser;
use std::path::{Path, PathBuf};

use flowdeck_core::config::EditorConfig;
use flowdeck_core::model::WorkflowContent;

pub use args::Cli;
use args::Commands;

/// Main entry point for the CLI
pub fn run_cli() {
    let cli = Cli::parse();

    let success = match cli.command {
        Commands::Diff {
            old,
            new,
            all,
            json,
        } => diff::handle_diff(&old, &new, all, json, &load_config(cli.config.as_deref())),

        Commands::Validate { file } => validate::handle_validate(&file),

        Commands::Demo => demo::handle_demo(&load_config(cli.config.as_deref())),

        Commands::Config { command } => config::handle_config_command(command, cli.config),
    };

    if !success {
        std::process::exit(1);
    }
}

/// Load the config from `path`, or the default location, falling back to defaults.
fn load_config(path: Option<&Path>) -> EditorConfig {
    let loaded = match path {
        Some(path) => EditorConfig::load_from(path),
        None => EditorConfig::load(),
    };
    loaded.unwrap_or_else(|e| {
        log::debug!("using default config: {}", e);
        EditorConfig::default()
    })
}

/// Read a workflow JSON file, reporting failures on stderr.
fn read_workflow(path: &PathBuf) -> Option<WorkflowContent> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("✗ Failed to read '{}': {}", path.display(), e);
            return None;
        }
    };
    match WorkflowContent::from_json(&json) {
        Ok(content) => Some(content),
        Err(e) => {
            eprintln!("✗ '{}' is not a workflow: {}", path.display(), e);
            None
        }
    }
}
