//! Config command handlers

use std::path::PathBuf;

use flowdeck_core::config::EditorConfig;

use crate::cli::args::ConfigCommands;
use crate::cli::load_config;

pub fn handle_config_command(command: Option<ConfigCommands>, path_override: Option<PathBuf>) -> bool {
    let path = path_override.or_else(EditorConfig::config_path);

    match command {
        None | Some(ConfigCommands::Show) => show_config(path),
        Some(ConfigCommands::Init { force }) => init_config(path, force),
    }
}

fn show_config(path: Option<PathBuf>) -> bool {
    let config = load_config(path.as_deref());
    println!("Flowdeck Configuration");
    println!("======================");
    if let Some(ref path) = path {
        let state = if path.exists() { "" } else { " (not created)" };
        println!("Config file: {}{}", path.display(), state);
    }
    match config.to_toml_string() {
        Ok(toml) => {
            println!();
            print!("{}", toml);
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}

fn init_config(path: Option<PathBuf>, force: bool) -> bool {
    let Some(path) = path else {
        eprintln!("✗ Could not determine config directory");
        return false;
    };
    if path.exists() && !force {
        eprintln!(
            "Config already exists at {}. Use --force to overwrite.",
            path.display()
        );
        return false;
    }
    match EditorConfig::default().save_to(&path) {
        Ok(()) => {
            println!("✓ Wrote {}", path.display());
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_defaults_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flowdeck").join("config.toml");

        assert!(init_config(Some(path.clone()), false));
        assert_eq!(
            EditorConfig::load_from(&path).unwrap(),
            EditorConfig::default()
        );

        // A second init needs --force
        assert!(!init_config(Some(path.clone()), false));
        assert!(init_config(Some(path.clone()), true));
        assert!(show_config(Some(path)));
    }

    #[test]
    fn test_init_without_location_fails() {
        assert!(!init_config(None, true));
    }
}
