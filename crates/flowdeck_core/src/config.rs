//! Editor configuration.
//!
//! [`EditorConfig`] holds the tunables of the collaborative core and is
//! persisted as TOML (typically at `~/.config/flowdeck/config.toml` on Unix
//! systems). Every field has a default, so a partial file is valid.
//!
//! # Example
//!
//! ```ignore
//! use flowdeck_core::config::EditorConfig;
//!
//! let config = EditorConfig::load()?;
//! let radius = config.suggestion_radius;
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::crdt::{DEFAULT_AWARENESS_TIMEOUT_MS, DEFAULT_UNDO_CAPACITY};
use crate::error::{FlowdeckError, Result};
use crate::model::ElementClass;

/// Default distance (canvas units) within which operators are suggested for auto-linking.
pub const DEFAULT_SUGGESTION_RADIUS: f64 = 300.0;

fn default_suggestion_radius() -> f64 {
    DEFAULT_SUGGESTION_RADIUS
}

fn default_undo_capacity() -> usize {
    DEFAULT_UNDO_CAPACITY
}

fn default_diff_element_classes() -> Vec<ElementClass> {
    vec![ElementClass::Operators]
}

fn default_awareness_timeout_ms() -> i64 {
    DEFAULT_AWARENESS_TIMEOUT_MS
}

/// User-configurable settings of the workflow editor core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Radius used by the placement suggester while dragging an operator
    #[serde(default = "default_suggestion_radius")]
    pub suggestion_radius: f64,

    /// Maximum number of undo steps kept per client
    #[serde(default = "default_undo_capacity")]
    pub undo_capacity: usize,

    /// Element classes compared by the version diff.
    /// Only operators by default; links and comment boxes can be added.
    #[serde(default = "default_diff_element_classes")]
    pub diff_element_classes: Vec<ElementClass>,

    /// Time after which a silent collaborator's presence is dropped
    #[serde(default = "default_awareness_timeout_ms")]
    pub awareness_timeout_ms: i64,

    // ========================================================================
    // Collaboration
    // ========================================================================
    /// Shared-editing endpoint (e.g., "wss://collab.example.org")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_server_url: Option<String>,

    /// Name shown to collaborators
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            suggestion_radius: DEFAULT_SUGGESTION_RADIUS,
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            diff_element_classes: default_diff_element_classes(),
            awareness_timeout_ms: DEFAULT_AWARENESS_TIMEOUT_MS,
            sync_server_url: None,
            user_name: None,
        }
    }
}

impl EditorConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Render as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| FlowdeckError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = self.to_toml_string()?;
        std::fs::write(path, contents).map_err(|e| FlowdeckError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Whether the version diff compares the given element class.
    pub fn diffs(&self, class: ElementClass) -> bool {
        self.diff_element_classes.contains(&class)
    }
}

// ============================================================================
// Native-only implementation (not available in WASM)
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
impl EditorConfig {
    /// Get the config file path (~/.config/flowdeck/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("flowdeck").join("config.toml"))
    }

    /// Load config from the default location, or return the default if the file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }
        Ok(EditorConfig::default())
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(FlowdeckError::NoConfigDir)?;
        self.save_to(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.suggestion_radius, 300.0);
        assert_eq!(config.undo_capacity, 100);
        assert_eq!(config.diff_element_classes, vec![ElementClass::Operators]);
        assert!(config.diffs(ElementClass::Operators));
        assert!(!config.diffs(ElementClass::Links));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EditorConfig::from_toml_str(
            r#"
suggestion_radius = 150.0
diff_element_classes = ["operators", "links"]
"#,
        )
        .unwrap();
        assert_eq!(config.suggestion_radius, 150.0);
        assert_eq!(config.undo_capacity, DEFAULT_UNDO_CAPACITY);
        assert!(config.diffs(ElementClass::Links));
    }

    #[test]
    fn test_unknown_element_class_is_rejected() {
        assert!(EditorConfig::from_toml_str(r#"diff_element_classes = ["groups"]"#).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = EditorConfig {
            user_name: Some("ada".to_string()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(EditorConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = EditorConfig::load_from(Path::new("/nonexistent/flowdeck.toml")).unwrap_err();
        assert!(matches!(err, FlowdeckError::FileRead { .. }));
    }
}
