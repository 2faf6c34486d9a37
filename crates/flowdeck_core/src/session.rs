//! Per-client session state.
//!
//! A [`SessionContext`] is created when an editor opens and saved when it
//! closes. It carries what one client needs besides the replicated graph:
//! who the user is, the configuration, the local highlight set and the panel
//! layout. Only the user name and the panel layout are written to disk.

use std::path::Path;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::error::{FlowdeckError, Result};
use crate::highlight::HighlightSet;
use crate::model::Point;

/// Saved state of one side panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelState {
    #[serde(default)]
    pub open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

/// Panel name to panel state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelLayout(IndexMap<String, PanelState>);

impl PanelLayout {
    pub fn get(&self, panel: &str) -> Option<&PanelState> {
        self.0.get(panel)
    }

    pub fn set(&mut self, panel: impl Into<String>, state: PanelState) {
        self.0.insert(panel.into(), state);
    }

    pub fn is_open(&self, panel: &str) -> bool {
        self.0.get(panel).is_some_and(|state| state.open)
    }

    /// Flip a panel open/closed, returning the new state.
    pub fn toggle(&mut self, panel: &str) -> bool {
        let state = self.0.entry(panel.to_string()).or_default();
        state.open = !state.open;
        state.open
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The persisted part of a session.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_name: Option<String>,
    #[serde(default)]
    panels: PanelLayout,
}

/// Explicit per-client context handed to the components that need it.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Stable id of this client, used as the author of comments
    pub client_id: String,
    pub user_name: String,
    pub config: EditorConfig,
    /// Local selection, shared with the mediator
    pub highlights: Arc<Mutex<HighlightSet>>,
    pub panels: PanelLayout,
}

impl SessionContext {
    pub fn new(user_name: impl Into<String>, config: EditorConfig) -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().to_string(),
            user_name: user_name.into(),
            config,
            highlights: Arc::new(Mutex::new(HighlightSet::new())),
            panels: PanelLayout::default(),
        }
    }

    /// Start a session from the state saved at `path`.
    ///
    /// A missing file yields a fresh session. The user name falls back to the
    /// config's `user_name`, then to "Anonymous".
    pub fn load(path: &Path, config: EditorConfig) -> Result<Self> {
        let saved = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| FlowdeckError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;
            toml::from_str::<SessionFile>(&contents)?
        } else {
            SessionFile::default()
        };

        let user_name = saved
            .user_name
            .or_else(|| config.user_name.clone())
            .unwrap_or_else(|| "Anonymous".to_string());
        let mut session = Self::new(user_name, config);
        session.panels = saved.panels;
        log::debug!("Loaded session for '{}' from {:?}", session.user_name, path);
        Ok(session)
    }

    /// Persist the session at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = SessionFile {
            user_name: Some(self.user_name.clone()),
            panels: self.panels.clone(),
        };
        let contents = toml::to_string_pretty(&file)?;
        std::fs::write(path, contents).map_err(|e| FlowdeckError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig {
            user_name: Some("grace".to_string()),
            ..Default::default()
        };
        let session = SessionContext::load(&dir.path().join("session.toml"), config).unwrap();
        assert_eq!(session.user_name, "grace");
        assert!(session.panels.is_empty());
    }

    #[test]
    fn test_panels_survive_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");

        let mut session = SessionContext::new("ada", EditorConfig::default());
        session.panels.set(
            "properties",
            PanelState {
                open: true,
                width: Some(320.0),
                position: Some(Point::new(10.0, 20.0)),
            },
        );
        session.panels.toggle("versions");
        session.save(&path).unwrap();

        let loaded = SessionContext::load(&path, EditorConfig::default()).unwrap();
        assert_eq!(loaded.user_name, "ada");
        assert_eq!(loaded.panels, session.panels);
        assert!(loaded.panels.is_open("versions"));
        // Client ids are per run, not persisted
        assert_ne!(loaded.client_id, session.client_id);
    }
}
