use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

/// Unified error type for flowdeck operations.
///
/// Rejected interactive mutations (an invalid link, an edit while a
/// historical version is displayed) are reported as `Ok(false)` by the
/// mediator and never show up here. Everything in this enum is either an
/// invariant violation by the calling component or an I/O / decoding failure.
#[derive(Debug, Error)]
pub enum FlowdeckError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Graph invariant errors
    #[error("Operator '{0}' does not exist in the workflow graph")]
    OperatorNotFound(String),

    #[error("Link '{0}' does not exist in the workflow graph")]
    LinkNotFound(String),

    #[error("Comment box '{0}' does not exist in the workflow graph")]
    CommentBoxNotFound(String),

    #[error("Comment '{comment_id}' does not exist in comment box '{comment_box_id}'")]
    CommentNotFound {
        comment_box_id: String,
        comment_id: String,
    },

    #[error("Port '{port_id}' does not exist on operator '{operator_id}'")]
    PortNotFound {
        operator_id: String,
        port_id: String,
    },

    #[error("Element '{0}' already exists in the workflow graph")]
    DuplicateElement(String),

    #[error("No element with id '{0}' has a position on the canvas")]
    PositionNotFound(String),

    // History errors
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    // CRDT / sync errors
    #[error("CRDT error: {0}")]
    Crdt(String),

    #[error("Sync protocol error: {0}")]
    SyncProtocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    // Version history errors
    #[error("Version {version_id} not found for workflow '{workflow_id}'")]
    VersionNotFound { workflow_id: String, version_id: u64 },

    #[error("No historical version is being displayed")]
    NoVersionDisplayed,

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias for flowdeck operations
pub type Result<T> = std::result::Result<T, FlowdeckError>;

/// A serializable representation of FlowdeckError for the browser host
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Graph element the error refers to (if applicable)
    pub element_id: Option<String>,
}

impl From<&FlowdeckError> for SerializableError {
    fn from(err: &FlowdeckError) -> Self {
        let kind = match err {
            FlowdeckError::Io(_) => "Io",
            FlowdeckError::FileRead { .. } => "FileRead",
            FlowdeckError::FileWrite { .. } => "FileWrite",
            FlowdeckError::OperatorNotFound(_) => "OperatorNotFound",
            FlowdeckError::LinkNotFound(_) => "LinkNotFound",
            FlowdeckError::CommentBoxNotFound(_) => "CommentBoxNotFound",
            FlowdeckError::CommentNotFound { .. } => "CommentNotFound",
            FlowdeckError::PortNotFound { .. } => "PortNotFound",
            FlowdeckError::DuplicateElement(_) => "DuplicateElement",
            FlowdeckError::PositionNotFound(_) => "PositionNotFound",
            FlowdeckError::NothingToUndo => "NothingToUndo",
            FlowdeckError::NothingToRedo => "NothingToRedo",
            FlowdeckError::Crdt(_) => "Crdt",
            FlowdeckError::SyncProtocol(_) => "SyncProtocol",
            FlowdeckError::Transport(_) => "Transport",
            FlowdeckError::VersionNotFound { .. } => "VersionNotFound",
            FlowdeckError::NoVersionDisplayed => "NoVersionDisplayed",
            FlowdeckError::Json(_) => "Json",
            FlowdeckError::ConfigParse(_) => "ConfigParse",
            FlowdeckError::ConfigSerialize(_) => "ConfigSerialize",
            FlowdeckError::NoConfigDir => "NoConfigDir",
        }
        .to_string();

        let element_id = match err {
            FlowdeckError::OperatorNotFound(id)
            | FlowdeckError::LinkNotFound(id)
            | FlowdeckError::CommentBoxNotFound(id)
            | FlowdeckError::DuplicateElement(id)
            | FlowdeckError::PositionNotFound(id) => Some(id.clone()),
            FlowdeckError::CommentNotFound { comment_id, .. } => Some(comment_id.clone()),
            FlowdeckError::PortNotFound { operator_id, .. } => Some(operator_id.clone()),
            _ => None,
        };

        Self {
            kind,
            message: err.to_string(),
            element_id,
        }
    }
}

impl From<FlowdeckError> for SerializableError {
    fn from(err: FlowdeckError) -> Self {
        SerializableError::from(&err)
    }
}

impl FlowdeckError {
    /// Convert to a serializable representation for the browser host
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializable_error_carries_element_id() {
        let err = FlowdeckError::OperatorNotFound("op-1".to_string());
        let serializable = err.to_serializable();
        assert_eq!(serializable.kind, "OperatorNotFound");
        assert_eq!(serializable.element_id.as_deref(), Some("op-1"));
        assert!(serializable.message.contains("op-1"));
    }

    #[test]
    fn test_serializable_error_without_element() {
        let serializable = SerializableError::from(FlowdeckError::NothingToUndo);
        assert_eq!(serializable.kind, "NothingToUndo");
        assert!(serializable.element_id.is_none());
    }
}
