#![doc = include_str!("../README.md")]

/// Configuration options
pub mod config;

/// Replicated graph store, undo history, presence and room sync
pub mod crdt;

/// Error (common error types)
pub mod error;

/// Typed publish/subscribe channels
pub mod events;

/// Local selection state
pub mod highlight;

/// Mediator (the single entry point for graph mutations)
pub mod mediator;

/// Workflow graph data model
pub mod model;

/// Auto-link suggestions during drag placement
pub mod placement;

pub mod schema;

/// Per-client session context
pub mod session;

/// Link validation
pub mod validation;

/// Version history, diff and display
pub mod version;

/// Renderer bridge
pub mod visual;

pub use error::{FlowdeckError, Result};
