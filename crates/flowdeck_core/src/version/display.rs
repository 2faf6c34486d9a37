//! Read-only display of a historical version over the live graph.
//!
//! Displaying a version parks the live content as the mediator's temporary
//! workflow, disables modification, drops undo history and swaps the
//! historical snapshot in. The live store keeps replicating underneath.
//! Closing swaps it back; restoring writes the displayed content into the
//! live graph as one ordinary replicated edit.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use ts_rs::TS;

use super::diff::{Decoration, DiffResult, VersionDiffEngine};
use super::VersionHistoryApi;
use crate::error::{FlowdeckError, Result};
use crate::events::EventChannel;
use crate::mediator::GraphActionMediator;
use crate::model::WorkflowContent;

/// Decoration changes for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", content = "decorations")]
pub enum DecorationEvent {
    /// Replace all decorations with these
    Show(Vec<Decoration>),
    Clear,
}

#[derive(Debug, Clone)]
struct DisplayedVersion {
    workflow_id: String,
    version_id: u64,
    content: WorkflowContent,
    diff: DiffResult,
}

/// Drives the display and restore of historical versions.
pub struct VersionDisplay {
    mediator: Arc<GraphActionMediator>,
    engine: VersionDiffEngine,
    api: Arc<dyn VersionHistoryApi>,
    displayed: Mutex<Option<DisplayedVersion>>,
    events: EventChannel<DecorationEvent>,
}

impl VersionDisplay {
    pub fn new(
        mediator: Arc<GraphActionMediator>,
        engine: VersionDiffEngine,
        api: Arc<dyn VersionHistoryApi>,
    ) -> Self {
        Self {
            mediator,
            engine,
            api,
            displayed: Mutex::new(None),
            events: EventChannel::new(),
        }
    }

    pub fn events(&self) -> &EventChannel<DecorationEvent> {
        &self.events
    }

    pub fn api(&self) -> &Arc<dyn VersionHistoryApi> {
        &self.api
    }

    pub fn is_displaying(&self) -> bool {
        self.displayed.lock().unwrap().is_some()
    }

    /// Id of the version on screen, if any.
    pub fn displayed_version(&self) -> Option<(String, u64)> {
        self.displayed
            .lock()
            .unwrap()
            .as_ref()
            .map(|d| (d.workflow_id.clone(), d.version_id))
    }

    /// Difference between the live graph and the displayed version.
    pub fn displayed_diff(&self) -> Option<DiffResult> {
        self.displayed.lock().unwrap().as_ref().map(|d| d.diff.clone())
    }

    /// Show a historical version read-only, decorated against the live graph.
    pub fn display_version(&self, workflow_id: &str, version_id: u64) -> Result<DiffResult> {
        let content = self.api.get_version(workflow_id, version_id)?;

        // Showing another version while one is displayed keeps the parked
        // live content.
        let live = match self.mediator.get_temp_workflow() {
            Some(live) => live,
            None => {
                let live = self.mediator.live_store().snapshot();
                self.mediator.set_temp_workflow(live.clone());
                live
            }
        };
        self.mediator.disable_workflow_modification();
        self.mediator.clear_history();
        self.mediator.reload_workflow(&content)?;

        let diff = self.engine.diff(&live, &content);
        let decorations = self.engine.decorations(&live, &content, &diff);
        log::info!(
            "[VersionDiff] displaying version {} of {}: {} decoration(s)",
            version_id,
            workflow_id,
            decorations.len()
        );
        self.events.emit(&DecorationEvent::Show(decorations));

        *self.displayed.lock().unwrap() = Some(DisplayedVersion {
            workflow_id: workflow_id.to_string(),
            version_id,
            content,
            diff: diff.clone(),
        });
        Ok(diff)
    }

    /// Go back to the live graph without changing it.
    pub fn close_version_display(&self) -> Result<()> {
        if self.displayed.lock().unwrap().take().is_none() {
            return Err(FlowdeckError::NoVersionDisplayed);
        }
        self.leave_display()?;
        log::info!("[VersionDiff] closed version display");
        Ok(())
    }

    /// Make the displayed version the live content, as one replicated edit,
    /// and start a fresh undo history from it.
    pub fn restore_displayed_version(&self) -> Result<()> {
        let displayed = self
            .displayed
            .lock()
            .unwrap()
            .take()
            .ok_or(FlowdeckError::NoVersionDisplayed)?;
        self.leave_display()?;
        self.mediator.restore_workflow_content(&displayed.content)?;
        self.mediator.clear_history();
        log::info!(
            "[VersionDiff] restored version {} of {}",
            displayed.version_id,
            displayed.workflow_id
        );
        Ok(())
    }

    fn leave_display(&self) -> Result<()> {
        self.events.emit(&DecorationEvent::Clear);
        self.mediator.return_to_live_workflow()?;
        self.mediator.reset_temp_workflow();
        self.mediator.enable_workflow_modification();
        self.mediator.clear_history();
        Ok(())
    }
}

impl std::fmt::Debug for VersionDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionDisplay")
            .field("engine", &self.engine)
            .field("displayed", &self.displayed_version())
            .finish()
    }
}
