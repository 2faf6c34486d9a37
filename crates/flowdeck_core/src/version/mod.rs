//! Historical versions of a workflow: listing, comparing, displaying and
//! restoring them.

mod diff;
mod display;
mod store;

pub use diff::{Decoration, DiffResult, PropertyDiff, VersionDiffEngine};
pub use display::{DecorationEvent, VersionDisplay};
pub use store::MemoryVersionStore;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::Result;
use crate::model::WorkflowContent;

/// An immutable saved snapshot of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VersionEntry {
    pub version_id: u64,
    /// Milliseconds since the Unix epoch
    pub creation_time: i64,
    pub content: WorkflowContent,
    /// `false` for minor auto-saves, which are folded together in lists
    pub importance: bool,
}

/// The version service, consumed by the core.
pub trait VersionHistoryApi: Send + Sync {
    /// All versions of a workflow, newest first.
    fn list_versions(&self, workflow_id: &str) -> Result<Vec<VersionEntry>>;

    fn get_version(&self, workflow_id: &str, version_id: u64) -> Result<WorkflowContent>;

    /// Copy a version into a new workflow and return the new workflow's id.
    fn clone_version(&self, workflow_id: &str, version_id: u64) -> Result<String>;
}

/// A row of the version list.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VersionGroup {
    pub head: VersionEntry,
    /// Older minor versions folded under `head`
    pub collapsed: Vec<VersionEntry>,
}

impl VersionGroup {
    pub fn is_expandable(&self) -> bool {
        !self.collapsed.is_empty()
    }
}

/// Fold runs of consecutive minor versions (given newest first) under the
/// newest version of each run. Important versions always stand alone.
pub fn group_versions(entries: &[VersionEntry]) -> Vec<VersionGroup> {
    let mut groups: Vec<VersionGroup> = Vec::new();
    for entry in entries {
        match groups.last_mut() {
            Some(group) if !entry.importance && !group.head.importance => {
                group.collapsed.push(entry.clone());
            }
            _ => groups.push(VersionGroup {
                head: entry.clone(),
                collapsed: Vec::new(),
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version_id: u64, importance: bool) -> VersionEntry {
        VersionEntry {
            version_id,
            creation_time: version_id as i64 * 1000,
            content: WorkflowContent::default(),
            importance,
        }
    }

    #[test]
    fn test_group_versions_folds_minor_runs() {
        let entries = vec![
            entry(7, false),
            entry(6, false),
            entry(5, true),
            entry(4, false),
            entry(3, false),
            entry(2, false),
            entry(1, true),
        ];
        let groups = group_versions(&entries);
        let shape: Vec<(u64, usize)> = groups
            .iter()
            .map(|g| (g.head.version_id, g.collapsed.len()))
            .collect();
        assert_eq!(shape, vec![(7, 1), (5, 0), (4, 2), (1, 0)]);
        assert!(groups[0].is_expandable());
        assert!(!groups[1].is_expandable());
    }

    #[test]
    fn test_group_versions_empty() {
        assert!(group_versions(&[]).is_empty());
    }
}
