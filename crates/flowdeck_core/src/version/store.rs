use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{VersionEntry, VersionHistoryApi};
use crate::error::{FlowdeckError, Result};
use crate::model::WorkflowContent;

/// In-memory version service.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    versions: RwLock<HashMap<String, Vec<VersionEntry>>>,
    next_id: AtomicU64,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a snapshot of `content` and return its version id.
    pub fn save_version(
        &self,
        workflow_id: &str,
        content: &WorkflowContent,
        importance: bool,
    ) -> u64 {
        let version_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = VersionEntry {
            version_id,
            creation_time: chrono::Utc::now().timestamp_millis(),
            content: content.clone(),
            importance,
        };
        self.versions
            .write()
            .unwrap()
            .entry(workflow_id.to_string())
            .or_default()
            .push(entry);
        log::debug!(
            "[VersionDiff] saved version {} of {}",
            version_id,
            workflow_id
        );
        version_id
    }

    fn find(&self, workflow_id: &str, version_id: u64) -> Result<VersionEntry> {
        self.versions
            .read()
            .unwrap()
            .get(workflow_id)
            .and_then(|entries| entries.iter().find(|e| e.version_id == version_id))
            .cloned()
            .ok_or_else(|| FlowdeckError::VersionNotFound {
                workflow_id: workflow_id.to_string(),
                version_id,
            })
    }
}

impl VersionHistoryApi for MemoryVersionStore {
    fn list_versions(&self, workflow_id: &str) -> Result<Vec<VersionEntry>> {
        let mut entries = self
            .versions
            .read()
            .unwrap()
            .get(workflow_id)
            .cloned()
            .unwrap_or_default();
        entries.reverse();
        Ok(entries)
    }

    fn get_version(&self, workflow_id: &str, version_id: u64) -> Result<WorkflowContent> {
        Ok(self.find(workflow_id, version_id)?.content)
    }

    fn clone_version(&self, workflow_id: &str, version_id: u64) -> Result<String> {
        let entry = self.find(workflow_id, version_id)?;
        let new_workflow_id = uuid::Uuid::new_v4().to_string();
        self.save_version(&new_workflow_id, &entry.content, true);
        Ok(new_workflow_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Operator;

    #[test]
    fn test_list_is_newest_first() {
        let store = MemoryVersionStore::new();
        let empty = WorkflowContent::default();
        let v1 = store.save_version("wf", &empty, true);
        let v2 = store.save_version("wf", &empty, false);
        store.save_version("other", &empty, true);

        let ids: Vec<u64> = store
            .list_versions("wf")
            .unwrap()
            .iter()
            .map(|e| e.version_id)
            .collect();
        assert_eq!(ids, vec![v2, v1]);
        assert!(store.list_versions("missing").unwrap().is_empty());
    }

    #[test]
    fn test_get_and_clone() {
        let store = MemoryVersionStore::new();
        let mut content = WorkflowContent::default();
        content.operators.push(Operator::new("scan", "Scan", 0, 1));
        let v = store.save_version("wf", &content, true);

        assert_eq!(store.get_version("wf", v).unwrap(), content);
        assert!(matches!(
            store.get_version("wf", v + 10),
            Err(FlowdeckError::VersionNotFound { .. })
        ));

        let copy = store.clone_version("wf", v).unwrap();
        assert_ne!(copy, "wf");
        let copied = store.list_versions(&copy).unwrap();
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].content, content);
    }
}
