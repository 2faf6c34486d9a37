//! Comparing two workflow snapshots.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::config::EditorConfig;
use crate::model::{ElementClass, LogicalPort, Operator, WorkflowContent};

/// Which properties of a modified operator differ.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PropertyDiff {
    /// Every property key present on either side, `true` where the values differ
    pub properties: IndexMap<String, bool>,
    /// Whether the operator version tag differs
    pub version_changed: bool,
}

impl PropertyDiff {
    /// Compare the property bags of two versions of an operator.
    pub fn between(a: &Operator, b: &Operator) -> Self {
        let mut properties = IndexMap::new();
        for key in a
            .operator_properties
            .keys()
            .chain(b.operator_properties.keys())
        {
            if properties.contains_key(key) {
                continue;
            }
            let differs = a.operator_properties.get(key) != b.operator_properties.get(key);
            properties.insert(key.clone(), differs);
        }
        Self {
            properties,
            version_changed: a.operator_version != b.operator_version,
        }
    }

    pub fn changed_keys(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, differs)| **differs)
            .map(|(key, _)| key.as_str())
    }
}

/// Outcome of comparing a base snapshot `a` with another snapshot `b`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DiffResult {
    /// Ids only in `b`
    pub added: Vec<String>,
    /// Ids in both whose content differs
    pub modified: Vec<String>,
    /// Ids only in `a`
    pub deleted: Vec<String>,
    /// Per-property differences of modified operators
    pub property_diffs: IndexMap<String, PropertyDiff>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn operator_property_diff(&self, operator_id: &str) -> Option<&PropertyDiff> {
        self.property_diffs.get(operator_id)
    }
}

/// How the renderer marks a difference on the displayed graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum Decoration {
    Added { element_id: String },
    Modified { element_id: String },
    /// The surviving end of a link whose other operator is missing from
    /// the displayed graph
    DanglingLink {
        link_id: String,
        anchor: LogicalPort,
        missing_operator_id: String,
    },
}

/// Elements of one class, keyed by id, in their serialized form.
fn keyed<T, F>(items: &[T], id: F) -> IndexMap<String, Value>
where
    T: Serialize,
    F: Fn(&T) -> &str,
{
    items
        .iter()
        .map(|item| {
            (
                id(item).to_string(),
                serde_json::to_value(item).unwrap_or_default(),
            )
        })
        .collect()
}

fn class_entries(content: &WorkflowContent, class: ElementClass) -> IndexMap<String, Value> {
    match class {
        ElementClass::Operators => keyed(&content.operators, |op| op.operator_id.as_str()),
        ElementClass::Links => keyed(&content.links, |link| link.link_id.as_str()),
        ElementClass::CommentBoxes => keyed(&content.comment_boxes, |cb| cb.comment_box_id.as_str()),
    }
}

/// Compares workflow snapshots over a configurable set of element classes.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionDiffEngine {
    classes: IndexSet<ElementClass>,
}

impl Default for VersionDiffEngine {
    /// Operators only.
    fn default() -> Self {
        Self::with_classes(vec![ElementClass::Operators])
    }
}

impl VersionDiffEngine {
    pub fn new(config: &EditorConfig) -> Self {
        Self::with_classes(config.diff_element_classes.iter().copied())
    }

    /// Repeated classes are compared once.
    pub fn with_classes<I>(classes: I) -> Self
    where
        I: IntoIterator<Item = ElementClass>,
    {
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &IndexSet<ElementClass> {
        &self.classes
    }

    /// Compare base `a` with `b`.
    ///
    /// Positions are not compared: moving an element does not modify it.
    pub fn diff(&self, a: &WorkflowContent, b: &WorkflowContent) -> DiffResult {
        let mut result = DiffResult::default();

        for class in &self.classes {
            let left = class_entries(a, *class);
            let right = class_entries(b, *class);

            let mut modified = Vec::new();
            for (id, value) in &left {
                match right.get(id) {
                    None => result.deleted.push(id.clone()),
                    Some(other) if other != value => modified.push(id.clone()),
                    Some(_) => {}
                }
            }
            result.added.extend(
                right
                    .keys()
                    .filter(|id| !left.contains_key(*id))
                    .cloned(),
            );

            if *class == ElementClass::Operators {
                for id in &modified {
                    if let (Some(before), Some(after)) = (a.operator(id), b.operator(id)) {
                        result
                            .property_diffs
                            .insert(id.clone(), PropertyDiff::between(before, after));
                    }
                }
            }
            result.modified.extend(modified);
        }

        log::debug!(
            "[VersionDiff] +{} ~{} -{}",
            result.added.len(),
            result.modified.len(),
            result.deleted.len()
        );
        result
    }

    /// Dangling link ends to decorate for operators deleted between `a` and `b`.
    ///
    /// For every link of `a` attached to a deleted operator, the end on the
    /// other operator is decorated, provided that operator exists in `b`.
    pub fn link_decorations(
        &self,
        a: &WorkflowContent,
        b: &WorkflowContent,
        result: &DiffResult,
    ) -> Vec<Decoration> {
        let mut decorations = Vec::new();
        for deleted in &result.deleted {
            if a.operator(deleted).is_none() {
                continue;
            }
            for link in a.links_of(deleted) {
                let anchor = if link.source.operator_id == *deleted {
                    &link.target
                } else {
                    &link.source
                };
                if anchor.operator_id == *deleted || b.operator(&anchor.operator_id).is_none() {
                    continue;
                }
                decorations.push(Decoration::DanglingLink {
                    link_id: link.link_id.clone(),
                    anchor: anchor.clone(),
                    missing_operator_id: deleted.clone(),
                });
            }
        }
        decorations
    }

    /// Every decoration for `b` displayed against base `a`.
    pub fn decorations(
        &self,
        a: &WorkflowContent,
        b: &WorkflowContent,
        result: &DiffResult,
    ) -> Vec<Decoration> {
        let mut decorations: Vec<Decoration> = result
            .added
            .iter()
            .map(|id| Decoration::Added {
                element_id: id.clone(),
            })
            .chain(result.modified.iter().map(|id| Decoration::Modified {
                element_id: id.clone(),
            }))
            .collect();
        decorations.extend(self.link_decorations(a, b, result));
        decorations
    }
}
