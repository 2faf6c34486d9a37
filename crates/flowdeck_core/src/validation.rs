//! Link validation.
//!
//! A link is accepted only if:
//! - both endpoint operators exist and differ (no self-loops),
//! - its source is an output port and its target an input port,
//! - no existing link joins the same source and target ports, and
//! - the target port is free, unless its schema allows several inbound links.
//!
//! Rejections are ordinary outcomes of an interactive gesture, so they are
//! returned as [`LinkRejection`] values rather than errors.

use std::fmt;

use serde::Serialize;
use ts_rs::TS;

use crate::model::{Link, Operator, WorkflowContent};
use crate::schema::OperatorSchemaSource;

/// Why a link was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum LinkRejection {
    SelfLoop,
    MissingOperator(String),
    NotAnOutputPort { operator_id: String, port_id: String },
    NotAnInputPort { operator_id: String, port_id: String },
    /// A link with the same id or the same endpoints already exists
    Duplicate,
    TargetPortOccupied { operator_id: String, port_id: String },
}

impl fmt::Display for LinkRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRejection::SelfLoop => write!(f, "source and target are the same operator"),
            LinkRejection::MissingOperator(id) => write!(f, "operator '{}' does not exist", id),
            LinkRejection::NotAnOutputPort {
                operator_id,
                port_id,
            } => write!(f, "'{}' is not an output port of '{}'", port_id, operator_id),
            LinkRejection::NotAnInputPort {
                operator_id,
                port_id,
            } => write!(f, "'{}' is not an input port of '{}'", port_id, operator_id),
            LinkRejection::Duplicate => write!(f, "an identical link already exists"),
            LinkRejection::TargetPortOccupied {
                operator_id,
                port_id,
            } => write!(
                f,
                "input port '{}' of '{}' already has a link",
                port_id, operator_id
            ),
        }
    }
}

/// Check `link` against the operators visible through `lookup` and the
/// `existing` links.
pub fn check_link<F>(
    link: &Link,
    lookup: F,
    existing: &[Link],
    schemas: &dyn OperatorSchemaSource,
) -> Result<(), LinkRejection>
where
    F: Fn(&str) -> Option<Operator>,
{
    if link.source.operator_id == link.target.operator_id {
        return Err(LinkRejection::SelfLoop);
    }

    let source = lookup(&link.source.operator_id)
        .ok_or_else(|| LinkRejection::MissingOperator(link.source.operator_id.clone()))?;
    let target = lookup(&link.target.operator_id)
        .ok_or_else(|| LinkRejection::MissingOperator(link.target.operator_id.clone()))?;

    if !source.has_output_port(&link.source.port_id) {
        return Err(LinkRejection::NotAnOutputPort {
            operator_id: source.operator_id,
            port_id: link.source.port_id.clone(),
        });
    }
    let Some(target_index) = target.input_port_index(&link.target.port_id) else {
        return Err(LinkRejection::NotAnInputPort {
            operator_id: target.operator_id,
            port_id: link.target.port_id.clone(),
        });
    };

    if existing.iter().any(|other| {
        other.link_id == link.link_id
            || (other.source == link.source && other.target == link.target)
    }) {
        return Err(LinkRejection::Duplicate);
    }

    let occupied = existing.iter().any(|other| other.target == link.target);
    if occupied && !schemas.allows_multiple_inputs(&target.operator_type, target_index) {
        return Err(LinkRejection::TargetPortOccupied {
            operator_id: target.operator_id,
            port_id: link.target.port_id.clone(),
        });
    }

    Ok(())
}

/// Check every link of a stored workflow, each against the links before it.
///
/// Returns the offending link ids with the reason they would be refused.
pub fn validate_content(
    content: &WorkflowContent,
    schemas: &dyn OperatorSchemaSource,
) -> Vec<(String, LinkRejection)> {
    content
        .links
        .iter()
        .enumerate()
        .filter_map(|(i, link)| {
            check_link(
                link,
                |id| content.operator(id).cloned(),
                &content.links[..i],
                schemas,
            )
            .err()
            .map(|reason| (link.link_id.clone(), reason))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogicalPort;
    use crate::schema::{OperatorSchema, PortSchema, StaticSchemaRegistry};

    fn graph() -> WorkflowContent {
        WorkflowContent {
            operators: vec![
                Operator::new("scan", "Scan", 0, 1),
                Operator::new("scan2", "Scan", 0, 1),
                Operator::new("filter", "Filter", 1, 1),
                Operator::new("union", "Union", 1, 1),
            ],
            ..Default::default()
        }
    }

    fn link(id: &str, from: &str, to: &str) -> Link {
        Link::new(
            id,
            LogicalPort::new(from, "output-0"),
            LogicalPort::new(to, "input-0"),
        )
    }

    fn check(content: &WorkflowContent, link: &Link, schemas: &StaticSchemaRegistry) -> Result<(), LinkRejection> {
        check_link(link, |id| content.operator(id).cloned(), &content.links, schemas)
    }

    #[test]
    fn test_self_loop_rejected_for_any_ports() {
        let content = graph();
        let schemas = StaticSchemaRegistry::new();
        for (out, inp) in [("output-0", "input-0"), ("bogus", "bogus"), ("input-0", "output-0")] {
            let l = Link::new(
                "l",
                LogicalPort::new("filter", out),
                LogicalPort::new("filter", inp),
            );
            assert_eq!(check(&content, &l, &schemas), Err(LinkRejection::SelfLoop));
        }
    }

    #[test]
    fn test_port_direction_checked() {
        let content = graph();
        let schemas = StaticSchemaRegistry::new();
        let backwards = Link::new(
            "l",
            LogicalPort::new("filter", "input-0"),
            LogicalPort::new("scan", "output-0"),
        );
        assert!(matches!(
            check(&content, &backwards, &schemas),
            Err(LinkRejection::NotAnOutputPort { .. })
        ));
        let into_output = Link::new(
            "l",
            LogicalPort::new("scan", "output-0"),
            LogicalPort::new("filter", "output-0"),
        );
        assert!(matches!(
            check(&content, &into_output, &schemas),
            Err(LinkRejection::NotAnInputPort { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_occupied() {
        let mut content = graph();
        content.links.push(link("l1", "scan", "filter"));
        let schemas = StaticSchemaRegistry::new();

        assert_eq!(
            check(&content, &link("l2", "scan", "filter"), &schemas),
            Err(LinkRejection::Duplicate)
        );
        assert!(matches!(
            check(&content, &link("l3", "scan2", "filter"), &schemas),
            Err(LinkRejection::TargetPortOccupied { .. })
        ));
    }

    #[test]
    fn test_multi_input_port_accepts_second_link() {
        let mut content = graph();
        content.links.push(link("l1", "scan", "union"));
        let mut union = OperatorSchema::with_ports("Union", 1, 1);
        union.input_ports[0] = PortSchema::default().multi();
        let schemas = StaticSchemaRegistry::new().with(union);

        assert_eq!(check(&content, &link("l2", "scan2", "union"), &schemas), Ok(()));
    }

    #[test]
    fn test_validate_content_reports_later_duplicates() {
        let mut content = graph();
        content.links.push(link("first", "scan", "filter"));
        content.links.push(link("second", "scan", "filter"));
        content.links.push(link("ghost", "scan", "missing"));
        let problems = validate_content(&content, &StaticSchemaRegistry::new());
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].0, "second");
        assert_eq!(
            problems[1].1,
            LinkRejection::MissingOperator("missing".to_string())
        );
    }
}
