use std::path::PathBuf;

use flowdeck_core::config::EditorConfig;
use flowdeck_core::model::ElementClass;
use flowdeck_core::version::{DiffResult, VersionDiffEngine};

use crate::cli::read_workflow;

pub fn handle_diff(old: &PathBuf, new: &PathBuf, all: bool, json: bool, config: &EditorConfig) -> bool {
    let (Some(a), Some(b)) = (read_workflow(old), read_workflow(new)) else {
        return false;
    };

    let engine = if all {
        VersionDiffEngine::with_classes(vec![
            ElementClass::Operators,
            ElementClass::Links,
            ElementClass::CommentBoxes,
        ])
    } else {
        VersionDiffEngine::new(config)
    };
    let result = engine.diff(&a, &b);

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("✗ {}", e);
                return false;
            }
        }
        return true;
    }

    print_diff(&result);
    for decoration in engine.link_decorations(&a, &b, &result) {
        if let flowdeck_core::version::Decoration::DanglingLink {
            link_id,
            anchor,
            missing_operator_id,
        } = decoration
        {
            println!(
                "  link {} left dangling at {}:{} (was attached to {})",
                link_id, anchor.operator_id, anchor.port_id, missing_operator_id
            );
        }
    }
    true
}

fn print_diff(result: &DiffResult) {
    if result.is_empty() {
        println!("No differences");
        return;
    }
    for id in &result.added {
        println!("+ {}", id);
    }
    for id in &result.deleted {
        println!("- {}", id);
    }
    for id in &result.modified {
        println!("~ {}", id);
        if let Some(diff) = result.operator_property_diff(id) {
            for key in diff.changed_keys() {
                println!("    property {}", key);
            }
            if diff.version_changed {
                println!("    operator version");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::model::{Operator, Point, WorkflowContent};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &WorkflowContent) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, serde_json::to_string(content).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_diff_files() {
        let dir = TempDir::new().unwrap();
        let mut old = WorkflowContent::default();
        old.operators.push(Operator::new("scan", "Scan", 0, 1));
        old.positions.insert("scan".into(), Point::new(0.0, 0.0));
        let mut new = old.clone();
        new.operators.push(Operator::new("sink", "Sink", 1, 0));
        let a = write(&dir, "a.json", &old);
        let b = write(&dir, "b.json", &new);

        assert!(handle_diff(&a, &b, false, false, &EditorConfig::default()));
        assert!(handle_diff(&a, &b, true, true, &EditorConfig::default()));
    }

    #[test]
    fn test_diff_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.json", &WorkflowContent::default());
        let missing = dir.path().join("missing.json");
        assert!(!handle_diff(&a, &missing, false, false, &EditorConfig::default()));
    }
}
