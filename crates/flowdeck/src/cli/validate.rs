use std::path::PathBuf;

use flowdeck_core::schema::StaticSchemaRegistry;
use flowdeck_core::validation::validate_content;

use crate::cli::read_workflow;

pub fn handle_validate(file: &PathBuf) -> bool {
    let Some(content) = read_workflow(file) else {
        return false;
    };

    // Port counts come from the file itself; without schemas every input
    // port takes a single link.
    let problems = validate_content(&content, &StaticSchemaRegistry::new());

    let unplaced: Vec<&str> = content
        .operators
        .iter()
        .map(|op| op.operator_id.as_str())
        .filter(|id| !content.positions.contains_key(*id))
        .collect();

    if problems.is_empty() && unplaced.is_empty() {
        println!(
            "✓ {} operator(s), {} link(s): all valid",
            content.operators.len(),
            content.links.len()
        );
        return true;
    }

    for (link_id, reason) in &problems {
        println!("✗ link {}: {}", link_id, reason);
    }
    for id in &unplaced {
        println!("⚠ operator {} has no position", id);
    }
    problems.is_empty()
}
