//! Two replicas share a workflow through the in-process relay.

use std::sync::Arc;

use flowdeck_core::Result;
use flowdeck_core::config::EditorConfig;
use flowdeck_core::crdt::{
    AwarenessChannel, AwarenessState, GraphStore, MemoryRelay, RelayMember, RoomId,
};
use flowdeck_core::mediator::GraphActionMediator;
use flowdeck_core::model::{Link, LogicalPort, Operator, Point};
use flowdeck_core::schema::StaticSchemaRegistry;
use flowdeck_core::session::SessionContext;
use flowdeck_core::version::VersionDiffEngine;

struct Peer {
    _member: RelayMember,
    awareness: Arc<AwarenessChannel>,
    mediator: Arc<GraphActionMediator>,
}

fn join(relay: &Arc<MemoryRelay>, room: &RoomId, user: &str, config: &EditorConfig) -> Peer {
    let store = Arc::new(GraphStore::new());
    let awareness = Arc::new(AwarenessChannel::new(
        store.client_id(),
        config.awareness_timeout_ms,
    ));
    let member = relay.join(room, Arc::clone(&store), Arc::clone(&awareness));
    awareness.set_local_state(AwarenessState::new(user));
    let session = SessionContext::new(user, config.clone());
    let mediator = GraphActionMediator::new(store, &session, Arc::new(StaticSchemaRegistry::new()));
    Peer {
        _member: member,
        awareness,
        mediator,
    }
}

fn pipe(id: &str, from: &str, to: &str) -> Link {
    Link::new(
        id,
        LogicalPort::new(from, "output-0"),
        LogicalPort::new(to, "input-0"),
    )
}

fn summary(mediator: &GraphActionMediator) -> String {
    let content = mediator.get_workflow_content();
    let ops: Vec<&str> = content
        .operators
        .iter()
        .map(|op| op.operator_id.as_str())
        .collect();
    let links: Vec<&str> = content.links.iter().map(|l| l.link_id.as_str()).collect();
    format!("operators [{}] links [{}]", ops.join(", "), links.join(", "))
}

fn run(config: &EditorConfig) -> Result<()> {
    let relay = MemoryRelay::new();
    let room = RoomId::for_workflow(Some("demo"));
    let ada = join(&relay, &room, "ada", config);
    let bob = join(&relay, &room, "bob", config);

    println!("ada builds scan → filter → sink");
    let m = &ada.mediator;
    m.add_operator(Operator::new("scan", "Scan", 0, 1), Point::new(0.0, 0.0))?;
    m.add_operator(Operator::new("filter", "Filter", 1, 1), Point::new(200.0, 0.0))?;
    m.add_operator(Operator::new("sink", "Sink", 1, 0), Point::new(400.0, 0.0))?;
    m.add_link(pipe("l1", "scan", "filter"))?;
    m.add_link(pipe("l2", "filter", "sink"))?;
    let before = m.get_workflow_content();
    println!("  bob sees {}", summary(&bob.mediator));

    println!("ada deletes filter");
    m.delete_operator("filter")?;
    let after = m.get_workflow_content();
    println!("  bob sees {}", summary(&bob.mediator));

    let engine = VersionDiffEngine::new(config);
    let diff = engine.diff(&before, &after);
    println!("  diff: deleted {:?}", diff.deleted);

    println!("bob tries to undo");
    match bob.mediator.undo() {
        Ok(_) => println!("  undone"),
        Err(e) => println!("  {}", e),
    }

    println!("ada undoes");
    m.undo()?;
    println!("  bob sees {}", summary(&bob.mediator));

    let peers: Vec<String> = bob
        .awareness
        .remote_states()
        .into_values()
        .map(|s| s.user_name)
        .collect();
    println!("bob's collaborators: {}", peers.join(", "));
    Ok(())
}

pub fn handle_demo(config: &EditorConfig) -> bool {
    match run(config) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}
