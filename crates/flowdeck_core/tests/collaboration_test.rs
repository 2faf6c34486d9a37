//! Integration tests for replicas editing one workflow together

use std::sync::{Arc, Mutex};

use flowdeck_core::FlowdeckError;
use flowdeck_core::config::EditorConfig;
use flowdeck_core::crdt::{
    AwarenessChannel, GraphStore, MemoryRelay, RelayMember, RoomId, UpdateOrigin,
};
use flowdeck_core::mediator::{ElementMove, GraphActionMediator, LinkEvent, OperatorEvent};
use flowdeck_core::model::{ElementClass, Link, LogicalPort, Operator, Point, WorkflowContent};
use flowdeck_core::schema::StaticSchemaRegistry;
use flowdeck_core::session::SessionContext;
use flowdeck_core::version::{
    Decoration, MemoryVersionStore, VersionDiffEngine, VersionDisplay,
};
use flowdeck_core::visual::{RecordingSink, VisualEvent, VisualSyncAdapter};

struct Replica {
    member: RelayMember,
    mediator: Arc<GraphActionMediator>,
}

impl Replica {
    fn join(relay: &Arc<MemoryRelay>, room: &RoomId, user: &str) -> Self {
        let store = Arc::new(GraphStore::new());
        let awareness = Arc::new(AwarenessChannel::new(store.client_id(), 30_000));
        let member = relay.join(room, Arc::clone(&store), awareness);
        let session = SessionContext::new(user, EditorConfig::default());
        let mediator =
            GraphActionMediator::new(store, &session, Arc::new(StaticSchemaRegistry::new()));
        Self { member, mediator }
    }

    fn store(&self) -> &Arc<GraphStore> {
        self.mediator.live_store()
    }
}

fn link(id: &str, from: &str, to: &str) -> Link {
    Link::new(
        id,
        LogicalPort::new(from, "output-0"),
        LogicalPort::new(to, "input-0"),
    )
}

/// scan → filter → sink
fn build_pipeline(mediator: &GraphActionMediator) {
    mediator
        .add_operator(Operator::new("scan", "Scan", 0, 1), Point::new(0.0, 0.0))
        .unwrap();
    mediator
        .add_operator(Operator::new("filter", "Filter", 1, 1), Point::new(200.0, 0.0))
        .unwrap();
    mediator
        .add_operator(Operator::new("sink", "Sink", 1, 0), Point::new(400.0, 0.0))
        .unwrap();
    assert!(mediator.add_link(link("l1", "scan", "filter")).unwrap());
    assert!(mediator.add_link(link("l2", "filter", "sink")).unwrap());
}

#[test]
fn test_pipeline_delete_undo_and_diff() {
    let session = SessionContext::new("ada", EditorConfig::default());
    let mediator = GraphActionMediator::new(
        Arc::new(GraphStore::new()),
        &session,
        Arc::new(StaticSchemaRegistry::new()),
    );
    build_pipeline(&mediator);
    let pre = mediator.get_workflow_content();

    assert!(mediator.delete_operator("filter").unwrap());
    assert!(!mediator.has_operator("filter"));
    assert!(mediator.links().is_empty());
    let post = mediator.get_workflow_content();

    // One undo brings back the operator and both links
    assert!(mediator.undo().unwrap());
    assert_eq!(mediator.get_workflow_content(), pre);

    let engine = VersionDiffEngine::default();
    let diff = engine.diff(&pre, &post);
    assert!(diff.added.is_empty());
    assert!(diff.modified.is_empty());
    assert_eq!(diff.deleted, vec!["filter".to_string()]);
    let dangling: Vec<String> = engine
        .link_decorations(&pre, &post, &diff)
        .into_iter()
        .filter_map(|d| match d {
            Decoration::DanglingLink { link_id, .. } => Some(link_id),
            _ => None,
        })
        .collect();
    assert_eq!(dangling, vec!["l1".to_string(), "l2".to_string()]);

    let with_links =
        VersionDiffEngine::with_classes(vec![ElementClass::Operators, ElementClass::Links]);
    let diff = with_links.diff(&pre, &post);
    assert_eq!(diff.deleted, vec!["filter", "l1", "l2"]);
    assert!(diff.added.is_empty() && diff.modified.is_empty());
}

#[test]
fn test_empty_history_is_an_error() {
    let session = SessionContext::new("ada", EditorConfig::default());
    let mediator = GraphActionMediator::new(
        Arc::new(GraphStore::new()),
        &session,
        Arc::new(StaticSchemaRegistry::new()),
    );
    assert!(matches!(mediator.undo(), Err(FlowdeckError::NothingToUndo)));
    assert!(matches!(mediator.redo(), Err(FlowdeckError::NothingToRedo)));
}

#[test]
fn test_replicas_converge_through_relay() {
    let relay = MemoryRelay::new();
    let room = RoomId::for_workflow(Some("42"));
    let a = Replica::join(&relay, &room, "ada");
    let b = Replica::join(&relay, &room, "bob");

    build_pipeline(&a.mediator);
    assert_eq!(b.mediator.get_workflow_content(), a.mediator.get_workflow_content());

    // Concurrent edits while b is offline
    relay.disconnect(b.member.id);
    a.mediator
        .move_elements(&[ElementMove::new("scan", 10.0, 0.0)])
        .unwrap();
    b.mediator
        .move_elements(&[ElementMove::new("scan", 0.0, 30.0)])
        .unwrap();
    let mut props = flowdeck_core::model::OperatorProperties::new();
    props.insert("predicate".to_string(), serde_json::json!("age > 30"));
    b.mediator.set_operator_property("filter", props).unwrap();
    a.mediator.delete_link("l2").unwrap();

    relay.reconnect(b.member.id);
    let merged = a.mediator.get_workflow_content();
    assert_eq!(b.mediator.get_workflow_content(), merged);
    assert_eq!(merged.links.len(), 1);
    assert_eq!(
        merged.operator("filter").unwrap().operator_properties["predicate"],
        serde_json::json!("age > 30")
    );
}

#[test]
fn test_arrival_order_does_not_matter() {
    let base = GraphStore::new();
    base.transact(UpdateOrigin::Local, |txn| {
        txn.put_operator(&Operator::new("scan", "Scan", 0, 1))?;
        txn.put_operator(&Operator::new("sink", "Sink", 1, 0))?;
        txn.put_position("scan", Point::new(0.0, 0.0))?;
        txn.put_position("sink", Point::new(100.0, 0.0))
    })
    .unwrap();
    let base_update = base.encode_state_as_update();
    let base_sv = base.encode_state_vector();

    let fork = || {
        let store = GraphStore::new();
        store.apply_update(&base_update, UpdateOrigin::Sync).unwrap();
        store
    };
    let edits: Vec<Box<dyn Fn(&GraphStore)>> = vec![
        Box::new(|s| {
            s.transact(UpdateOrigin::Local, |txn| txn.put_position("scan", Point::new(5.0, 5.0)))
                .unwrap()
        }),
        Box::new(|s| {
            s.transact(UpdateOrigin::Local, |txn| txn.put_position("scan", Point::new(9.0, 9.0)))
                .unwrap()
        }),
        Box::new(|s| {
            s.transact(UpdateOrigin::Local, |txn| {
                txn.put_link(&link("l", "scan", "sink"))
            })
            .unwrap()
        }),
    ];
    let updates: Vec<Vec<u8>> = edits
        .iter()
        .map(|edit| {
            let store = fork();
            edit(&store);
            store.encode_diff(&base_sv).unwrap()
        })
        .collect();

    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    let results: Vec<WorkflowContent> = orders
        .iter()
        .map(|order| {
            let store = fork();
            for &i in order {
                store.apply_update(&updates[i], UpdateOrigin::Remote).unwrap();
            }
            store.snapshot()
        })
        .collect();
    for result in &results[1..] {
        assert_eq!(result, &results[0]);
    }
    assert_eq!(results[0].links.len(), 1);
}

#[test]
fn test_remote_input_never_produces_outbound_updates() {
    let relay = MemoryRelay::new();
    let room = RoomId::for_workflow(Some("7"));
    let a = Replica::join(&relay, &room, "ada");
    let b = Replica::join(&relay, &room, "bob");
    let sink = Arc::new(RecordingSink::echoing());
    let adapter = VisualSyncAdapter::attach(Arc::clone(&b.mediator), sink.clone());

    build_pipeline(&a.mediator);
    a.mediator
        .move_elements(&[ElementMove::new("scan", 25.0, 5.0)])
        .unwrap();
    a.mediator.delete_operator("filter").unwrap();
    a.mediator.undo().unwrap();

    assert_eq!(b.store().outbound_count(), 0);
    assert!(!b.mediator.can_undo());
    assert_eq!(adapter.forwarded_count(), 0);
    assert!(adapter.suppressed_count() > 0);
    assert_eq!(sink.element_position("scan"), Some(Point::new(25.0, 5.0)));
    assert_eq!(sink.link_ids().len(), 2);
    assert_eq!(b.mediator.get_workflow_content(), a.mediator.get_workflow_content());
}

#[test]
fn test_remote_events_carry_remote_origin() {
    let relay = MemoryRelay::new();
    let room = RoomId::for_workflow(Some("9"));
    let a = Replica::join(&relay, &room, "ada");
    let b = Replica::join(&relay, &room, "bob");

    let origins = Arc::new(Mutex::new(Vec::new()));
    let o = Arc::clone(&origins);
    b.mediator.events().operators.subscribe(move |e: &OperatorEvent| {
        o.lock().unwrap().push(e.origin());
    });
    let o = Arc::clone(&origins);
    b.mediator.events().links.subscribe(move |e: &LinkEvent| {
        o.lock().unwrap().push(e.origin());
    });

    build_pipeline(&a.mediator);
    let origins = origins.lock().unwrap();
    assert_eq!(origins.len(), 5);
    assert!(origins.iter().all(|o| *o == UpdateOrigin::Remote));
}

#[test]
fn test_undo_only_reverts_own_edits() {
    let relay = MemoryRelay::new();
    let room = RoomId::for_workflow(Some("3"));
    let a = Replica::join(&relay, &room, "ada");
    let b = Replica::join(&relay, &room, "bob");

    a.mediator
        .add_operator(Operator::new("scan", "Scan", 0, 1), Point::new(0.0, 0.0))
        .unwrap();
    b.mediator
        .add_operator(Operator::new("sink", "Sink", 1, 0), Point::new(100.0, 0.0))
        .unwrap();

    assert!(a.mediator.undo().unwrap());
    assert!(!b.mediator.has_operator("scan"));
    assert!(b.mediator.has_operator("sink"));
    assert!(a.mediator.has_operator("sink"));
}

#[test]
fn test_ui_drag_replicates_as_one_batch() {
    let relay = MemoryRelay::new();
    let room = RoomId::for_workflow(Some("5"));
    let a = Replica::join(&relay, &room, "ada");
    let b = Replica::join(&relay, &room, "bob");
    build_pipeline(&a.mediator);

    let sink = Arc::new(RecordingSink::echoing());
    let adapter = VisualSyncAdapter::attach(Arc::clone(&a.mediator), sink.clone());
    a.mediator.set_multi_select(true);
    a.mediator.highlight_operators(["scan", "sink"]);

    let outbound_before = a.store().outbound_count();
    let drag = sink.user_drag("scan", 0.0, 50.0);
    assert!(adapter.handle_ui_event(drag).unwrap());
    assert_eq!(a.store().outbound_count(), outbound_before + 1);

    assert_eq!(b.mediator.get_position("scan"), Some(Point::new(0.0, 50.0)));
    assert_eq!(b.mediator.get_position("sink"), Some(Point::new(400.0, 50.0)));
    assert_eq!(b.mediator.get_position("filter"), Some(Point::new(200.0, 0.0)));

    // The renderer's delete gesture cascades like a mediator delete
    adapter
        .handle_ui_event(VisualEvent::ElementDeleted {
            element_id: "filter".to_string(),
        })
        .unwrap();
    assert!(b.mediator.links().is_empty());
}

#[test]
fn test_version_display_and_restore_across_replicas() {
    let relay = MemoryRelay::new();
    let room = RoomId::for_workflow(Some("11"));
    let a = Replica::join(&relay, &room, "ada");
    let b = Replica::join(&relay, &room, "bob");
    let versions = Arc::new(MemoryVersionStore::new());
    let display = VersionDisplay::new(
        Arc::clone(&a.mediator),
        VersionDiffEngine::default(),
        versions.clone(),
    );

    build_pipeline(&a.mediator);
    let v1 = versions.save_version("11", &a.mediator.get_workflow_content(), true);
    a.mediator.delete_operator("filter").unwrap();

    let diff = display.display_version("11", v1).unwrap();
    assert_eq!(diff.added, vec!["filter".to_string()]);
    assert!(a.mediator.has_operator("filter"));
    assert!(!b.mediator.has_operator("filter"));

    // Remote edits land in the live graph while the version is shown
    b.mediator
        .add_operator(Operator::new("late", "Scan", 0, 1), Point::new(0.0, 300.0))
        .unwrap();
    assert!(!a.mediator.has_operator("late"));
    assert!(a.store().has_operator("late"));

    display.restore_displayed_version().unwrap();
    assert!(a.mediator.is_showing_live());
    assert!(a.mediator.is_workflow_modification_enabled());
    assert!(!a.mediator.can_undo());

    // The restored content replaces everything, on both replicas
    let restored = b.mediator.get_workflow_content();
    assert!(restored.operator("filter").is_some());
    assert!(restored.operator("late").is_none());
    assert_eq!(restored.links.len(), 2);
    assert_eq!(restored, a.mediator.get_workflow_content());
}
