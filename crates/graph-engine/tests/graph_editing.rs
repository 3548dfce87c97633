//! End-to-end editing scenarios against the public API

use std::sync::Arc;

use graph_engine::{
    execution_order, BlockCatalog, BlockCategory, BlockTypeSchema, ConnectError,
    ConnectionEngine, ConnectionState, EditorSession, GraphDocument, GraphError, GraphStore,
    ParamValue, PortRef, PortSchema, Position, RunConfig,
};

/// Two output and two input ports of distinct types
fn test_catalog() -> Arc<BlockCatalog> {
    let mut catalog = BlockCatalog::builtin();
    catalog
        .register(
            BlockTypeSchema::new("simA", "Sim", BlockCategory::Simulator)
                .with_input(PortSchema::optional("in1", "T1"))
                .with_input(PortSchema::optional("in2", "T2"))
                .with_output(PortSchema::optional("out1", "T1"))
                .with_output(PortSchema::optional("out2", "T2")),
        )
        .unwrap();
    catalog
        .register(
            BlockTypeSchema::new("simB", "Sim", BlockCategory::Simulator)
                .with_input(PortSchema::optional("in1", "T2"))
                .with_output(PortSchema::optional("out1", "T2")),
        )
        .unwrap();
    Arc::new(catalog)
}

fn assert_no_dangling_edges(store: &GraphStore) {
    for edge in store.edges() {
        assert!(store.contains_node(&edge.from.node_id), "dangling {}", edge.from);
        assert!(store.contains_node(&edge.to.node_id), "dangling {}", edge.to);
    }
}

#[test]
fn test_random_edits_keep_edges_attached() {
    let mut store = GraphStore::new(test_catalog());
    let mut engine = ConnectionEngine::new();
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    for _ in 0..500 {
        let ids: Vec<String> = store.nodes().iter().map(|n| n.id.clone()).collect();
        match next() % 4 {
            0 | 1 => {
                store.add_node("simA", Position::default()).unwrap();
            }
            2 if !ids.is_empty() => {
                let victim = &ids[(next() as usize) % ids.len()];
                store.remove_node(victim);
            }
            _ if ids.len() >= 2 => {
                let from = &ids[(next() as usize) % ids.len()];
                let to = &ids[(next() as usize) % ids.len()];
                let port = if next() % 2 == 0 { ("out1", "in1") } else { ("out2", "in1") };
                let before = store.edges().len();
                match engine
                    .begin_from(&store, from, port.0)
                    .and_then(|_| engine.complete_to(&mut store, to, port.1))
                {
                    Ok(edge) => {
                        assert_eq!(store.edges().len(), before + 1);
                        let from_ty = store.port_type(&edge.from, graph_engine::Direction::Output);
                        let to_ty = store.port_type(&edge.to, graph_engine::Direction::Input);
                        assert_eq!(from_ty, to_ty);
                    }
                    Err(_) => assert_eq!(store.edges().len(), before),
                }
                assert_eq!(engine.state(), &ConnectionState::Idle);
            }
            _ => {}
        }
        assert_no_dangling_edges(&store);
    }
}

#[test]
fn test_same_category_ordered_by_label_then_id() {
    let mut store = GraphStore::new(test_catalog());
    store.add_node("simA", Position::default()).unwrap();
    store.add_node("simB", Position::default()).unwrap();
    store.set_label("n1", "Sim").unwrap();
    store.set_label("n2", "Arm").unwrap();

    // "Armn2" < "Simn1"
    assert_eq!(execution_order(store.nodes(), store.catalog()), vec!["n2", "n1"]);
    // repeated calls agree
    assert_eq!(
        execution_order(store.nodes(), store.catalog()),
        execution_order(store.nodes(), store.catalog())
    );
}

#[test]
fn test_type_mismatch_leaves_store_unchanged() {
    let mut store = GraphStore::new(test_catalog());
    store.add_node("simA", Position::default()).unwrap();
    store.add_node("simB", Position::default()).unwrap();
    let mut engine = ConnectionEngine::new();

    engine.begin_from(&store, "n1", "out1").unwrap();
    let err = engine.complete_to(&mut store, "n2", "in1").unwrap_err();
    assert!(matches!(err, ConnectError::TypeMismatch { .. }));
    assert!(store.edges().is_empty());
    assert_eq!(engine.state(), &ConnectionState::Idle);
}

#[test]
fn test_duplicate_then_cascade() {
    let mut store = GraphStore::new(test_catalog());
    store.add_node("simA", Position::default()).unwrap();
    store.add_node("simA", Position::default()).unwrap();
    let mut engine = ConnectionEngine::new();
    let from = PortRef::new("n1", "out1");
    let to = PortRef::new("n2", "in1");

    engine.connect(&mut store, &from, &to).unwrap();
    assert_eq!(
        engine.connect(&mut store, &from, &to).unwrap_err(),
        ConnectError::DuplicateEdge
    );
    assert_eq!(store.edges().len(), 1);

    store.remove_node("n1");
    assert!(store.edges().is_empty());
}

#[test]
fn test_round_trip_preserves_graph() {
    let catalog = Arc::new(BlockCatalog::builtin());
    let mut session = EditorSession::with_starter_graph(catalog.clone()).unwrap();
    session.set_param_from_input("n1", "model_path", "arm.xml").unwrap();
    session.set_param_from_input("n2", "goal_x", "0.75").unwrap();
    let logger = session.place_block("logger", Position::new(600.0, 120.0)).unwrap();
    session.begin_connection("n1", "state").unwrap();
    session.complete_connection(&logger, "state").unwrap();
    session.select("n1").unwrap();

    let json = session.to_document().to_json_pretty().unwrap();
    let mut restored = EditorSession::new(catalog);
    let report = restored.import_json(&json).unwrap();
    assert!(report.issues.is_empty());

    let source = session.store();
    let copy = restored.store();
    assert_eq!(copy.len(), source.len());
    for node in source.nodes() {
        let other = copy.node(&node.id).unwrap();
        assert_eq!(other.block_type, node.block_type);
        assert_eq!(other.label, node.label);
        assert_eq!(other.params, node.params);
        assert_eq!(other.position, node.position);
    }
    assert_eq!(copy.edges(), source.edges());
    assert_eq!(
        copy.node("n2").unwrap().params["goal_x"],
        ParamValue::Float(0.75)
    );
    assert_eq!(restored.run_config(), &RunConfig::editor_default());

    // z follows array position after import
    let z: Vec<u64> = copy.nodes().iter().map(|n| n.z_order).collect();
    assert_eq!(z, vec![1, 2, 3]);
}

#[test]
fn test_v2_document_rejected() {
    let mut session = EditorSession::with_starter_graph(Arc::new(BlockCatalog::builtin())).unwrap();
    let before = session.to_document();

    let err = session
        .import_json(r#"{"version": "graph.v2", "nodes": [], "edges": []}"#)
        .unwrap_err();
    assert!(matches!(
        err,
        GraphError::UnsupportedVersion { found: Some(ref v) } if v == "graph.v2"
    ));
    assert_eq!(session.to_document(), before);
}

#[test]
fn test_document_parse_is_version_first() {
    // malformed content behind a bad version still reports the version
    let err = GraphDocument::from_json_str(r#"{"version": 2, "nodes": "nope"}"#).unwrap_err();
    assert!(matches!(err, GraphError::UnsupportedVersion { found: Some(ref v) } if v == "2"));
}
