//! Graphs opened from a TOML configuration file.

use std::io::Write;
use std::sync::Arc;

use kgstore_core::{
    CascadePolicy, DistanceMetric, EdgeRecord, ErrorKind, InMemoryDocumentStore, KgConfig,
    KnowledgeGraph, NodeRecord, WriteMode,
};

use crate::helpers::{add_nodes, init_tracing};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn strict_graph_from_file() {
    let file = write_config(
        r#"
[collections]
nodes = "entities"
edges = "relations"
communities = "reports"

[consistency]
cascade = "strict"
write_mode = "sequential"

[logging]
level = "warn"
"#,
    );
    let config = KgConfig::from_file(file.path()).unwrap();
    init_tracing(&config.logging.level);
    assert_eq!(config.consistency.cascade, CascadePolicy::Strict);

    let store = Arc::new(InMemoryDocumentStore::new());
    let graph = KnowledgeGraph::with_config(store.clone(), config).unwrap();
    assert!(!graph.uses_atomic_batches());
    add_nodes(&graph, &["A", "B"]);
    graph
        .add_edge(&EdgeRecord::undirected("A", "B", "").unwrap())
        .unwrap();
    assert_eq!(store.document_count("entities"), 2);
    assert_eq!(store.document_count("relations"), 2);

    // B disappears outside the engine; strict removal of A refuses to proceed
    kgstore_core::DocumentStore::delete(store.as_ref(), "entities", "B").unwrap();
    assert_eq!(graph.remove_node("A").unwrap_err().kind(), ErrorKind::NotFound);
    assert!(graph.node_exists("A").unwrap());
}

#[test]
fn vector_settings_from_file() {
    let file = write_config(
        r#"
[vector]
field = "embedding"
limit = 1
metric = "cosine"
"#,
    );
    let config = KgConfig::from_file(file.path()).unwrap();
    assert_eq!(config.vector.metric, DistanceMetric::Cosine);

    let store = Arc::new(InMemoryDocumentStore::new().with_vector_index("nodes", "embedding"));
    let graph = KnowledgeGraph::with_config(store, config).unwrap();
    for (uid, v) in [("EAST", [1.0, 0.0]), ("NORTH", [0.0, 1.0]), ("FAR_EAST", [9.0, 0.5])] {
        graph
            .add_node(uid, &NodeRecord::new(uid, "").with_embedding(v.to_vec()))
            .unwrap();
    }

    // cosine ignores magnitude
    let found = graph.nearest_neighbors(&[5.0, 0.0]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uid(), "EAST");
}

#[test]
fn atomic_write_mode_requires_capable_store() {
    let file = write_config("[consistency]\nwrite_mode = \"atomic\"\n");
    let config = KgConfig::from_file(file.path()).unwrap();
    assert_eq!(config.consistency.write_mode, WriteMode::Atomic);

    let store = Arc::new(InMemoryDocumentStore::new().with_sequential_batches());
    let err = KnowledgeGraph::with_config(store, config.clone()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let graph = KnowledgeGraph::with_config(Arc::new(InMemoryDocumentStore::new()), config)
        .unwrap();
    assert!(graph.uses_atomic_batches());
}

#[test]
fn effective_config_renders_as_toml() {
    let rendered = KgConfig::default().to_toml_string().unwrap();
    assert!(rendered.contains("[collections]"));
    assert!(rendered.contains("cascade = \"tolerant\""));
}
