//! Shared test utilities for graph scenarios.

use std::collections::BTreeSet;
use std::sync::Arc;

use kgstore_core::graph::EDGE_UID_DELIMITER;
use kgstore_core::{DocumentStore, EdgeRecord, InMemoryDocumentStore, KnowledgeGraph, NodeRecord};
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly subscriber once; later calls are no-ops.
pub fn init_tracing(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("kgstore_core={level}")))
        .with_test_writer()
        .try_init();
}

/// Opens a graph over a fresh in-memory store and creates the given nodes.
pub fn setup_graph(uids: &[&str]) -> (Arc<InMemoryDocumentStore>, KnowledgeGraph) {
    init_tracing("debug");
    let store = Arc::new(InMemoryDocumentStore::new());
    let graph = KnowledgeGraph::new(store.clone()).expect("open graph");
    add_nodes(&graph, uids);
    (store, graph)
}

/// Creates nodes with a generated description.
pub fn add_nodes(graph: &KnowledgeGraph, uids: &[&str]) {
    for uid in uids {
        graph
            .add_node(uid, &NodeRecord::new(uid, &format!("entity {uid}")))
            .expect("add node");
    }
}

/// Builds a `BTreeSet<String>` from string literals.
pub fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Returns `(edges_to, edges_from)` of a node.
pub fn adjacency(graph: &KnowledgeGraph, uid: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let node = graph.get_node(uid).expect("get node");
    (node.edges_to().clone(), node.edges_from().clone())
}

/// Lists every inconsistency between node adjacency and edge records.
///
/// Edge records with a missing endpoint are reported as stale rather than
/// inconsistent.
pub fn consistency_violations(store: &dyn DocumentStore) -> Vec<String> {
    let nodes: Vec<(String, NodeRecord)> = store
        .stream("nodes")
        .expect("stream nodes")
        .into_iter()
        .map(|(uid, doc)| {
            let node = serde_json::from_value(serde_json::Value::Object(doc)).expect("node");
            (uid, node)
        })
        .collect();
    let edges: Vec<EdgeRecord> = store
        .stream("edges")
        .expect("stream edges")
        .into_iter()
        .map(|(_, doc)| serde_json::from_value(serde_json::Value::Object(doc)).expect("edge"))
        .collect();
    let keys: BTreeSet<String> = edges.iter().map(|e| e.edge_uid().to_string()).collect();
    let find = |uid: &str| nodes.iter().find(|(k, _)| k == uid).map(|(_, n)| n);

    let mut violations = Vec::new();
    for (uid, node) in &nodes {
        for target in node.edges_to() {
            let key = format!("{uid}{EDGE_UID_DELIMITER}{target}");
            if !keys.contains(&key) {
                violations.push(format!("{uid}.edges_to has {target} but no record {key}"));
            }
        }
        for source in node.edges_from() {
            let key = format!("{source}{EDGE_UID_DELIMITER}{uid}");
            if !keys.contains(&key) {
                violations.push(format!("{uid}.edges_from has {source} but no record {key}"));
            }
        }
    }
    for edge in &edges {
        let (Some(source), Some(target)) = (find(edge.source_uid()), find(edge.target_uid()))
        else {
            continue;
        };
        if !source.edges_to().contains(edge.target_uid()) {
            violations.push(format!("{} missing from {}.edges_to", edge.target_uid(), edge.source_uid()));
        }
        if !target.edges_from().contains(edge.source_uid()) {
            violations.push(format!("{} missing from {}.edges_from", edge.source_uid(), edge.target_uid()));
        }
        if !edge.is_directed() && !keys.contains(edge.reversed().edge_uid()) {
            violations.push(format!("undirected {} has no reverse record", edge.edge_uid()));
        }
    }
    violations
}
