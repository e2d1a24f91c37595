//! Adjacency / edge-collection consistency scenarios.

use kgstore_core::{EdgeRecord, ErrorKind};

use crate::helpers::{adjacency, consistency_violations, set, setup_graph};

#[test]
fn undirected_add_then_remove_round_trip() {
    let (store, graph) = setup_graph(&["A", "B"]);

    graph
        .add_edge(&EdgeRecord::undirected("A", "B", "partners").unwrap())
        .unwrap();

    assert_eq!(adjacency(&graph, "A").0, set(&["B"]));
    assert_eq!(adjacency(&graph, "B").1, set(&["A"]));
    assert!(!graph.get_edge("A", "B").unwrap().is_directed());
    assert!(graph.get_edge("B", "A").is_ok());
    assert!(consistency_violations(store.as_ref()).is_empty());

    graph.remove_edge("A", "B").unwrap();

    for uid in ["A", "B"] {
        let (to, from) = adjacency(&graph, uid);
        assert!(to.is_empty() && from.is_empty(), "{uid} still linked");
    }
    assert!(!graph.edge_exists("A", "B").unwrap());
    assert!(!graph.edge_exists("B", "A").unwrap());
}

#[test]
fn directed_edges_in_both_directions_are_independent() {
    let (store, graph) = setup_graph(&["A", "B"]);
    graph
        .add_edge(&EdgeRecord::directed("A", "B", "cites").unwrap())
        .unwrap();
    graph
        .add_edge(&EdgeRecord::directed("B", "A", "replies").unwrap())
        .unwrap();

    graph.remove_edge("A", "B").unwrap();

    assert_eq!(adjacency(&graph, "A"), (set(&[]), set(&["B"])));
    assert_eq!(adjacency(&graph, "B"), (set(&["A"]), set(&[])));
    assert_eq!(graph.get_edge("B", "A").unwrap().description(), "replies");
    assert!(consistency_violations(store.as_ref()).is_empty());
}

#[test]
fn remove_node_leaves_stale_edge_records_until_purged() {
    let (store, graph) = setup_graph(&["HUB", "X", "Y", "Z"]);
    for (s, t, directed) in [("HUB", "X", true), ("Y", "HUB", true), ("HUB", "Z", false)] {
        graph
            .add_edge(&EdgeRecord::new(s, t, "", directed).unwrap())
            .unwrap();
    }

    graph.remove_node("HUB").unwrap();

    for uid in ["X", "Y", "Z"] {
        let (to, from) = adjacency(&graph, uid);
        assert!(!to.contains("HUB") && !from.contains("HUB"));
    }
    // stale records do not count as adjacency violations
    assert!(consistency_violations(store.as_ref()).is_empty());
    assert_eq!(graph.materialize().unwrap().stale_edge_count(), 4);

    let purged = graph.purge_stale_edges().unwrap();
    assert_eq!(purged, vec!["HUB_to_X", "HUB_to_Z", "Y_to_HUB", "Z_to_HUB"]);
    assert_eq!(graph.materialize().unwrap().edge_count(), 0);
}

#[test]
fn pruning_after_edge_removal() {
    let (_store, graph) = setup_graph(&["A", "B", "C"]);
    graph
        .add_edge(&EdgeRecord::directed("A", "B", "").unwrap())
        .unwrap();
    graph
        .add_edge(&EdgeRecord::directed("B", "C", "").unwrap())
        .unwrap();

    assert!(graph.clean_zero_degree_nodes().unwrap().is_empty());

    graph.remove_edge("B", "C").unwrap();
    assert_eq!(graph.clean_zero_degree_nodes().unwrap(), vec!["C"]);
    assert!(graph.node_exists("A").unwrap());
    assert!(graph.node_exists("B").unwrap());
}

#[test]
fn operations_on_missing_records() {
    let (_store, graph) = setup_graph(&["A"]);
    let cases = [
        graph.get_node("B").unwrap_err().kind(),
        graph.remove_node("B").unwrap_err().kind(),
        graph.get_edge("A", "B").unwrap_err().kind(),
        graph.remove_edge("A", "B").unwrap_err().kind(),
        graph
            .add_edge(&EdgeRecord::directed("A", "B", "").unwrap())
            .unwrap_err()
            .kind(),
        graph
            .update_edge(&EdgeRecord::directed("A", "B", "").unwrap())
            .unwrap_err()
            .kind(),
        graph.get_community("none").unwrap_err().kind(),
    ];
    assert!(cases.iter().all(|k| *k == ErrorKind::NotFound), "{cases:?}");
}

#[test]
fn metrics_track_mutations() {
    let (_store, graph) = setup_graph(&["A", "B"]);
    graph
        .add_edge(&EdgeRecord::undirected("A", "B", "").unwrap())
        .unwrap();
    graph.remove_edge("A", "B").unwrap();

    let snapshot = graph.metrics().snapshot();
    assert_eq!(snapshot.nodes_added, 2);
    assert_eq!(snapshot.edges_added, 2);
    assert_eq!(snapshot.edges_removed, 2);
    assert_eq!(snapshot.batches_committed, 2);
    assert!(graph
        .metrics()
        .export_prometheus()
        .contains("kgstore_mutations_total{kind=\"edge_add\"} 2"));
}
