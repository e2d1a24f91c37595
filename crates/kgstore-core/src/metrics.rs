//! Operational counters for the graph engine.
//!
//! Besides plain mutation counts, the engine records every inconsistency it
//! tolerated (skipped neighbors, stale edge records) so that best-effort
//! divergence is observable instead of silent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe counters, shareable between graph handles.
#[derive(Debug, Default)]
pub struct GraphMetrics {
    /// Nodes created.
    pub nodes_added: AtomicU64,
    /// Nodes deleted (explicitly or by pruning).
    pub nodes_removed: AtomicU64,
    /// Edge records written by `add_edge` (2 per undirected edge).
    pub edges_added: AtomicU64,
    /// Edge records deleted by `remove_edge`.
    pub edges_removed: AtomicU64,
    /// Edge records rewritten by `update_edge`.
    pub edges_updated: AtomicU64,
    /// Missing neighbors skipped under the tolerant cascade policy.
    pub cascade_skips: AtomicU64,
    /// Edge records found pointing at a deleted node.
    pub stale_edges: AtomicU64,
    /// Write batches committed.
    pub batches_committed: AtomicU64,
}

/// Point-in-time copy of [`GraphMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// See [`GraphMetrics::nodes_added`].
    pub nodes_added: u64,
    /// See [`GraphMetrics::nodes_removed`].
    pub nodes_removed: u64,
    /// See [`GraphMetrics::edges_added`].
    pub edges_added: u64,
    /// See [`GraphMetrics::edges_removed`].
    pub edges_removed: u64,
    /// See [`GraphMetrics::edges_updated`].
    pub edges_updated: u64,
    /// See [`GraphMetrics::cascade_skips`].
    pub cascade_skips: u64,
    /// See [`GraphMetrics::stale_edges`].
    pub stale_edges: u64,
    /// See [`GraphMetrics::batches_committed`].
    pub batches_committed: u64,
}

impl GraphMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shared metrics instance.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Takes a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            nodes_added: self.nodes_added.load(Ordering::Relaxed),
            nodes_removed: self.nodes_removed.load(Ordering::Relaxed),
            edges_added: self.edges_added.load(Ordering::Relaxed),
            edges_removed: self.edges_removed.load(Ordering::Relaxed),
            edges_updated: self.edges_updated.load(Ordering::Relaxed),
            cascade_skips: self.cascade_skips.load(Ordering::Relaxed),
            stale_edges: self.stale_edges.load(Ordering::Relaxed),
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
        }
    }

    /// Exports metrics in Prometheus text format.
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        use std::fmt::Write;
        let s = self.snapshot();
        let mut output = String::new();

        output.push_str("# HELP kgstore_mutations_total Graph mutations by kind\n");
        output.push_str("# TYPE kgstore_mutations_total counter\n");
        for (kind, value) in [
            ("node_add", s.nodes_added),
            ("node_remove", s.nodes_removed),
            ("edge_add", s.edges_added),
            ("edge_remove", s.edges_removed),
            ("edge_update", s.edges_updated),
        ] {
            let _ = writeln!(output, "kgstore_mutations_total{{kind=\"{kind}\"}} {value}");
        }
        output.push('\n');

        output.push_str("# HELP kgstore_tolerated_inconsistencies_total Divergence skipped instead of failing\n");
        output.push_str("# TYPE kgstore_tolerated_inconsistencies_total counter\n");
        let _ = writeln!(
            output,
            "kgstore_tolerated_inconsistencies_total{{kind=\"missing_neighbor\"}} {}",
            s.cascade_skips
        );
        let _ = writeln!(
            output,
            "kgstore_tolerated_inconsistencies_total{{kind=\"stale_edge\"}} {}\n",
            s.stale_edges
        );

        output.push_str("# HELP kgstore_batches_committed_total Write batches committed\n");
        output.push_str("# TYPE kgstore_batches_committed_total counter\n");
        let _ = writeln!(output, "kgstore_batches_committed_total {}", s.batches_committed);

        output
    }
}
