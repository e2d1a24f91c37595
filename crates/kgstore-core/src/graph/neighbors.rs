//! Nearest-neighbor lookup over node embeddings, delegated to the store's
//! vector index.

use crate::error::{Error, Result};
use crate::store::VectorQuery;

use super::backend::GraphBackend;
use super::types::{decode, NodeRecord};

/// Similarity search over the node collection.
///
/// The store must already maintain a vector index over the configured
/// embedding field; nothing here builds one.
#[derive(Debug, Clone)]
pub struct VectorNeighbors {
    backend: GraphBackend,
}

impl VectorNeighbors {
    pub(crate) fn new(backend: GraphBackend) -> Self {
        Self { backend }
    }

    /// Returns up to `vector.limit` nodes ranked by `vector.metric`, closest first.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` if the query is empty or not finite.
    /// - `Error::Store` if the store has no index for the field.
    /// - `Error::Corrupt` if a returned document is not a node.
    pub fn nearest_neighbors(&self, query: &[f32]) -> Result<Vec<NodeRecord>> {
        if query.is_empty() {
            return Err(Error::InvalidArgument(
                "query vector cannot be empty".to_string(),
            ));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidArgument(
                "query vector contains NaN or infinite values".to_string(),
            ));
        }

        let settings = &self.backend.config().vector;
        let request = VectorQuery {
            field: settings.field.clone(),
            vector: query.to_vec(),
            limit: settings.limit,
            metric: settings.metric,
        };
        let collection = self.backend.nodes();
        let docs = self
            .backend
            .store()
            .find_nearest(collection, &request)
            .map_err(|e| {
                Error::store(
                    format!("querying nearest neighbors in {collection}"),
                    e,
                )
            })?;

        docs.into_iter()
            .map(|doc| decode(doc, "nearest-neighbor result"))
            .collect()
    }
}
