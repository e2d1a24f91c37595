//! Community reports, keyed by title. No coupling to nodes or edges.

use tracing::debug;

use crate::error::{Error, Result};

use super::backend::GraphBackend;
use super::types::{decode, encode, CommunityRecord};

/// Upsert and lookup of community records.
#[derive(Debug, Clone)]
pub struct CommunityRepository {
    backend: GraphBackend,
}

impl CommunityRepository {
    pub(crate) fn new(backend: GraphBackend) -> Self {
        Self { backend }
    }

    /// Reads a community by title.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if absent, `Error::Corrupt` if the stored document
    /// is not a community.
    pub fn get_community(&self, title: &str) -> Result<CommunityRecord> {
        check_title(title)?;
        let doc = self
            .backend
            .fetch(self.backend.communities(), title)?
            .ok_or_else(|| Error::NotFound(format!("community '{title}'")))?;
        decode(doc, &format!("community '{title}'"))
    }

    /// Returns every community, ordered by title.
    ///
    /// # Errors
    ///
    /// `Error::Corrupt` if any stored document is not a community.
    pub fn list_communities(&self) -> Result<Vec<CommunityRecord>> {
        let mut communities = self
            .backend
            .scan(self.backend.communities())?
            .into_iter()
            .map(|(key, doc)| decode::<CommunityRecord>(doc, &format!("community '{key}'")))
            .collect::<Result<Vec<_>>>()?;
        communities.sort_by(|a, b| a.title().cmp(b.title()));
        Ok(communities)
    }

    /// Creates the community or merges its fields into the stored one.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` if the title is empty.
    pub fn store_community(&self, community: &CommunityRecord) -> Result<()> {
        let title = community.title();
        check_title(title)?;
        let collection = self.backend.communities();
        let doc = encode(community, "community")?;
        self.backend
            .store()
            .set_merge(collection, title, doc)
            .map_err(|e| Error::store(format!("writing {collection}/{title}"), e))?;
        debug!(title, members = community.members().len(), "community stored");
        Ok(())
    }
}

fn check_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(Error::InvalidArgument(
            "community title cannot be empty".to_string(),
        ));
    }
    Ok(())
}
