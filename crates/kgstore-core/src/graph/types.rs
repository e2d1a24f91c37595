//! Record types persisted in the node, edge and community collections.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::store::Document;

use super::edge_id::{edge_uid, validate_uid};

/// Node fields owned by the graph itself; they cannot be used as attribute names.
pub const RESERVED_NODE_FIELDS: [&str; 5] =
    ["uid", "description", "embedding", "edges_to", "edges_from"];

/// A node (entity) in the knowledge graph.
///
/// Besides its uid and description, a node carries an open attribute bag and
/// an optional embedding. `edges_to` / `edges_from` are written only by the
/// graph engine; a node handed to `add_node` must have both empty.
///
/// # Example
///
/// ```rust
/// use kgstore_core::graph::NodeRecord;
/// use serde_json::json;
///
/// let node = NodeRecord::new("ADA LOVELACE", "Mathematician and writer")
///     .with_attribute("node_type", json!("PERSON"))
///     .with_embedding(vec![0.1, 0.2, 0.3]);
///
/// assert_eq!(node.uid(), "ADA LOVELACE");
/// assert_eq!(node.node_type(), Some("PERSON"));
/// assert!(node.edges_to().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    uid: String,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
    #[serde(default)]
    edges_to: BTreeSet<String>,
    #[serde(default)]
    edges_from: BTreeSet<String>,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl NodeRecord {
    /// Creates a node with empty adjacency and no attributes.
    #[must_use]
    pub fn new(uid: &str, description: &str) -> Self {
        Self {
            uid: uid.to_string(),
            description: description.to_string(),
            embedding: None,
            edges_to: BTreeSet::new(),
            edges_from: BTreeSet::new(),
            attributes: Map::new(),
        }
    }

    /// Sets an attribute (builder pattern).
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Replaces the attribute bag (builder pattern).
    #[must_use]
    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets the embedding (builder pattern).
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Sets outbound neighbors (builder pattern).
    ///
    /// Only useful for records built outside the engine; `add_node` rejects
    /// nodes with non-empty adjacency.
    #[must_use]
    pub fn with_edges_to<I: IntoIterator<Item = String>>(mut self, uids: I) -> Self {
        self.edges_to = uids.into_iter().collect();
        self
    }

    /// Sets inbound neighbors (builder pattern). See [`Self::with_edges_to`].
    #[must_use]
    pub fn with_edges_from<I: IntoIterator<Item = String>>(mut self, uids: I) -> Self {
        self.edges_from = uids.into_iter().collect();
        self
    }

    /// Returns the node uid.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Returns the textual description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the embedding, if any.
    #[must_use]
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    /// Outbound neighbors.
    #[must_use]
    pub fn edges_to(&self) -> &BTreeSet<String> {
        &self.edges_to
    }

    /// Inbound neighbors.
    #[must_use]
    pub fn edges_from(&self) -> &BTreeSet<String> {
        &self.edges_from
    }

    /// `|edges_to| + |edges_from|`.
    #[must_use]
    pub fn adjacency_len(&self) -> usize {
        self.edges_to.len() + self.edges_from.len()
    }

    /// Returns all attributes.
    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Returns a specific attribute, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// `title` attribute.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.attribute("title").and_then(Value::as_str)
    }

    /// `node_type` attribute.
    #[must_use]
    pub fn node_type(&self) -> Option<&str> {
        self.attribute("node_type").and_then(Value::as_str)
    }

    /// `document_id` attribute (source document the node was extracted from).
    #[must_use]
    pub fn document_id(&self) -> Option<&str> {
        self.attribute("document_id").and_then(Value::as_str)
    }

    /// `community_id` attribute.
    #[must_use]
    pub fn community_id(&self) -> Option<&str> {
        self.attribute("community_id").and_then(Value::as_str)
    }

    /// `degree` attribute, as recorded by the extraction pipeline.
    ///
    /// Independent of the stored adjacency; see [`Self::adjacency_len`].
    #[must_use]
    pub fn degree(&self) -> Option<u64> {
        self.attribute("degree").and_then(Value::as_u64)
    }

    pub(crate) fn validate_new(&self, uid: &str) -> Result<()> {
        validate_uid(uid)?;
        if self.uid != uid {
            return Err(Error::InvalidArgument(format!(
                "node record uid '{}' does not match '{uid}'",
                self.uid
            )));
        }
        if !self.edges_to.is_empty() || !self.edges_from.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "node '{uid}' cannot be created with edges_to or edges_from; add edges separately"
            )));
        }
        check_embedding(self.embedding.as_deref())?;
        check_reserved(&self.attributes)
    }
}

// serde_json writes NaN and infinities as null, which no longer decodes as f32
fn check_embedding(embedding: Option<&[f32]>) -> Result<()> {
    match embedding.and_then(|v| v.iter().position(|x| !x.is_finite())) {
        Some(index) => Err(Error::InvalidArgument(format!(
            "embedding component {index} is not a finite number"
        ))),
        None => Ok(()),
    }
}

fn check_reserved(attributes: &Map<String, Value>) -> Result<()> {
    match attributes
        .keys()
        .find(|k| RESERVED_NODE_FIELDS.contains(&k.as_str()))
    {
        Some(name) => Err(Error::InvalidArgument(format!(
            "'{name}' is a reserved node field and cannot be used as an attribute"
        ))),
        None => Ok(()),
    }
}

/// Partial update of a node's attribute fields.
///
/// Adjacency is deliberately absent: it belongs to the graph engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl NodePatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the description.
    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Overwrites the embedding.
    #[must_use]
    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Overwrites one attribute.
    #[must_use]
    pub fn attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.embedding.is_none() && self.attributes.is_empty()
    }

    pub(crate) fn to_document(&self) -> Result<Document> {
        check_embedding(self.embedding.as_deref())?;
        check_reserved(&self.attributes)?;
        encode(self, "node patch")
    }
}

/// An edge (relationship) record, keyed by its derived `edge_uid`.
///
/// # Example
///
/// ```rust
/// use kgstore_core::graph::EdgeRecord;
///
/// let edge = EdgeRecord::new("A", "B", "A employs B", false).unwrap();
/// assert_eq!(edge.edge_uid(), "A_to_B");
/// assert!(!edge.is_directed());
/// assert_eq!(edge.reversed().edge_uid(), "B_to_A");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    edge_uid: String,
    source_uid: String,
    target_uid: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_directed")]
    directed: bool,
}

fn default_directed() -> bool {
    true
}

impl EdgeRecord {
    /// Creates an edge between two node uids.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if either uid is empty or contains
    /// the edge uid delimiter.
    pub fn new(source_uid: &str, target_uid: &str, description: &str, directed: bool) -> Result<Self> {
        Ok(Self {
            edge_uid: edge_uid(source_uid, target_uid)?,
            source_uid: source_uid.to_string(),
            target_uid: target_uid.to_string(),
            description: description.to_string(),
            directed,
        })
    }

    /// Creates a directed edge.
    pub fn directed(source_uid: &str, target_uid: &str, description: &str) -> Result<Self> {
        Self::new(source_uid, target_uid, description, true)
    }

    /// Creates an undirected edge.
    pub fn undirected(source_uid: &str, target_uid: &str, description: &str) -> Result<Self> {
        Self::new(source_uid, target_uid, description, false)
    }

    /// Returns the same edge with source and target swapped.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            edge_uid: format!(
                "{}{}{}",
                self.target_uid,
                super::edge_id::EDGE_UID_DELIMITER,
                self.source_uid
            ),
            source_uid: self.target_uid.clone(),
            target_uid: self.source_uid.clone(),
            description: self.description.clone(),
            directed: self.directed,
        }
    }

    /// Returns the derived key.
    #[must_use]
    pub fn edge_uid(&self) -> &str {
        &self.edge_uid
    }

    /// Returns the source node uid.
    #[must_use]
    pub fn source_uid(&self) -> &str {
        &self.source_uid
    }

    /// Returns the target node uid.
    #[must_use]
    pub fn target_uid(&self) -> &str {
        &self.target_uid
    }

    /// Returns the relationship description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true for a directed edge.
    #[must_use]
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Returns true if source and target are the same node.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source_uid == self.target_uid
    }

    /// Checks uids and that `edge_uid` matches the endpoints.
    ///
    /// Records built with [`Self::new`] always pass; deserialized ones may not.
    pub fn validate(&self) -> Result<()> {
        let expected = edge_uid(&self.source_uid, &self.target_uid)?;
        if self.edge_uid != expected {
            return Err(Error::InvalidArgument(format!(
                "edge_uid '{}' does not match endpoints (expected '{expected}')",
                self.edge_uid
            )));
        }
        Ok(())
    }
}

/// A community report (group of related nodes), keyed by title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRecord {
    title: String,
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rating_explanation: Option<String>,
    #[serde(default)]
    findings: Vec<Value>,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl CommunityRecord {
    /// Creates a community with a title and summary.
    #[must_use]
    pub fn new(title: &str, summary: &str) -> Self {
        Self {
            title: title.to_string(),
            members: Vec::new(),
            summary: summary.to_string(),
            rating: None,
            rating_explanation: None,
            findings: Vec::new(),
            attributes: Map::new(),
        }
    }

    /// Sets the member node uids (builder pattern).
    #[must_use]
    pub fn with_members<I: IntoIterator<Item = String>>(mut self, members: I) -> Self {
        self.members = members.into_iter().collect();
        self
    }

    /// Sets the rating and its explanation (builder pattern).
    #[must_use]
    pub fn with_rating(mut self, rating: f32, explanation: &str) -> Self {
        self.rating = Some(rating);
        self.rating_explanation = Some(explanation.to_string());
        self
    }

    /// Appends a finding (builder pattern).
    #[must_use]
    pub fn with_finding(mut self, finding: Value) -> Self {
        self.findings.push(finding);
        self
    }

    /// Sets an extra attribute (builder pattern).
    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: Value) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Returns the title (primary key).
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns member node uids.
    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Returns the summary.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Returns the rating, if any.
    #[must_use]
    pub fn rating(&self) -> Option<f32> {
        self.rating
    }

    /// Returns the rating explanation, if any.
    #[must_use]
    pub fn rating_explanation(&self) -> Option<&str> {
        self.rating_explanation.as_deref()
    }

    /// Returns the findings.
    #[must_use]
    pub fn findings(&self) -> &[Value] {
        &self.findings
    }

    /// Returns a specific extra attribute, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

pub(crate) fn encode<T: Serialize>(value: &T, what: &str) -> Result<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(other) => Err(Error::InvalidArgument(format!(
            "{what} serialized to a non-object value: {other}"
        ))),
        Err(e) => Err(Error::InvalidArgument(format!(
            "{what} cannot be serialized: {e}"
        ))),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(doc: Document, what: &str) -> Result<T> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| Error::Corrupt(format!("{what} does not match the expected shape: {e}")))
}
