use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved prefix for client-minted temporary identities. Permanent ids are
/// assigned by the backing store and never carry it.
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Property map shared by vertices and edges.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl VertexId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for ids minted client-side inside a not-yet-committed transaction.
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }
}

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A property value: scalar, array, or nested map. Serializes to the natural
/// JSON shape, which is also how the backing store persists property columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

/// A vertex with exactly one label and adjacency indexes keyed by edge type.
///
/// The adjacency indexes are maintained by the graph store, not by callers:
/// `outgoing` holds the ids of edges whose source is this vertex, `incoming`
/// the ids of edges whose target is this vertex, grouped by edge type name.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: VertexId,
    pub label: String,
    pub properties: PropertyMap,
    pub outgoing: BTreeMap<String, BTreeSet<EdgeId>>,
    pub incoming: BTreeMap<String, BTreeSet<EdgeId>>,
}

impl Vertex {
    pub fn new(id: VertexId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            properties: PropertyMap::new(),
            outgoing: BTreeMap::new(),
            incoming: BTreeMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }
}

/// A typed, directed, property-bearing edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub type_name: String,
    pub source: VertexId,
    pub target: VertexId,
    pub properties: PropertyMap,
}

impl Edge {
    pub fn new(
        id: EdgeId,
        type_name: impl Into<String>,
        source: VertexId,
        target: VertexId,
    ) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            source,
            target,
            properties: PropertyMap::new(),
        }
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties = properties;
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            id: self.id.clone(),
            type_name: self.type_name.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
        }
    }

    /// An edge is addressed by its full (id, type, source, target) quadruple;
    /// replace/delete must match all four or report not-found.
    pub fn matches(&self, key: &EdgeKey) -> bool {
        self.id == key.id
            && self.type_name == key.type_name
            && self.source == key.source
            && self.target == key.target
    }
}

/// The quadruple that uniquely addresses an edge for replace/delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeKey {
    pub id: EdgeId,
    pub type_name: String,
    pub source: VertexId,
    pub target: VertexId,
}

impl EdgeKey {
    pub fn new(
        id: EdgeId,
        type_name: impl Into<String>,
        source: VertexId,
        target: VertexId,
    ) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            source,
            target,
        }
    }
}
