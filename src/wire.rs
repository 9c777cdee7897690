//! Serde types for the commit protocol.
//!
//! Every mutation kind is a closed tagged-union variant; unknown or malformed
//! shapes are rejected at the parse boundary (see `server::validator`) rather
//! than at arbitrary points downstream.

use serde::{Deserialize, Serialize};

use crate::model::{Edge, EdgeId, PropertyMap, Vertex, VertexId};
use crate::txn::TxnId;

/// One (old id, new id) pair; serializes as a two-element array.
pub type IdMapEntry = (String, String);

/// The batch a client sends to commit one transaction atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub txn_id: TxnId,
    /// Identity mappings already known from an earlier partial commit, so the
    /// server can resolve cross-batch references.
    pub vertex_id_map: Vec<IdMapEntry>,
    pub edge_id_map: Vec<IdMapEntry>,
    pub transactions: Vec<Mutation>,
}

/// A single mutation object: a record containing exactly one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    #[serde(rename = "insert")]
    Insert(VertexPayload),
    #[serde(rename = "replace")]
    Replace(VertexPayload),
    #[serde(rename = "merge")]
    Merge(VertexPayload),
    #[serde(rename = "deleteVertex")]
    DeleteVertex(VertexPayload),
    #[serde(rename = "insertEdge")]
    InsertEdge(EdgePayload),
    #[serde(rename = "replaceEdge")]
    ReplaceEdge(EdgePayload),
    #[serde(rename = "deleteEdge")]
    DeleteEdge(EdgePayload),
}

/// Operation name tag used in per-operation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    #[serde(rename = "insert")]
    Insert,
    #[serde(rename = "replace")]
    Replace,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "deleteVertex")]
    DeleteVertex,
    #[serde(rename = "insertEdge")]
    InsertEdge,
    #[serde(rename = "replaceEdge")]
    ReplaceEdge,
    #[serde(rename = "deleteEdge")]
    DeleteEdge,
}

/// Vertex state on the wire: exactly one label, a property map, and an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexPayload {
    pub id: String,
    pub label: String,
    pub properties: PropertyMap,
}

impl VertexPayload {
    pub fn from_vertex(vertex: &Vertex) -> Self {
        Self {
            id: vertex.id.0.clone(),
            label: vertex.label.clone(),
            properties: vertex.properties.clone(),
        }
    }

    pub fn to_vertex(&self) -> Vertex {
        Vertex::new(VertexId::new(self.id.clone()), self.label.clone())
            .with_properties(self.properties.clone())
    }
}

/// Edge state on the wire: type, start id, end id, property map, and id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgePayload {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub start: String,
    pub end: String,
    pub properties: PropertyMap,
}

impl EdgePayload {
    pub fn from_edge(edge: &Edge) -> Self {
        Self {
            id: edge.id.0.clone(),
            type_name: edge.type_name.clone(),
            start: edge.source.0.clone(),
            end: edge.target.0.clone(),
            properties: edge.properties.clone(),
        }
    }

    pub fn to_edge(&self) -> Edge {
        Edge::new(
            EdgeId::new(self.id.clone()),
            self.type_name.clone(),
            VertexId::new(self.start.clone()),
            VertexId::new(self.end.clone()),
        )
        .with_properties(self.properties.clone())
    }
}

/// Result of one mutation object, in batch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation: MutationKind,
    pub outcome: OpOutcome,
}

impl OperationResult {
    pub fn mapped(operation: MutationKind, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            operation,
            outcome: OpOutcome::Mapped(old.into(), new.into()),
        }
    }

    pub fn not_found(operation: MutationKind, id: impl Into<String>) -> Self {
        Self {
            operation,
            outcome: OpOutcome::Failed {
                error: true,
                id: id.into(),
                message: "not found".to_string(),
            },
        }
    }
}

/// Success carries the `[oldId, newId]` pair; failure an error record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpOutcome {
    Mapped(String, String),
    Failed {
        error: bool,
        id: String,
        message: String,
    },
}

/// Fresh server state of every entity a batch touched, plus deletions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphPatch {
    pub vertexes: Vec<VertexPayload>,
    pub edges: Vec<EdgePayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted_vertexes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted_edges: Vec<String>,
}

/// Server response to a commit request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub txn_id: TxnId,
    pub client_to_server_vertex_id_map: Vec<IdMapEntry>,
    pub client_to_server_edge_id_map: Vec<IdMapEntry>,
    pub data: Vec<OperationResult>,
    pub graph: GraphPatch,
}
