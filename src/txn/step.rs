use std::collections::BTreeMap;

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeId, EdgeKey, PropertyMap, PropertyValue, Vertex, VertexId};
use crate::store::GraphStore;

/// One forward mutation plus the minimal prior-state snapshot required to
/// invert it exactly.
///
/// A merge records only the previous values of the keys it patched (`None`
/// for keys that were absent); a delete records the full entity, including,
/// for vertices, the incident edges that were pruned alongside it.
#[derive(Debug, Clone)]
pub enum Step {
    InsertVertex {
        id: VertexId,
    },
    MergeVertex {
        id: VertexId,
        previous: BTreeMap<String, Option<PropertyValue>>,
    },
    ReplaceVertex {
        id: VertexId,
        previous: PropertyMap,
    },
    DeleteVertex {
        vertex: Vertex,
        edges: Vec<Edge>,
    },
    InsertEdge {
        id: EdgeId,
    },
    ReplaceEdge {
        key: EdgeKey,
        previous: PropertyMap,
    },
    DeleteEdge {
        edge: Edge,
    },
}

impl Step {
    /// Applies the inverse of this step to the store. Steps are inverted in
    /// reverse log order, so every entity a snapshot refers to is guaranteed
    /// to be back in place by the time its step is reached.
    pub(crate) fn invert(&self, store: &mut GraphStore) -> Result<()> {
        match self {
            Step::InsertVertex { id } => {
                store
                    .remove_vertex(id)
                    .ok_or_else(|| GraphError::not_found("vertex", id.as_str()))?;
                Ok(())
            }
            Step::MergeVertex { id, previous } => {
                let vertex = store
                    .vertex_mut(id)
                    .ok_or_else(|| GraphError::not_found("vertex", id.as_str()))?;
                for (key, prior) in previous {
                    match prior {
                        Some(value) => {
                            vertex.properties.insert(key.clone(), value.clone());
                        }
                        None => {
                            vertex.properties.remove(key);
                        }
                    }
                }
                Ok(())
            }
            Step::ReplaceVertex { id, previous } => {
                let vertex = store
                    .vertex_mut(id)
                    .ok_or_else(|| GraphError::not_found("vertex", id.as_str()))?;
                vertex.properties = previous.clone();
                Ok(())
            }
            Step::DeleteVertex { vertex, edges } => {
                store.put_vertex(vertex.clone());
                for edge in edges {
                    store.put_edge(edge.clone())?;
                }
                Ok(())
            }
            Step::InsertEdge { id } => {
                store
                    .remove_edge(id)
                    .ok_or_else(|| GraphError::not_found("edge", id.as_str()))?;
                Ok(())
            }
            Step::ReplaceEdge { key, previous } => {
                let edge = store
                    .edge_mut(&key.id)
                    .ok_or_else(|| GraphError::not_found("edge", key.id.as_str()))?;
                edge.properties = previous.clone();
                Ok(())
            }
            Step::DeleteEdge { edge } => store.put_edge(edge.clone()),
        }
    }
}
