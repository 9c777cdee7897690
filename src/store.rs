use rustc_hash::FxHashMap;

use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeId, Vertex, VertexId};

/// Direction of an adjacency query relative to the queried vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// In-memory property graph: the single source of truth the client reads and
/// writes. All mutations are synchronous and immediately visible to
/// subsequent reads.
///
/// The store maintains the adjacency indexes on both endpoints of every edge
/// itself. Removing a vertex also removes its incident edges and prunes the
/// peer adjacency entries, so the store never contains an edge pointing at a
/// missing vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStore {
    vertices: FxHashMap<VertexId, Vertex>,
    edges: FxHashMap<EdgeId, Edge>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex(&self, id: &VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub(crate) fn vertex_mut(&mut self, id: &VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(id)
    }

    pub(crate) fn edge_mut(&mut self, id: &EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(id)
    }

    pub fn contains_vertex(&self, id: &VertexId) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn contains_edge(&self, id: &EdgeId) -> bool {
        self.edges.contains_key(id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex_ids(&self) -> impl Iterator<Item = &VertexId> {
        self.vertices.keys()
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = &EdgeId> {
        self.edges.keys()
    }

    /// Inserts or overwrites a vertex. Adjacency indexes on the supplied
    /// value are taken as-is; the put of an edge is what wires them up.
    pub fn put_vertex(&mut self, vertex: Vertex) {
        self.vertices.insert(vertex.id.clone(), vertex);
    }

    /// Inserts or overwrites an edge and links it into the adjacency indexes
    /// of both endpoints. Fails with `NotFound` if either endpoint is absent.
    pub fn put_edge(&mut self, edge: Edge) -> Result<()> {
        if !self.vertices.contains_key(&edge.source) {
            return Err(GraphError::not_found("vertex", edge.source.as_str()));
        }
        if !self.vertices.contains_key(&edge.target) {
            return Err(GraphError::not_found("vertex", edge.target.as_str()));
        }
        if let Some(old) = self.edges.remove(&edge.id) {
            self.unlink(&old);
        }
        self.link(&edge);
        self.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    /// Removes a vertex together with its incident edges. Returns the removed
    /// vertex and every edge that was pruned with it, or `None` if the vertex
    /// does not exist.
    pub fn remove_vertex(&mut self, id: &VertexId) -> Option<(Vertex, Vec<Edge>)> {
        let vertex = self.vertices.remove(id)?;
        let mut incident: Vec<EdgeId> = Vec::new();
        for set in vertex.outgoing.values().chain(vertex.incoming.values()) {
            for edge_id in set {
                if !incident.contains(edge_id) {
                    incident.push(edge_id.clone());
                }
            }
        }
        let mut removed = Vec::with_capacity(incident.len());
        for edge_id in incident {
            if let Some(edge) = self.edges.remove(&edge_id) {
                self.unlink(&edge);
                removed.push(edge);
            }
        }
        Some((vertex, removed))
    }

    /// Removes an edge and prunes both endpoints' adjacency entries.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        self.unlink(&edge);
        Some(edge)
    }

    /// Ids of the edges of the given type incident to `vertex` in the given
    /// direction. Empty if the vertex or the type is unknown.
    pub fn edges_of_type(
        &self,
        vertex: &VertexId,
        type_name: &str,
        direction: Direction,
    ) -> Vec<EdgeId> {
        let Some(v) = self.vertices.get(vertex) else {
            return Vec::new();
        };
        let index = match direction {
            Direction::Outgoing => &v.outgoing,
            Direction::Incoming => &v.incoming,
        };
        index
            .get(type_name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Rewrites a vertex key in place, fixing up the endpoint references of
    /// every incident edge. Used by reconciliation to swap a temporary id for
    /// the permanent one; the entity itself is unchanged.
    pub(crate) fn rename_vertex(&mut self, old: &VertexId, new: VertexId) -> Result<()> {
        if self.vertices.contains_key(&new) {
            return Err(GraphError::InvalidArgument(format!(
                "cannot rename vertex {old}: {new} already exists"
            )));
        }
        let mut vertex = self
            .vertices
            .remove(old)
            .ok_or_else(|| GraphError::not_found("vertex", old.as_str()))?;
        for set in vertex.outgoing.values().chain(vertex.incoming.values()) {
            for edge_id in set {
                if let Some(edge) = self.edges.get_mut(edge_id) {
                    if edge.source == *old {
                        edge.source = new.clone();
                    }
                    if edge.target == *old {
                        edge.target = new.clone();
                    }
                }
            }
        }
        vertex.id = new.clone();
        self.vertices.insert(new, vertex);
        Ok(())
    }

    /// Rewrites an edge key in place, fixing up both endpoints' adjacency
    /// sets.
    pub(crate) fn rename_edge(&mut self, old: &EdgeId, new: EdgeId) -> Result<()> {
        if self.edges.contains_key(&new) {
            return Err(GraphError::InvalidArgument(format!(
                "cannot rename edge {old}: {new} already exists"
            )));
        }
        let mut edge = self
            .edges
            .remove(old)
            .ok_or_else(|| GraphError::not_found("edge", old.as_str()))?;
        self.unlink(&edge);
        edge.id = new.clone();
        self.link(&edge);
        self.edges.insert(new, edge);
        Ok(())
    }

    fn link(&mut self, edge: &Edge) {
        if let Some(source) = self.vertices.get_mut(&edge.source) {
            source
                .outgoing
                .entry(edge.type_name.clone())
                .or_default()
                .insert(edge.id.clone());
        }
        if let Some(target) = self.vertices.get_mut(&edge.target) {
            target
                .incoming
                .entry(edge.type_name.clone())
                .or_default()
                .insert(edge.id.clone());
        }
    }

    fn unlink(&mut self, edge: &Edge) {
        if let Some(source) = self.vertices.get_mut(&edge.source) {
            if let Some(set) = source.outgoing.get_mut(&edge.type_name) {
                set.remove(&edge.id);
                if set.is_empty() {
                    source.outgoing.remove(&edge.type_name);
                }
            }
        }
        if let Some(target) = self.vertices.get_mut(&edge.target) {
            if let Some(set) = target.incoming.get_mut(&edge.type_name) {
                set.remove(&edge.id);
                if set.is_empty() {
                    target.incoming.remove(&edge.type_name);
                }
            }
        }
    }
}
