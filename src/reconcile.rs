//! Client-side reconciliation of a commit response.
//!
//! Rewrites every store key, edge endpoint, and adjacency reference that used
//! a mapped temporary id to its permanent id, merges the server-confirmed
//! state of touched entities (server wins), removes deleted entities, and
//! marks the transaction committed. A temporary id missing from the returned
//! map is left unresolved and reported as a recoverable warning; the store is
//! never corrupted over a gap.

use tracing::{info, warn};

use crate::error::{GraphError, Result};
use crate::model::{EdgeId, VertexId};
use crate::session::Session;
use crate::store::GraphStore;
use crate::sync::ChangeNotice;
use crate::txn::{Step, TxnState};
use crate::wire::{CommitResponse, GraphPatch};

/// Temporary ids the reconciler expected in the response map but did not
/// find. The entities stay in the store under their temporary ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub unresolved_vertexes: Vec<VertexId>,
    pub unresolved_edges: Vec<EdgeId>,
}

impl ReconcileOutcome {
    pub fn is_clean(&self) -> bool {
        self.unresolved_vertexes.is_empty() && self.unresolved_edges.is_empty()
    }
}

impl Session {
    /// Patches the local store from a successful commit response and marks
    /// the transaction committed. Emits one change notice to subscribed
    /// observers.
    pub fn apply_commit_response(&mut self, response: &CommitResponse) -> Result<ReconcileOutcome> {
        let txn = self.txn(response.txn_id)?;
        if matches!(txn.state(), TxnState::Committed | TxnState::Discarded) {
            return Err(GraphError::TransactionClosed(response.txn_id));
        }

        // Gap check against the step log before it stops mattering: every
        // temporary id this transaction inserted should come back mapped.
        // Temporariness is judged by the session's configured prefix, which
        // may differ from the default.
        let prefix = self.config.temp_id_prefix.as_str();
        let mut outcome = ReconcileOutcome::default();
        for step in txn.steps() {
            match step {
                Step::InsertVertex { id } if id.as_str().starts_with(prefix) => {
                    if !response
                        .client_to_server_vertex_id_map
                        .iter()
                        .any(|(old, _)| old == id.as_str())
                    {
                        let gap = GraphError::ReconciliationGap(id.to_string());
                        warn!(error = %gap, "vertex left unresolved");
                        outcome.unresolved_vertexes.push(id.clone());
                    }
                }
                Step::InsertEdge { id } if id.as_str().starts_with(prefix) => {
                    if !response
                        .client_to_server_edge_id_map
                        .iter()
                        .any(|(old, _)| old == id.as_str())
                    {
                        let gap = GraphError::ReconciliationGap(id.to_string());
                        warn!(error = %gap, "edge left unresolved");
                        outcome.unresolved_edges.push(id.clone());
                    }
                }
                _ => {}
            }
        }

        rename_entities(&mut self.store, response, &mut outcome);
        patch_graph(&mut self.store, &response.graph)?;

        self.vertex_id_map
            .extend(response.client_to_server_vertex_id_map.iter().cloned());
        self.edge_id_map
            .extend(response.client_to_server_edge_id_map.iter().cloned());

        let txn = self
            .txns
            .get_mut(&response.txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", response.txn_id.to_string()))?;
        txn.set_state(TxnState::Committed);
        info!(
            txn_id = response.txn_id,
            vertexes = response.client_to_server_vertex_id_map.len(),
            edges = response.client_to_server_edge_id_map.len(),
            clean = outcome.is_clean(),
            "transaction reconciled"
        );

        self.observers.emit(&ChangeNotice {
            txn_id: response.txn_id,
            vertex_id_map: response.client_to_server_vertex_id_map.clone(),
            edge_id_map: response.client_to_server_edge_id_map.clone(),
            graph: response.graph.clone(),
        });
        Ok(outcome)
    }

    /// Inbound handler for change notices broadcast by other sessions on the
    /// same logical document. Best-effort: applies whatever is applicable and
    /// never fails the local session over a foreign commit.
    pub fn apply_change_notice(&mut self, notice: &ChangeNotice) {
        for (old, new) in &notice.vertex_id_map {
            let old = VertexId::new(old.clone());
            let new = VertexId::new(new.clone());
            if self.store.contains_vertex(&old) && !self.store.contains_vertex(&new) {
                if let Err(err) = self.store.rename_vertex(&old, new) {
                    warn!(error = %err, "skipped vertex rename from change notice");
                }
            }
        }
        for (old, new) in &notice.edge_id_map {
            let old = EdgeId::new(old.clone());
            let new = EdgeId::new(new.clone());
            if self.store.contains_edge(&old) && !self.store.contains_edge(&new) {
                if let Err(err) = self.store.rename_edge(&old, new) {
                    warn!(error = %err, "skipped edge rename from change notice");
                }
            }
        }
        if let Err(err) = patch_graph(&mut self.store, &notice.graph) {
            warn!(error = %err, "partial apply of change notice");
        }
    }
}

/// Swaps mapped temporary keys for their permanent ids. A rename that cannot
/// apply (the permanent id already arrived through a foreign change notice)
/// is skipped and recorded as unresolved rather than aborting mid-map: the
/// following graph patch installs the server's copy under the permanent id
/// either way.
fn rename_entities(
    store: &mut GraphStore,
    response: &CommitResponse,
    outcome: &mut ReconcileOutcome,
) {
    for (old, new) in &response.client_to_server_vertex_id_map {
        let old = VertexId::new(old.clone());
        if store.contains_vertex(&old) {
            if let Err(err) = store.rename_vertex(&old, VertexId::new(new.clone())) {
                warn!(error = %err, "skipped vertex rename from commit response");
                outcome.unresolved_vertexes.push(old);
            }
        }
    }
    for (old, new) in &response.client_to_server_edge_id_map {
        let old = EdgeId::new(old.clone());
        if store.contains_edge(&old) {
            if let Err(err) = store.rename_edge(&old, EdgeId::new(new.clone())) {
                warn!(error = %err, "skipped edge rename from commit response");
                outcome.unresolved_edges.push(old);
            }
        }
    }
}

/// Overwrites local entity state with the server-confirmed copy and applies
/// deletions. Adjacency indexes are preserved for entities that already exist
/// locally; new edges are linked in if both endpoints are present.
fn patch_graph(store: &mut GraphStore, graph: &GraphPatch) -> Result<()> {
    for payload in &graph.vertexes {
        let id = VertexId::new(payload.id.clone());
        match store.vertex_mut(&id) {
            Some(vertex) => {
                vertex.label = payload.label.clone();
                vertex.properties = payload.properties.clone();
            }
            None => store.put_vertex(payload.to_vertex()),
        }
    }
    for payload in &graph.edges {
        let id = EdgeId::new(payload.id.clone());
        match store.edge_mut(&id) {
            Some(edge) => {
                edge.properties = payload.properties.clone();
            }
            None => {
                let edge = payload.to_edge();
                if store.contains_vertex(&edge.source) && store.contains_vertex(&edge.target) {
                    store.put_edge(edge)?;
                } else {
                    warn!(id = %id, "edge patch skipped: endpoint not in local store");
                }
            }
        }
    }
    for id in &graph.deleted_vertexes {
        store.remove_vertex(&VertexId::new(id.clone()));
    }
    for id in &graph.deleted_edges {
        store.remove_edge(&EdgeId::new(id.clone()));
    }
    Ok(())
}
