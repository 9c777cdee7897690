//! Commit serialization: turning a transaction's step log into a portable
//! batch.
//!
//! The batch carries the *net* state for created and replaced entities (their
//! current label and full property map), not the raw per-step deltas, so the
//! server writes each entity's final shape. An entity that was inserted and
//! later deleted inside the same transaction still ships both operations; the
//! serializer is a faithful transcript of the log and the server's delete
//! handling keeps the per-operation results aligned with it.

use tracing::info;

use crate::error::{GraphError, Result};
use crate::model::{EdgeId, VertexId};
use crate::session::Session;
use crate::store::GraphStore;
use crate::txn::{Step, TxnId, TxnState};
use crate::wire::{CommitRequest, EdgePayload, Mutation, VertexPayload};

impl Session {
    /// Serializes the transaction's steps into a commit batch and flips the
    /// transaction into the pending (in-flight) state.
    ///
    /// The serializer never contacts the network; the caller ships the batch
    /// and feeds the response back through
    /// [`apply_commit_response`](Self::apply_commit_response) or reports a
    /// failed send with [`commit_failed`](Self::commit_failed). A second
    /// prepare while the first is unresolved fails with `TransactionClosed`.
    pub fn prepare_commit(&mut self, txn_id: TxnId) -> Result<CommitRequest> {
        let txn = self.txn(txn_id)?;
        txn.ensure_active()?;

        let steps = txn.steps();
        let mut transactions = Vec::with_capacity(steps.len());
        for step in steps {
            transactions.push(match step {
                Step::InsertVertex { id } => {
                    Mutation::Insert(vertex_state(&self.store, steps, id)?)
                }
                Step::MergeVertex { id, previous } => {
                    let mut state = vertex_state(&self.store, steps, id)?;
                    // Patch payload: only the touched keys, at their current
                    // values. Keys a later replace removed are omitted.
                    state
                        .properties
                        .retain(|key, _| previous.contains_key(key));
                    Mutation::Merge(state)
                }
                Step::ReplaceVertex { id, .. } => {
                    Mutation::Replace(vertex_state(&self.store, steps, id)?)
                }
                Step::DeleteVertex { vertex, .. } => {
                    Mutation::DeleteVertex(VertexPayload::from_vertex(vertex))
                }
                Step::InsertEdge { id } => {
                    Mutation::InsertEdge(edge_state(&self.store, steps, id)?)
                }
                Step::ReplaceEdge { key, .. } => {
                    Mutation::ReplaceEdge(edge_state(&self.store, steps, &key.id)?)
                }
                Step::DeleteEdge { edge } => Mutation::DeleteEdge(EdgePayload::from_edge(edge)),
            });
        }

        let request = CommitRequest {
            txn_id,
            vertex_id_map: self.vertex_id_map.clone(),
            edge_id_map: self.edge_id_map.clone(),
            transactions,
        };
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.set_state(TxnState::Pending);
        info!(
            txn_id,
            mutations = request.transactions.len(),
            "commit prepared"
        );
        Ok(request)
    }

    /// Returns an in-flight transaction to the active state so the caller can
    /// retry after a failed or ignored commit attempt.
    pub fn commit_failed(&mut self, txn_id: TxnId) -> Result<()> {
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        if txn.state() != TxnState::Pending {
            return Err(GraphError::TransactionClosed(txn_id));
        }
        txn.set_state(TxnState::Active);
        info!(txn_id, "commit attempt abandoned, transaction reopened");
        Ok(())
    }
}

/// Current full state of a vertex: from the store if it is still present,
/// otherwise from the delete step that removed it later in the log.
fn vertex_state(store: &GraphStore, steps: &[Step], id: &VertexId) -> Result<VertexPayload> {
    if let Some(vertex) = store.vertex(id) {
        return Ok(VertexPayload::from_vertex(vertex));
    }
    for step in steps {
        if let Step::DeleteVertex { vertex, .. } = step {
            if vertex.id == *id {
                return Ok(VertexPayload::from_vertex(vertex));
            }
        }
    }
    Err(GraphError::not_found("vertex", id.as_str()))
}

fn edge_state(store: &GraphStore, steps: &[Step], id: &EdgeId) -> Result<EdgePayload> {
    if let Some(edge) = store.edge(id) {
        return Ok(EdgePayload::from_edge(edge));
    }
    for step in steps {
        match step {
            Step::DeleteEdge { edge } if edge.id == *id => {
                return Ok(EdgePayload::from_edge(edge));
            }
            Step::DeleteVertex { edges, .. } => {
                if let Some(edge) = edges.iter().find(|edge| edge.id == *id) {
                    return Ok(EdgePayload::from_edge(edge));
                }
            }
            _ => {}
        }
    }
    Err(GraphError::not_found("edge", id.as_str()))
}
