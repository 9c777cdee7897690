use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::{GraphError, Result};
use crate::model::{Edge, EdgeId, EdgeKey, PropertyMap, Vertex, VertexId};
use crate::store::GraphStore;
use crate::sync::{ChangeObserver, ChangeObservers};
use crate::txn::{Step, Transaction, TxnId, TxnState};
use crate::wire::IdMapEntry;

/// A client editing session: one owned graph store plus the transactions
/// mutating it.
///
/// The mutation primitives on this type are the only legal write path to the
/// store. Each primitive validates its preconditions, applies the forward
/// effect immediately (optimistic apply), and appends exactly one invertible
/// step to the owning transaction's log. There is no ambient global store;
/// callers hold this handle explicitly.
pub struct Session {
    pub(crate) store: GraphStore,
    pub(crate) config: SessionConfig,
    pub(crate) txns: FxHashMap<TxnId, Transaction>,
    pub(crate) next_txn_id: TxnId,
    pub(crate) next_temp_id: u64,
    /// Identity mappings learned from earlier commits, attached to every
    /// prepared batch so the server can resolve cross-batch references.
    pub(crate) vertex_id_map: Vec<IdMapEntry>,
    pub(crate) edge_id_map: Vec<IdMapEntry>,
    pub(crate) observers: ChangeObservers,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("vertices", &self.store.vertex_count())
            .field("edges", &self.store.edge_count())
            .field("transactions", &self.txns.len())
            .field("next_txn_id", &self.next_txn_id)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            store: GraphStore::new(),
            config,
            txns: FxHashMap::default(),
            next_txn_id: 1,
            next_temp_id: 1,
            vertex_id_map: Vec::new(),
            edge_id_map: Vec::new(),
            observers: ChangeObservers::default(),
        }
    }

    /// Read access to the graph store.
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Registers an outbound observer for commit change notices.
    pub fn subscribe(&mut self, observer: ChangeObserver) {
        self.observers.subscribe(observer);
    }

    /// Opens a new transaction and returns its local identifier.
    pub fn begin(&mut self) -> TxnId {
        let id = self.next_txn_id;
        self.next_txn_id += 1;
        self.txns.insert(id, Transaction::new(id));
        debug!(txn_id = id, "transaction started");
        id
    }

    pub fn txn(&self, id: TxnId) -> Result<&Transaction> {
        self.txns
            .get(&id)
            .ok_or_else(|| GraphError::not_found("transaction", id.to_string()))
    }

    fn txn_mut(&mut self, id: TxnId) -> Result<&mut Transaction> {
        self.txns
            .get_mut(&id)
            .ok_or_else(|| GraphError::not_found("transaction", id.to_string()))
    }

    /// Mints a temporary vertex id, valid only within this session until
    /// reconciled.
    pub fn mint_vertex_id(&mut self) -> VertexId {
        VertexId::new(self.mint_temp())
    }

    pub fn mint_edge_id(&mut self) -> EdgeId {
        EdgeId::new(self.mint_temp())
    }

    fn mint_temp(&mut self) -> String {
        let id = format!("{}{}", self.config.temp_id_prefix, self.next_temp_id);
        self.next_temp_id += 1;
        id
    }

    // --- Mutation primitives -------------------------------------------------

    /// Creates a vertex. Fails if `id` already exists in the store.
    pub fn insert_vertex(
        &mut self,
        txn_id: TxnId,
        id: VertexId,
        label: impl Into<String>,
        properties: PropertyMap,
    ) -> Result<()> {
        let cap = self.config.max_transaction_steps;
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.ensure_active()?;
        txn.check_capacity(cap)?;
        if self.store.contains_vertex(&id) {
            return Err(GraphError::InvalidArgument(format!(
                "vertex {id} already exists"
            )));
        }
        self.store
            .put_vertex(Vertex::new(id.clone(), label).with_properties(properties));
        txn.push_step(Step::InsertVertex { id });
        Ok(())
    }

    /// Applies a partial property patch. The step records only the previous
    /// values of the keys present in `patch`, with absent keys snapshot as
    /// absent.
    pub fn merge_vertex_properties(
        &mut self,
        txn_id: TxnId,
        id: &VertexId,
        patch: PropertyMap,
    ) -> Result<()> {
        let cap = self.config.max_transaction_steps;
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.ensure_active()?;
        txn.check_capacity(cap)?;
        let vertex = self
            .store
            .vertex_mut(id)
            .ok_or_else(|| GraphError::not_found("vertex", id.as_str()))?;
        let mut previous = BTreeMap::new();
        for (key, value) in patch {
            previous.insert(key.clone(), vertex.properties.insert(key, value));
        }
        txn.push_step(Step::MergeVertex {
            id: id.clone(),
            previous,
        });
        Ok(())
    }

    /// Overwrites the entire property map, snapshotting the previous one.
    pub fn replace_vertex_properties(
        &mut self,
        txn_id: TxnId,
        id: &VertexId,
        properties: PropertyMap,
    ) -> Result<()> {
        let cap = self.config.max_transaction_steps;
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.ensure_active()?;
        txn.check_capacity(cap)?;
        let vertex = self
            .store
            .vertex_mut(id)
            .ok_or_else(|| GraphError::not_found("vertex", id.as_str()))?;
        let previous = std::mem::replace(&mut vertex.properties, properties);
        txn.push_step(Step::ReplaceVertex {
            id: id.clone(),
            previous,
        });
        Ok(())
    }

    /// Deletes a vertex, pruning its incident edges. The step snapshots the
    /// full vertex and the pruned edges so the inverse can reinsert them.
    pub fn delete_vertex(&mut self, txn_id: TxnId, id: &VertexId) -> Result<()> {
        let cap = self.config.max_transaction_steps;
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.ensure_active()?;
        txn.check_capacity(cap)?;
        let (vertex, edges) = self
            .store
            .remove_vertex(id)
            .ok_or_else(|| GraphError::not_found("vertex", id.as_str()))?;
        txn.push_step(Step::DeleteVertex { vertex, edges });
        Ok(())
    }

    /// Creates an edge. Both endpoints must exist; fails if `id` is taken.
    pub fn insert_edge(
        &mut self,
        txn_id: TxnId,
        id: EdgeId,
        type_name: impl Into<String>,
        source: VertexId,
        target: VertexId,
        properties: PropertyMap,
    ) -> Result<()> {
        let cap = self.config.max_transaction_steps;
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.ensure_active()?;
        txn.check_capacity(cap)?;
        if self.store.contains_edge(&id) {
            return Err(GraphError::InvalidArgument(format!(
                "edge {id} already exists"
            )));
        }
        self.store
            .put_edge(Edge::new(id.clone(), type_name, source, target).with_properties(properties))?;
        txn.push_step(Step::InsertEdge { id });
        Ok(())
    }

    /// Overwrites an edge's property map. The edge must match the full
    /// (id, type, start, end) key or the operation reports not-found rather
    /// than silently matching a different edge.
    pub fn replace_edge(
        &mut self,
        txn_id: TxnId,
        key: &EdgeKey,
        properties: PropertyMap,
    ) -> Result<()> {
        let cap = self.config.max_transaction_steps;
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.ensure_active()?;
        txn.check_capacity(cap)?;
        let edge = self
            .store
            .edge_mut(&key.id)
            .filter(|edge| edge.matches(key))
            .ok_or_else(|| GraphError::not_found("edge", key.id.as_str()))?;
        let previous = std::mem::replace(&mut edge.properties, properties);
        txn.push_step(Step::ReplaceEdge {
            key: key.clone(),
            previous,
        });
        Ok(())
    }

    /// Deletes an edge, keyed like [`replace_edge`](Self::replace_edge).
    pub fn delete_edge(&mut self, txn_id: TxnId, key: &EdgeKey) -> Result<()> {
        let cap = self.config.max_transaction_steps;
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.ensure_active()?;
        txn.check_capacity(cap)?;
        let matches = self
            .store
            .edge(&key.id)
            .map(|edge| edge.matches(key))
            .unwrap_or(false);
        if !matches {
            return Err(GraphError::not_found("edge", key.id.as_str()));
        }
        let edge = self
            .store
            .remove_edge(&key.id)
            .ok_or_else(|| GraphError::not_found("edge", key.id.as_str()))?;
        txn.push_step(Step::DeleteEdge { edge });
        Ok(())
    }

    // --- Undo & checkpoints --------------------------------------------------

    /// Records the current step count under `name`; re-saving overwrites.
    pub fn save_checkpoint(&mut self, txn_id: TxnId, name: impl Into<String>) -> Result<()> {
        let txn = self.txn_mut(txn_id)?;
        txn.ensure_active()?;
        txn.save_checkpoint(name);
        Ok(())
    }

    /// Declares the index below which reverts must refuse to go.
    pub fn set_undo_floor(&mut self, txn_id: TxnId, index: usize) -> Result<()> {
        let txn = self.txn_mut(txn_id)?;
        txn.ensure_active()?;
        txn.set_undo_floor(index)
    }

    /// Inverts steps from the end of the log down to `index` (exclusive).
    pub fn revert_to_index(&mut self, txn_id: TxnId, index: usize) -> Result<()> {
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.revert_to_index(&mut self.store, index)
    }

    /// Reverts every step, leaving the transaction active and reusable.
    pub fn revert_all(&mut self, txn_id: TxnId) -> Result<()> {
        self.revert_to_index(txn_id, 0)
    }

    /// Reverts back to a named checkpoint, keeping the transaction active.
    pub fn reset_to_checkpoint(&mut self, txn_id: TxnId, name: &str) -> Result<()> {
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        let index = txn.checkpoint(name).ok_or_else(|| {
            GraphError::InvalidArgument(format!("unknown checkpoint {name:?}"))
        })?;
        txn.revert_to_index(&mut self.store, index)
    }

    /// True iff the transaction has zero steps or has been committed.
    pub fn is_empty(&self, txn_id: TxnId) -> Result<bool> {
        Ok(self.txn(txn_id)?.is_empty())
    }

    /// Fully reverts and closes a transaction. The undo floor does not apply:
    /// a discarded transaction takes its seed mutations with it.
    pub fn discard(&mut self, txn_id: TxnId) -> Result<()> {
        let txn = self
            .txns
            .get_mut(&txn_id)
            .ok_or_else(|| GraphError::not_found("transaction", txn_id.to_string()))?;
        txn.revert_for_discard(&mut self.store)?;
        txn.set_state(TxnState::Discarded);
        debug!(txn_id, "transaction discarded");
        Ok(())
    }
}
