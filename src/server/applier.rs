//! Batch application inside one atomic unit of work.
//!
//! The applier processes mutation objects strictly in order, resolving ids
//! through working maps seeded from the batch. Any internal error propagates
//! out before the enclosing SQLite transaction commits, rolling the whole
//! unit of work back; a not-found delete is recorded as a per-operation error
//! without aborting its siblings.

use std::collections::BTreeSet;

use rusqlite::{params, OptionalExtension, Transaction};
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::error::{GraphError, Result};
use crate::model::PropertyMap;
use crate::wire::{
    CommitRequest, CommitResponse, EdgePayload, GraphPatch, IdMapEntry, Mutation, MutationKind,
    OperationResult, VertexPayload,
};

pub(crate) fn apply_batch(tx: &Transaction<'_>, request: &CommitRequest) -> Result<CommitResponse> {
    let mut applier = Applier::new(tx, request);
    for mutation in &request.transactions {
        applier.apply(mutation)?;
    }
    applier.into_response(request.txn_id)
}

struct Applier<'a, 'tx> {
    tx: &'a Transaction<'tx>,
    vertex_map: FxHashMap<String, String>,
    edge_map: FxHashMap<String, String>,
    minted_vertexes: Vec<IdMapEntry>,
    minted_edges: Vec<IdMapEntry>,
    results: Vec<OperationResult>,
    touched_vertexes: BTreeSet<String>,
    touched_edges: BTreeSet<String>,
    deleted_vertexes: Vec<String>,
    deleted_edges: Vec<String>,
}

impl<'a, 'tx> Applier<'a, 'tx> {
    fn new(tx: &'a Transaction<'tx>, request: &CommitRequest) -> Self {
        Self {
            tx,
            vertex_map: request.vertex_id_map.iter().cloned().collect(),
            edge_map: request.edge_id_map.iter().cloned().collect(),
            minted_vertexes: Vec::new(),
            minted_edges: Vec::new(),
            results: Vec::with_capacity(request.transactions.len()),
            touched_vertexes: BTreeSet::new(),
            touched_edges: BTreeSet::new(),
            deleted_vertexes: Vec::new(),
            deleted_edges: Vec::new(),
        }
    }

    fn apply(&mut self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::Insert(payload) => self.insert_vertex(payload),
            Mutation::Merge(payload) => self.merge_vertex(payload),
            Mutation::Replace(payload) => self.replace_vertex(payload),
            Mutation::DeleteVertex(payload) => self.delete_vertex(payload),
            Mutation::InsertEdge(payload) => self.insert_edge(payload),
            Mutation::ReplaceEdge(payload) => self.replace_edge(payload),
            Mutation::DeleteEdge(payload) => self.delete_edge(payload),
        }
    }

    fn insert_vertex(&mut self, payload: &VertexPayload) -> Result<()> {
        let new_id = self.mint_id("next_vertex_id", "v-")?;
        self.tx.execute(
            "INSERT INTO vertexes (id, label, properties) VALUES (?1, ?2, ?3)",
            params![new_id, payload.label, to_json(&payload.properties)?],
        )?;
        self.vertex_map.insert(payload.id.clone(), new_id.clone());
        self.minted_vertexes
            .push((payload.id.clone(), new_id.clone()));
        self.touched_vertexes.insert(new_id.clone());
        self.results
            .push(OperationResult::mapped(MutationKind::Insert, payload.id.clone(), new_id));
        Ok(())
    }

    fn merge_vertex(&mut self, payload: &VertexPayload) -> Result<()> {
        let id = resolve(&self.vertex_map, &payload.id);
        let existing: Option<String> = self
            .tx
            .query_row(
                "SELECT properties FROM vertexes WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        // A missing merge target means a corrupted identity map; abort the
        // whole unit of work rather than apply a partial batch.
        let Some(json) = existing else {
            return Err(GraphError::InternalStore(format!(
                "merge target vertex {id} not found"
            )));
        };
        let mut properties: PropertyMap = serde_json::from_str(&json)?;
        properties.extend(payload.properties.clone());
        self.tx.execute(
            "UPDATE vertexes SET properties = ?2 WHERE id = ?1",
            params![id, to_json(&properties)?],
        )?;
        self.touched_vertexes.insert(id.clone());
        self.results
            .push(OperationResult::mapped(MutationKind::Merge, payload.id.clone(), id));
        Ok(())
    }

    fn replace_vertex(&mut self, payload: &VertexPayload) -> Result<()> {
        let id = resolve(&self.vertex_map, &payload.id);
        let affected = self.tx.execute(
            "UPDATE vertexes SET label = ?2, properties = ?3 WHERE id = ?1",
            params![id, payload.label, to_json(&payload.properties)?],
        )?;
        if affected == 0 {
            return Err(GraphError::InternalStore(format!(
                "replace target vertex {id} not found"
            )));
        }
        self.touched_vertexes.insert(id.clone());
        self.results
            .push(OperationResult::mapped(MutationKind::Replace, payload.id.clone(), id));
        Ok(())
    }

    fn delete_vertex(&mut self, payload: &VertexPayload) -> Result<()> {
        let id = resolve(&self.vertex_map, &payload.id);
        let affected = self
            .tx
            .execute("DELETE FROM vertexes WHERE id = ?1", params![id])?;
        if affected == 0 {
            warn!(id = %id, "delete skipped: vertex not found");
            self.results
                .push(OperationResult::not_found(MutationKind::DeleteVertex, payload.id.clone()));
            return Ok(());
        }
        // Cascade: a stored edge must never outlive either endpoint.
        let mut stmt = self
            .tx
            .prepare("SELECT id FROM edges WHERE start_id = ?1 OR end_id = ?1")?;
        let incident = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.tx.execute(
            "DELETE FROM edges WHERE start_id = ?1 OR end_id = ?1",
            params![id],
        )?;
        self.deleted_edges.extend(incident);
        self.deleted_vertexes.push(id.clone());
        self.results
            .push(OperationResult::mapped(MutationKind::DeleteVertex, payload.id.clone(), id));
        Ok(())
    }

    fn insert_edge(&mut self, payload: &EdgePayload) -> Result<()> {
        let start = resolve(&self.vertex_map, &payload.start);
        let end = resolve(&self.vertex_map, &payload.end);
        let new_id = self.mint_id("next_edge_id", "e-")?;
        self.tx.execute(
            "INSERT INTO edges (id, type_name, start_id, end_id, properties)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new_id, payload.type_name, start, end, to_json(&payload.properties)?],
        )?;
        self.edge_map.insert(payload.id.clone(), new_id.clone());
        self.minted_edges.push((payload.id.clone(), new_id.clone()));
        self.touched_edges.insert(new_id.clone());
        self.results
            .push(OperationResult::mapped(MutationKind::InsertEdge, payload.id.clone(), new_id));
        Ok(())
    }

    fn replace_edge(&mut self, payload: &EdgePayload) -> Result<()> {
        let id = resolve(&self.edge_map, &payload.id);
        let start = resolve(&self.vertex_map, &payload.start);
        let end = resolve(&self.vertex_map, &payload.end);
        let affected = self.tx.execute(
            "UPDATE edges SET properties = ?5
             WHERE id = ?1 AND type_name = ?2 AND start_id = ?3 AND end_id = ?4",
            params![id, payload.type_name, start, end, to_json(&payload.properties)?],
        )?;
        if affected == 0 {
            return Err(GraphError::InternalStore(format!(
                "replace target edge {id} not found"
            )));
        }
        self.touched_edges.insert(id.clone());
        self.results
            .push(OperationResult::mapped(MutationKind::ReplaceEdge, payload.id.clone(), id));
        Ok(())
    }

    fn delete_edge(&mut self, payload: &EdgePayload) -> Result<()> {
        let id = resolve(&self.edge_map, &payload.id);
        let start = resolve(&self.vertex_map, &payload.start);
        let end = resolve(&self.vertex_map, &payload.end);
        let affected = self.tx.execute(
            "DELETE FROM edges
             WHERE id = ?1 AND type_name = ?2 AND start_id = ?3 AND end_id = ?4",
            params![id, payload.type_name, start, end],
        )?;
        if affected == 0 {
            warn!(id = %id, "delete skipped: edge not found");
            self.results
                .push(OperationResult::not_found(MutationKind::DeleteEdge, payload.id.clone()));
            return Ok(());
        }
        self.deleted_edges.push(id.clone());
        self.results
            .push(OperationResult::mapped(MutationKind::DeleteEdge, payload.id.clone(), id));
        Ok(())
    }

    fn mint_id(&self, counter: &str, prefix: &str) -> Result<String> {
        let next: i64 = self.tx.query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![counter],
            |row| row.get(0),
        )?;
        self.tx.execute(
            "UPDATE meta SET value = value + 1 WHERE key = ?1",
            params![counter],
        )?;
        Ok(format!("{prefix}{next}"))
    }

    fn into_response(self, txn_id: u64) -> Result<CommitResponse> {
        let mut graph = GraphPatch {
            deleted_vertexes: self.deleted_vertexes,
            deleted_edges: self.deleted_edges,
            ..GraphPatch::default()
        };
        for id in &self.touched_vertexes {
            if graph.deleted_vertexes.contains(id) {
                continue;
            }
            let row: Option<(String, String)> = self
                .tx
                .query_row(
                    "SELECT label, properties FROM vertexes WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            if let Some((label, properties)) = row {
                graph.vertexes.push(VertexPayload {
                    id: id.clone(),
                    label,
                    properties: serde_json::from_str(&properties)?,
                });
            }
        }
        for id in &self.touched_edges {
            if graph.deleted_edges.contains(id) {
                continue;
            }
            let row: Option<(String, String, String, String)> = self
                .tx
                .query_row(
                    "SELECT type_name, start_id, end_id, properties FROM edges WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;
            if let Some((type_name, start, end, properties)) = row {
                graph.edges.push(EdgePayload {
                    id: id.clone(),
                    type_name,
                    start,
                    end,
                    properties: serde_json::from_str(&properties)?,
                });
            }
        }
        Ok(CommitResponse {
            txn_id,
            client_to_server_vertex_id_map: self.minted_vertexes,
            client_to_server_edge_id_map: self.minted_edges,
            data: self.results,
            graph,
        })
    }
}

fn resolve(map: &FxHashMap<String, String>, id: &str) -> String {
    map.get(id).cloned().unwrap_or_else(|| id.to_string())
}

fn to_json(properties: &PropertyMap) -> Result<String> {
    Ok(serde_json::to_string(properties)?)
}
