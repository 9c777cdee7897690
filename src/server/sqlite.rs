use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::Result;
use crate::server::applier::apply_batch;
use crate::server::validator;
use crate::wire::{CommitRequest, CommitResponse, EdgePayload, VertexPayload};

/// The durable backing store: vertexes and edges in SQLite, property maps as
/// JSON text columns, permanent ids minted from monotonic counters that are
/// never reused after deletes.
pub struct SqliteGraphStore {
    conn: Connection,
}

impl SqliteGraphStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            INSERT OR IGNORE INTO meta (key, value) VALUES ('next_vertex_id', 1);
            INSERT OR IGNORE INTO meta (key, value) VALUES ('next_edge_id', 1);
            CREATE TABLE IF NOT EXISTS vertexes (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                properties TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                type_name TEXT NOT NULL,
                start_id TEXT NOT NULL,
                end_id TEXT NOT NULL,
                properties TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_edges_start ON edges (start_id);
            CREATE INDEX IF NOT EXISTS idx_edges_end ON edges (end_id);",
        )?;
        Ok(())
    }

    /// Validates and applies a raw JSON batch. Validation failures never
    /// touch the tables.
    pub fn apply_json(&mut self, raw: &str) -> Result<CommitResponse> {
        let request = validator::parse_batch(raw)?;
        self.apply_commit(&request)
    }

    /// Applies a commit batch inside one atomic unit of work. On any internal
    /// error the transaction is rolled back in full and the store is left
    /// exactly as it was.
    pub fn apply_commit(&mut self, request: &CommitRequest) -> Result<CommitResponse> {
        let tx = self.conn.transaction()?;
        let response = apply_batch(&tx, request)?;
        tx.commit()?;
        info!(
            txn_id = request.txn_id,
            operations = response.data.len(),
            new_vertexes = response.client_to_server_vertex_id_map.len(),
            new_edges = response.client_to_server_edge_id_map.len(),
            "commit applied"
        );
        Ok(response)
    }

    pub fn vertex(&self, id: &str) -> Result<Option<VertexPayload>> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT label, properties FROM vertexes WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((label, properties)) => Ok(Some(VertexPayload {
                id: id.to_string(),
                label,
                properties: serde_json::from_str(&properties)?,
            })),
            None => Ok(None),
        }
    }

    pub fn edge(&self, id: &str) -> Result<Option<EdgePayload>> {
        let row: Option<(String, String, String, String)> = self
            .conn
            .query_row(
                "SELECT type_name, start_id, end_id, properties FROM edges WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        match row {
            Some((type_name, start, end, properties)) => Ok(Some(EdgePayload {
                id: id.to_string(),
                type_name,
                start,
                end,
                properties: serde_json::from_str(&properties)?,
            })),
            None => Ok(None),
        }
    }

    pub fn vertex_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vertexes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn edge_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Value of an id-minting counter; exposed so tests can assert that a
    /// rolled-back batch consumed nothing.
    pub fn next_id(&self, counter: &str) -> Result<i64> {
        let value: i64 = self.conn.query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![counter],
            |row| row.get(0),
        )?;
        Ok(value)
    }
}
