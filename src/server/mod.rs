//! Server-side commit pipeline: structural batch validation followed by an
//! atomic apply against the SQLite backing store.

mod applier;
mod sqlite;
pub mod validator;

pub use sqlite::SqliteGraphStore;
