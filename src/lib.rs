//! Transactional property-graph mutation log with atomic server commit.
//!
//! A [`Session`] holds an optimistic, freely-undoable client copy of a graph:
//! mutation primitives apply immediately to the in-memory [`GraphStore`] and
//! record invertible steps in a per-transaction log, so edits can be undone,
//! reverted to named checkpoints, or discarded before anything is persisted.
//! [`Session::prepare_commit`] serializes a transaction's net effect into a
//! portable batch; the server-side [`SqliteGraphStore`] validates it and
//! applies it inside one atomic unit of work, minting permanent identities
//! for entities created under temporary ids. The returned identity map is
//! reconciled back into the client store losslessly, and a change notice
//! fans out to other sessions on a best-effort basis.

pub mod commit;
pub mod config;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod server;
pub mod session;
pub mod store;
pub mod sync;
pub mod txn;
pub mod wire;

pub use config::SessionConfig;
pub use error::{GraphError, Result};
pub use model::{
    Edge, EdgeId, EdgeKey, PropertyMap, PropertyValue, Vertex, VertexId, TEMP_ID_PREFIX,
};
pub use reconcile::ReconcileOutcome;
pub use server::{validator, SqliteGraphStore};
pub use session::Session;
pub use store::{Direction, GraphStore};
pub use sync::{ChangeNotice, ChangeObserver};
pub use txn::{Step, Transaction, TxnId, TxnState};
pub use wire::{
    CommitRequest, CommitResponse, EdgePayload, GraphPatch, IdMapEntry, Mutation, MutationKind,
    OpOutcome, OperationResult, VertexPayload,
};
