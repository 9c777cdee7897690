//! Best-effort change fan-out for cross-session sync.
//!
//! The reconciler emits one [`ChangeNotice`] per successful commit; external
//! collaborators register observers (and feed notices from other sessions
//! back in through [`Session::apply_change_notice`]). Delivery is a
//! convenience sync, never a consistency mechanism: the committing session is
//! correct without it.
//!
//! [`Session::apply_change_notice`]: crate::Session::apply_change_notice

use serde::{Deserialize, Serialize};

use crate::txn::TxnId;
use crate::wire::{GraphPatch, IdMapEntry};

/// Committed identity maps plus touched-entity snapshots, broadcastable to
/// other sessions on the same logical document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub txn_id: TxnId,
    pub vertex_id_map: Vec<IdMapEntry>,
    pub edge_id_map: Vec<IdMapEntry>,
    pub graph: GraphPatch,
}

pub type ChangeObserver = Box<dyn Fn(&ChangeNotice) + Send>;

/// Registry of outbound observers.
#[derive(Default)]
pub struct ChangeObservers {
    observers: Vec<ChangeObserver>,
}

impl ChangeObservers {
    pub fn subscribe(&mut self, observer: ChangeObserver) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn emit(&self, notice: &ChangeNotice) {
        for observer in &self.observers {
            observer(notice);
        }
    }
}
