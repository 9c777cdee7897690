mod step;

pub use step::Step;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{GraphError, Result};
use crate::store::GraphStore;

/// Locally allocated transaction identifier, monotonic per session.
pub type TxnId = u64;

/// Lifecycle of a transaction.
///
/// `Pending` is the window between `prepare_commit` and the commit response:
/// the transaction still exists but accepts no mutation or revert, and a
/// second prepare is rejected rather than queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Pending,
    Committed,
    Discarded,
}

/// An ordered, append-only log of invertible steps plus named checkpoints.
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    state: TxnState,
    steps: Vec<Step>,
    checkpoints: BTreeMap<String, usize>,
    undo_floor: usize,
}

impl Transaction {
    pub(crate) fn new(id: TxnId) -> Self {
        Self {
            id,
            state: TxnState::Active,
            steps: Vec::new(),
            checkpoints: BTreeMap::new(),
            undo_floor: 0,
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TxnState) {
        self.state = state;
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// True iff the log has zero steps or the transaction has been committed.
    /// UI callers use this to disable "Save" affordances.
    pub fn is_empty(&self) -> bool {
        self.state == TxnState::Committed || self.steps.is_empty()
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.state == TxnState::Active {
            Ok(())
        } else {
            Err(GraphError::TransactionClosed(self.id))
        }
    }

    /// Checked before a primitive applies its forward effect, so a full log
    /// never leaves the store and the log out of step.
    pub(crate) fn check_capacity(&self, cap: Option<usize>) -> Result<()> {
        if let Some(max) = cap {
            if self.steps.len() >= max {
                return Err(GraphError::InvalidArgument(format!(
                    "transaction {} exceeded maximum step limit of {max}",
                    self.id
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn push_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Records the current step count under `name`. Re-saving the same name
    /// overwrites the prior index.
    pub fn save_checkpoint(&mut self, name: impl Into<String>) {
        let name = name.into();
        let index = self.steps.len();
        debug!(txn_id = self.id, checkpoint = %name, index, "checkpoint saved");
        self.checkpoints.insert(name, index);
    }

    pub fn checkpoint(&self, name: &str) -> Option<usize> {
        self.checkpoints.get(name).copied()
    }

    /// Declares an index below which reverts must refuse to go, protecting
    /// seed mutations performed before user-visible editing began.
    pub fn set_undo_floor(&mut self, index: usize) -> Result<()> {
        if index > self.steps.len() {
            return Err(GraphError::InvalidArgument(format!(
                "undo floor {index} is beyond the log ({} steps)",
                self.steps.len()
            )));
        }
        self.undo_floor = index;
        Ok(())
    }

    pub fn undo_floor(&self) -> usize {
        self.undo_floor
    }

    /// Inverts steps from the end of the log down to `index` (exclusive), in
    /// reverse order, and truncates the log. Checkpoints above the new length
    /// are dropped.
    pub(crate) fn revert_to_index(&mut self, store: &mut GraphStore, index: usize) -> Result<()> {
        self.revert_inner(store, index, false)
    }

    /// Revert that ignores the undo floor; used when a transaction is
    /// discarded outright.
    pub(crate) fn revert_for_discard(&mut self, store: &mut GraphStore) -> Result<()> {
        self.revert_inner(store, 0, true)
    }

    fn revert_inner(
        &mut self,
        store: &mut GraphStore,
        index: usize,
        ignore_floor: bool,
    ) -> Result<()> {
        self.ensure_active()?;
        if !ignore_floor && index < self.undo_floor {
            return Err(GraphError::InvalidArgument(format!(
                "revert to {index} would cross the undo floor at {}",
                self.undo_floor
            )));
        }
        if index > self.steps.len() {
            return Err(GraphError::InvalidArgument(format!(
                "revert index {index} is beyond the log ({} steps)",
                self.steps.len()
            )));
        }
        let reverted = self.steps.len() - index;
        while self.steps.len() > index {
            let Some(step) = self.steps.pop() else {
                break;
            };
            step.invert(store)?;
        }
        self.checkpoints.retain(|_, idx| *idx <= index);
        debug!(txn_id = self.id, index, reverted, "reverted transaction log");
        Ok(())
    }
}
