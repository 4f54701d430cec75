//! Bulk replace critical section.
//!
//! # Responsibility
//! - Group clear/import/replace mutations into one persisted write.
//! - Keep autosave suppressed until that write is durable.
//!
//! # Invariants
//! - Exactly one state write per commit.
//! - Suppression is lifted only after a successful write.
//! - An uncommitted operation restores the snapshot taken at `begin`.

use crate::model::state::{AppState, StateValidationError};
use crate::repo::kv_repo::{KvRepository, StorageResult};
use crate::store::codec::{import_state, ParseError, WELCOMED_KEY};
use crate::store::event_store::{persist, EventStore};
use chrono::{DateTime, FixedOffset};
use log::{info, warn};

/// Open bulk replace over an `EventStore`.
pub struct BulkOperation<'a, R: KvRepository> {
    store: &'a mut EventStore<R>,
    snapshot: Option<AppState>,
    was_suppressed: bool,
    reset_welcome: bool,
}

impl<'a, R: KvRepository> BulkOperation<'a, R> {
    pub(crate) fn begin(store: &'a mut EventStore<R>) -> Self {
        let snapshot = Some(store.state.clone());
        let was_suppressed = store.autosave_suppressed;
        store.autosave_suppressed = true;
        info!("event=bulk_begin module=store status=ok");
        Self {
            store,
            snapshot,
            was_suppressed,
            reset_welcome: false,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.store.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut AppState {
        &mut self.store.state
    }

    /// Replaces the whole state.
    pub fn replace_state(&mut self, state: AppState) -> Result<(), StateValidationError> {
        state.validate()?;
        self.store.state = state;
        Ok(())
    }

    /// Resets to the default state and re-arms the first-run guide.
    pub fn clear(&mut self) {
        self.store.state = AppState::default();
        self.reset_welcome = true;
    }

    /// Shallow-merges an import payload; state is untouched on error.
    pub fn import(
        &mut self,
        bytes: &[u8],
        imported_at: DateTime<FixedOffset>,
    ) -> Result<(), ParseError> {
        let merged = import_state(&self.store.state, bytes, imported_at)?;
        self.store.state = merged;
        Ok(())
    }

    /// Persists the new state once and closes the critical section.
    ///
    /// # Errors
    /// - Returns the storage error when the write fails. The new state stays
    ///   in memory and autosave stays suppressed until `EventStore::save`
    ///   succeeds.
    pub fn commit(mut self) -> StorageResult<()> {
        // Past this point there is nothing to roll back to.
        self.snapshot = None;

        persist(&self.store.repo, &self.store.state)?;
        if self.reset_welcome {
            if let Err(err) = self.store.repo.remove(WELCOMED_KEY) {
                warn!(
                    "event=bulk_commit module=store status=error step=reset_welcome error_code={} error={}",
                    err.code(),
                    err
                );
            }
        }
        self.store.autosave_suppressed = false;
        info!("event=bulk_commit module=store status=ok");
        Ok(())
    }
}

impl<R: KvRepository> Drop for BulkOperation<'_, R> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.store.state = snapshot;
            self.store.autosave_suppressed = self.was_suppressed;
            info!("event=bulk_rollback module=store status=ok");
        }
    }
}
