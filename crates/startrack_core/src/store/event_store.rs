//! Owned event store instance.
//!
//! # Responsibility
//! - Hold the authoritative in-memory `AppState`.
//! - Persist it through a `KvRepository` and expose the autosave gate.
//!
//! # Invariants
//! - `load_state` never fails; absent or malformed blobs yield the default.
//! - A failed save leaves in-memory state untouched.

use crate::model::event::EventType;
use crate::model::state::AppState;
use crate::repo::kv_repo::{KvRepository, StorageError, StorageResult};
use crate::store::bulk::BulkOperation;
use crate::store::codec::{decode_state, encode_state, export_state, APP_DATA_KEY, WELCOMED_KEY};
use log::{info, warn};

/// Result of an opportunistic (timer or teardown) save.
#[derive(Debug)]
pub enum AutosaveOutcome {
    Saved,
    /// Skipped because a bulk replace is open or not yet durable.
    Suppressed,
    Failed(StorageError),
}

/// Explicitly owned store; no process-wide singleton.
pub struct EventStore<R: KvRepository> {
    pub(crate) repo: R,
    pub(crate) state: AppState,
    pub(crate) autosave_suppressed: bool,
}

impl<R: KvRepository> EventStore<R> {
    /// Opens a store, loading persisted state fail-soft.
    pub fn open(repo: R) -> Self {
        let state = load_state(&repo);
        Self {
            repo,
            state,
            autosave_suppressed: false,
        }
    }

    /// Wraps already-built state without persisting it.
    pub fn with_state(repo: R, state: AppState) -> Self {
        Self {
            repo,
            state,
            autosave_suppressed: false,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Persists the full state.
    ///
    /// A successful write also lifts any autosave suppression left behind
    /// by a bulk commit that failed to persist.
    ///
    /// # Errors
    /// - `StorageError::SerializationFailure` when encoding fails.
    /// - `StorageError::QuotaExceeded` or `StorageError::Backend` when the
    ///   store rejects the write.
    pub fn save(&mut self) -> StorageResult<()> {
        persist(&self.repo, &self.state)?;
        self.autosave_suppressed = false;
        Ok(())
    }

    /// Timer/teardown save, skipped while a bulk replace is not yet durable.
    pub fn autosave(&mut self) -> AutosaveOutcome {
        if self.autosave_suppressed {
            info!("event=autosave module=store status=skipped reason=bulk_in_progress");
            return AutosaveOutcome::Suppressed;
        }
        match persist(&self.repo, &self.state) {
            Ok(()) => AutosaveOutcome::Saved,
            Err(err) => AutosaveOutcome::Failed(err),
        }
    }

    pub fn is_autosave_suppressed(&self) -> bool {
        self.autosave_suppressed
    }

    /// Pretty-printed full-state JSON.
    pub fn export(&self) -> StorageResult<Vec<u8>> {
        export_state(&self.state)
    }

    /// Opens a bulk replace critical section.
    ///
    /// Autosave is suppressed until `BulkOperation::commit` persists the new
    /// state. Dropping the operation without committing rolls back.
    pub fn begin_bulk(&mut self) -> BulkOperation<'_, R> {
        BulkOperation::begin(self)
    }

    /// Whether the first-run guide was dismissed. Read errors count as "no".
    pub fn welcome_dismissed(&self) -> bool {
        match self.repo.get(WELCOMED_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(err) => {
                warn!(
                    "event=welcome_flag_read module=store status=error error_code={} error={}",
                    err.code(),
                    err
                );
                false
            }
        }
    }

    pub fn dismiss_welcome(&self) -> StorageResult<()> {
        self.repo.set(WELCOMED_KEY, "true")
    }
}

/// Reads persisted state, falling back to the default state.
///
/// Absent blobs are normal on first run; malformed blobs and read failures
/// are logged and never raised.
pub fn load_state<R: KvRepository + ?Sized>(repo: &R) -> AppState {
    let raw = match repo.get(APP_DATA_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            info!("event=state_load module=store status=ok source=empty");
            return AppState::default();
        }
        Err(err) => {
            warn!(
                "event=state_load module=store status=error error_code={} error={}",
                err.code(),
                err
            );
            return AppState::default();
        }
    };

    match decode_state(&raw) {
        Ok(state) => {
            let counts = state.type_counts();
            info!(
                "event=state_load module=store status=ok events={} capsule={} track={} milestone={} letter={} check_ins={}",
                counts.total(),
                counts.get(EventType::Capsule),
                counts.get(EventType::Track),
                counts.get(EventType::Milestone),
                counts.get(EventType::Letter),
                state.check_ins.len()
            );
            state
        }
        Err(err) => {
            warn!(
                "event=state_load module=store status=error error_code=malformed_blob blob_bytes={} error={}",
                raw.len(),
                err
            );
            AppState::default()
        }
    }
}

pub(crate) fn persist<R: KvRepository + ?Sized>(repo: &R, state: &AppState) -> StorageResult<()> {
    let encoded = encode_state(state)?;
    match repo.set(APP_DATA_KEY, &encoded) {
        Ok(()) => {
            info!(
                "event=state_save module=store status=ok events={} bytes={}",
                state.events.len(),
                encoded.len()
            );
            Ok(())
        }
        Err(err) => {
            warn!(
                "event=state_save module=store status=error error_code={} error={}",
                err.code(),
                err
            );
            Err(err)
        }
    }
}
