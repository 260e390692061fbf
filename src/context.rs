//! Entity tracking contexts.
//!
//! A context pairs exactly one immutable entity snapshot with exactly one
//! dirty state. The two are only ever updated together, behind a per-context
//! async mutex, so a context is never observed with a stale state against the
//! wrong snapshot. Dispatches against the same identity serialize on that
//! mutex; dispatches against different identities are independent.
//!
//! Contexts are always hydrated at construction: an unloaded context is
//! unrepresentable. The "already holds a snapshot" failure therefore surfaces
//! where it is observable, as `AlreadyTracked` at the registry or
//! `AlreadyLoaded` at a composite root.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::action::{DiodeAction, MutationRequest};
use crate::broker::CommandRequest;
use crate::entity::{DiodeEntity, EntityUid};
use crate::error::{DiodeError, DiodeResult};
use crate::state::{CommandKind, DiodeState};

/// One entity snapshot plus its dirty state and snapshot version.
///
/// The version starts at 1 and increases by one on every successful dispatch.
/// Actions that declare the version they were built from are rejected when it
/// is no longer current, closing the lost-update window between reading a
/// snapshot and dispatching an edit based on it.
#[derive(Debug)]
pub struct DiodeContext<T: DiodeEntity> {
    item: T,
    state: DiodeState,
    version: u64,
}

impl<T: DiodeEntity> DiodeContext<T> {
    /// Context for a snapshot fetched from the store.
    #[must_use]
    pub fn existing(item: T) -> Self {
        Self::with_state(item, DiodeState::existing())
    }

    /// Context for an entity constructed in this unit of work.
    #[must_use]
    pub fn new_entity(item: T) -> Self {
        Self::with_state(item, DiodeState::new_entity())
    }

    /// Context with an explicit initial state.
    #[must_use]
    pub fn with_state(item: T, state: DiodeState) -> Self {
        Self {
            item,
            state,
            version: 1,
        }
    }

    /// The current immutable snapshot.
    pub fn immutable_item(&self) -> &T {
        &self.item
    }

    /// The current dirty state.
    #[must_use]
    pub fn state(&self) -> DiodeState {
        self.state
    }

    /// The current snapshot version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The tracked identity.
    #[must_use]
    pub fn uid(&self) -> EntityUid {
        self.item.uid()
    }

    /// The persistence command this context currently calls for.
    #[must_use]
    pub fn command_kind(&self) -> CommandKind {
        self.state.command_kind()
    }
}

/// Cloneable handle to one registered [`DiodeContext`].
///
/// All mutation goes through the handle's internal mutex, which is the
/// single-writer-per-identity guarantee: overlapping dispatches on one
/// identity cannot interleave their read-then-replace.
#[derive(Debug)]
pub struct ContextHandle<T: DiodeEntity> {
    uid: EntityUid,
    inner: Arc<Mutex<DiodeContext<T>>>,
}

impl<T: DiodeEntity> Clone for ContextHandle<T> {
    fn clone(&self) -> Self {
        Self {
            uid: self.uid,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: DiodeEntity> ContextHandle<T> {
    /// Wraps a context in a shareable handle.
    #[must_use]
    pub fn new(context: DiodeContext<T>) -> Self {
        Self {
            uid: context.uid(),
            inner: Arc::new(Mutex::new(context)),
        }
    }

    /// The tracked identity. Does not lock.
    #[must_use]
    pub fn uid(&self) -> EntityUid {
        self.uid
    }

    /// A clone of the current snapshot.
    pub async fn snapshot(&self) -> T {
        self.inner.lock().await.item.clone()
    }

    /// The current dirty state.
    pub async fn state(&self) -> DiodeState {
        self.inner.lock().await.state
    }

    /// The current snapshot version.
    pub async fn version(&self) -> u64 {
        self.inner.lock().await.version
    }

    /// The persistence command this context currently calls for.
    pub async fn command_kind(&self) -> CommandKind {
        self.inner.lock().await.command_kind()
    }

    /// The command-kind-tagged snapshot, ready to send to a data broker.
    pub async fn command_request(&self) -> CommandRequest<T> {
        let guard = self.inner.lock().await;
        CommandRequest {
            uid: self.uid,
            kind: guard.command_kind(),
            item: guard.item.clone(),
        }
    }

    /// Dispatches a mutation action against this context.
    ///
    /// On success the snapshot is replaced and `is_mutated` is set (unless the
    /// context is still new, in which case it stays new), the version is
    /// bumped, and the new snapshot is returned. On failure the context is
    /// left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`DiodeError::StaleAction`] if the action declares a `based_on`
    ///   version that is no longer current;
    /// - [`DiodeError::MutationRejected`] if the transform reports failure or
    ///   attempts to change the entity uid.
    pub async fn dispatch(&self, action: &dyn DiodeAction<T>) -> DiodeResult<T> {
        let mut guard = self.inner.lock().await;

        if let Some(based_on) = action.based_on() {
            if based_on != guard.version {
                return Err(DiodeError::StaleAction {
                    action: action.name().to_string(),
                    based_on,
                    current: guard.version,
                });
            }
        }

        let request = MutationRequest {
            item: &guard.item,
            state: guard.state,
            version: guard.version,
        };

        let next = action
            .apply(request)
            .await
            .map_err(|e| DiodeError::MutationRejected {
                action: action.name().to_string(),
                reason: e.to_string(),
            })?;

        if next.uid() != self.uid {
            return Err(DiodeError::MutationRejected {
                action: action.name().to_string(),
                reason: format!(
                    "mutation changed the entity uid from {} to {}",
                    self.uid,
                    next.uid()
                ),
            });
        }

        guard.item = next;
        if !guard.state.is_new {
            guard.state.is_mutated = true;
        }
        guard.version += 1;

        Ok(guard.item.clone())
    }

    /// Marks the entity for deletion without altering the snapshot.
    /// Idempotent.
    pub async fn mark_for_deletion(&self) {
        self.inner.lock().await.state.is_marked_for_deletion = true;
    }

    /// Clears all dirty flags after the broker confirmed the corresponding
    /// command. For a delete the caller must also remove the context from its
    /// registry.
    pub async fn mark_persisted(&self) {
        self.inner.lock().await.state = DiodeState::existing();
    }
}
