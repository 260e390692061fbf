//! Context registries.
//!
//! A registry maps entity identities to their live tracking contexts and is
//! scoped to one unit of work (one logical session or request). Each unit of
//! work gets its own registry instance, so cross-request races are eliminated
//! by construction. The registry exclusively owns its contexts for that
//! lifetime; factories borrow handles but never retain them past a call.
//!
//! The "exists already" check on create is the registry's core correctness
//! guarantee: it prevents two independent call paths from tracking the same
//! identity with divergent in-flight edits.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::action::DiodeAction;
use crate::context::{ContextHandle, DiodeContext};
use crate::entity::{DiodeEntity, EntityUid};
use crate::error::{DiodeError, DiodeResult};
use crate::state::DiodeState;

/// Per-unit-of-work store of entity contexts keyed by identity.
#[derive(Debug)]
pub struct DiodeRegistry<T: DiodeEntity> {
    contexts: RwLock<HashMap<EntityUid, ContextHandle<T>>>,
}

impl<T: DiodeEntity> Default for DiodeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DiodeEntity> DiodeRegistry<T> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Constructs, stores and returns a new context for the snapshot.
    ///
    /// The existence check and the insert are one atomic step under the map
    /// lock.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::AlreadyTracked`] if a context for the snapshot's
    /// uid already exists; the existing context is unaffected.
    pub fn create_context(&self, item: T, state: DiodeState) -> DiodeResult<ContextHandle<T>> {
        let uid = item.uid();
        match self.contexts.write().entry(uid) {
            Entry::Occupied(_) => Err(DiodeError::AlreadyTracked { uid }),
            Entry::Vacant(slot) => {
                let handle = ContextHandle::new(DiodeContext::with_state(item, state));
                slot.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    /// Non-failing lookup.
    #[must_use]
    pub fn get_context(&self, uid: EntityUid) -> Option<ContextHandle<T>> {
        self.contexts.read().get(&uid).cloned()
    }

    /// Failing lookup.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotTracked`] if no context exists for the uid.
    pub fn context(&self, uid: EntityUid) -> DiodeResult<ContextHandle<T>> {
        self.get_context(uid)
            .ok_or(DiodeError::NotTracked { uid })
    }

    /// Forwards a mutation action to the identified context.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotTracked`] if no context exists for the uid,
    /// otherwise whatever the context's dispatch reports.
    pub async fn dispatch(&self, uid: EntityUid, action: &dyn DiodeAction<T>) -> DiodeResult<T> {
        self.context(uid)?.dispatch(action).await
    }

    /// Marks the identified context for deletion.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotTracked`] if no context exists for the uid.
    pub async fn mark_for_deletion(&self, uid: EntityUid) -> DiodeResult<()> {
        self.context(uid)?.mark_for_deletion().await;
        Ok(())
    }

    /// Clears the identified context's dirty flags after a confirmed persist.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotTracked`] if no context exists for the uid.
    pub async fn mark_as_persisted(&self, uid: EntityUid) -> DiodeResult<()> {
        self.context(uid)?.mark_persisted().await;
        Ok(())
    }

    /// Stops tracking the identified context.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotTracked`] if no context exists for the uid.
    pub fn remove_context(&self, uid: EntityUid) -> DiodeResult<()> {
        self.contexts
            .write()
            .remove(&uid)
            .map(|_| ())
            .ok_or(DiodeError::NotTracked { uid })
    }

    /// The identities currently tracked.
    #[must_use]
    pub fn uids(&self) -> Vec<EntityUid> {
        self.contexts.read().keys().copied().collect()
    }

    /// Number of tracked contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    /// True if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }
}
