//! Composite contexts.
//!
//! A composite aggregates one root entity context with a collection of child
//! entity contexts, each independently tracked, persisted as one logical unit
//! under the root's identity. Either all constituent commands are issued
//! together or the persist call fails with nothing assumed applied; the broker
//! provides that atomicity, the composite implements no rollback.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::action::DiodeAction;
use crate::broker::CompositeCommandRequest;
use crate::context::{ContextHandle, DiodeContext};
use crate::entity::{DiodeEntity, EntityUid};
use crate::error::{DiodeError, DiodeResult};
use crate::registry::DiodeRegistry;
use crate::state::{CommandKind, DiodeState};

/// The fetched snapshot of an aggregate: the root entity plus its children.
/// The aggregate identity is the root's uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeData<R, C> {
    /// The root entity snapshot.
    pub root: R,
    /// The child entity snapshots.
    pub items: Vec<C>,
}

/// One root entity context plus an independently tracked child collection.
#[derive(Debug)]
pub struct DiodeComposite<R: DiodeEntity, C: DiodeEntity> {
    root: RwLock<Option<ContextHandle<R>>>,
    items: DiodeRegistry<C>,
}

impl<R: DiodeEntity, C: DiodeEntity> Default for DiodeComposite<R, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DiodeEntity, C: DiodeEntity> DiodeComposite<R, C> {
    /// An empty, not-yet-loaded composite.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: RwLock::new(None),
            items: DiodeRegistry::new(),
        }
    }

    /// Hydrates the root context and one child context per supplied item, all
    /// with state Existing.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::AlreadyLoaded`] if the root is already loaded,
    /// and [`DiodeError::AlreadyTracked`] if the supplied collection carries a
    /// duplicate child uid.
    pub fn load(&self, data: CompositeData<R, C>) -> DiodeResult<()> {
        self.hydrate_root(data.root, DiodeState::existing())?;
        for item in data.items {
            self.items.create_context(item, DiodeState::existing())?;
        }
        Ok(())
    }

    /// Hydrates the root context with state New and no children, for an
    /// aggregate constructed in this unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::AlreadyLoaded`] if the root is already loaded.
    pub fn create_new(&self, root: R) -> DiodeResult<()> {
        self.hydrate_root(root, DiodeState::new_entity())
    }

    fn hydrate_root(&self, root: R, state: DiodeState) -> DiodeResult<()> {
        let mut guard = self.root.write();
        if let Some(existing) = guard.as_ref() {
            return Err(DiodeError::AlreadyLoaded {
                uid: existing.uid(),
            });
        }
        *guard = Some(ContextHandle::new(DiodeContext::with_state(root, state)));
        Ok(())
    }

    /// The root context handle.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotLoaded`] before a load.
    pub fn root(&self) -> DiodeResult<ContextHandle<R>> {
        self.root.read().as_ref().cloned().ok_or(DiodeError::NotLoaded)
    }

    /// The aggregate identity (the root's uid).
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotLoaded`] before a load.
    pub fn uid(&self) -> DiodeResult<EntityUid> {
        Ok(self.root()?.uid())
    }

    /// Dispatches a mutation action against the root context.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotLoaded`] before a load, otherwise whatever the
    /// root context's dispatch reports.
    pub async fn dispatch_root(&self, action: &dyn DiodeAction<R>) -> DiodeResult<R> {
        self.root()?.dispatch(action).await
    }

    /// The child context registry, for dispatch and lookup against individual
    /// children.
    #[must_use]
    pub fn items(&self) -> &DiodeRegistry<C> {
        &self.items
    }

    /// Starts tracking a child constructed in this unit of work, state New.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::AlreadyTracked`] if the child uid is already
    /// tracked.
    pub fn add_item(&self, item: C) -> DiodeResult<ContextHandle<C>> {
        self.items.create_context(item, DiodeState::new_entity())
    }

    /// Marks the identified child for deletion.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotTracked`] if no child context exists for the
    /// uid.
    pub async fn mark_item_for_deletion(&self, uid: EntityUid) -> DiodeResult<()> {
        self.items.mark_for_deletion(uid).await
    }

    /// Collects the aggregate persistence payload: the root's tagged snapshot
    /// plus every child's tagged snapshot, children sorted by command kind so
    /// adds and updates are issued strictly before deletes.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotLoaded`] before a load.
    pub async fn command_data(&self) -> DiodeResult<CompositeCommandRequest<R, C>> {
        let root = self.root()?;
        let root_command = root.command_request().await;

        let mut items = Vec::with_capacity(self.items.len());
        for uid in self.items.uids() {
            if let Some(handle) = self.items.get_context(uid) {
                items.push(handle.command_request().await);
            }
        }
        items.sort_by_key(|command| command.kind);

        Ok(CompositeCommandRequest {
            uid: root.uid(),
            root: root_command,
            items,
        })
    }

    /// Clears the root and every child after the broker confirmed the
    /// aggregate command. Children whose command was a delete, or which were
    /// discarded before ever reaching the store, stop being tracked.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotLoaded`] before a load.
    pub async fn mark_persisted(&self) -> DiodeResult<()> {
        let root = self.root()?;
        root.mark_persisted().await;

        for uid in self.items.uids() {
            let Some(handle) = self.items.get_context(uid) else {
                continue;
            };
            let state = handle.state().await;
            let discarded = state.is_new && state.is_marked_for_deletion;
            if state.command_kind() == CommandKind::Delete || discarded {
                self.items.remove_context(uid)?;
            } else {
                handle.mark_persisted().await;
            }
        }
        Ok(())
    }
}

/// Per-unit-of-work store of composite contexts keyed by aggregate identity.
#[derive(Debug)]
pub struct CompositeRegistry<R: DiodeEntity, C: DiodeEntity> {
    composites: RwLock<HashMap<EntityUid, Arc<DiodeComposite<R, C>>>>,
}

impl<R: DiodeEntity, C: DiodeEntity> Default for CompositeRegistry<R, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DiodeEntity, C: DiodeEntity> CompositeRegistry<R, C> {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            composites: RwLock::new(HashMap::new()),
        }
    }

    /// Stores a loaded composite under its aggregate identity.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::AlreadyTracked`] if a composite for the uid
    /// already exists; the existing composite is unaffected.
    pub fn insert(&self, uid: EntityUid, composite: Arc<DiodeComposite<R, C>>) -> DiodeResult<()> {
        match self.composites.write().entry(uid) {
            Entry::Occupied(_) => Err(DiodeError::AlreadyTracked { uid }),
            Entry::Vacant(slot) => {
                slot.insert(composite);
                Ok(())
            }
        }
    }

    /// Non-failing lookup.
    #[must_use]
    pub fn get(&self, uid: EntityUid) -> Option<Arc<DiodeComposite<R, C>>> {
        self.composites.read().get(&uid).cloned()
    }

    /// Failing lookup.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotTracked`] if no composite exists for the uid.
    pub fn composite(&self, uid: EntityUid) -> DiodeResult<Arc<DiodeComposite<R, C>>> {
        self.get(uid).ok_or(DiodeError::NotTracked { uid })
    }

    /// Stops tracking the identified composite.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NotTracked`] if no composite exists for the uid.
    pub fn remove(&self, uid: EntityUid) -> DiodeResult<()> {
        self.composites
            .write()
            .remove(&uid)
            .map(|_| ())
            .ok_or(DiodeError::NotTracked { uid })
    }

    /// Number of tracked composites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.composites.read().len()
    }

    /// True if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.composites.read().is_empty()
    }
}
