//! Context and composite factories.
//!
//! The factories are the only components that talk to the data broker. Each
//! operation is an explicit sequence with named failure outcomes, all returned
//! as results: resolve the provider, check the registry, exchange snapshots
//! and commands with the broker, and only then touch the context's dirty
//! state. A broker failure or a cancelled call leaves every context exactly
//! as it was.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::broker::ItemQueryRequest;
use crate::composite::{CompositeData, DiodeComposite};
use crate::context::ContextHandle;
use crate::entity::{DiodeEntity, EntityUid};
use crate::error::{DiodeError, DiodeResult};
use crate::state::{CommandKind, DiodeState};
use crate::workspace::Workspace;

/// Orchestrates load, create and persist for single-entity contexts.
pub struct DiodeContextFactory {
    workspace: Arc<Workspace>,
}

impl DiodeContextFactory {
    /// A factory over the given workspace.
    #[must_use]
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    /// Fetches an entity by identity and starts tracking it, state Existing.
    ///
    /// # Errors
    ///
    /// - [`DiodeError::NoRegistry`] if the entity type is unregistered;
    /// - [`DiodeError::AlreadyTracked`] if a context for the uid exists;
    /// - [`DiodeError::NotFound`] if the broker reports no item;
    /// - [`DiodeError::Broker`] if the broker query fails.
    pub async fn load<T: DiodeEntity>(&self, uid: EntityUid) -> DiodeResult<ContextHandle<T>> {
        let provider = self.workspace.entity_provider::<T>()?;

        if provider.registry.get_context(uid).is_some() {
            return Err(DiodeError::AlreadyTracked { uid });
        }

        debug!(%uid, entity = std::any::type_name::<T>(), "loading entity context");
        let item = provider
            .broker
            .execute_query(ItemQueryRequest::new(uid))
            .await?
            .ok_or(DiodeError::NotFound { uid })?;

        provider.registry.create_context(item, DiodeState::existing())
    }

    /// Starts tracking an entity constructed in this unit of work, state New.
    /// Accepts a caller-supplied snapshot or constructs the default one.
    ///
    /// # Errors
    ///
    /// - [`DiodeError::NoRegistry`] if the entity type is unregistered;
    /// - [`DiodeError::AlreadyTracked`] if a context for the uid exists.
    pub fn create_new<T: DiodeEntity + Default>(
        &self,
        item: Option<T>,
    ) -> DiodeResult<ContextHandle<T>> {
        let provider = self.workspace.entity_provider::<T>()?;
        let item = item.unwrap_or_default();
        debug!(uid = %item.uid(), entity = std::any::type_name::<T>(), "creating new entity context");
        provider.registry.create_context(item, DiodeState::new_entity())
    }

    /// Persists the identified entity: derives the command from the context's
    /// dirty state, sends it to the broker, and clears the dirty state on
    /// success. Returns the command kind that was derived.
    ///
    /// A derived `None` never reaches the broker; a discarded entity (new and
    /// marked for deletion) is removed from the registry without any store
    /// interaction. A successfully deleted entity is likewise removed rather
    /// than left tracked as "persisted".
    ///
    /// # Errors
    ///
    /// - [`DiodeError::NoRegistry`] if the entity type is unregistered;
    /// - [`DiodeError::NotTracked`] if no context exists for the uid;
    /// - [`DiodeError::Broker`] if the broker command fails; the context is
    ///   left untouched.
    pub async fn persist<T: DiodeEntity>(&self, uid: EntityUid) -> DiodeResult<CommandKind> {
        let provider = self.workspace.entity_provider::<T>()?;
        let handle = provider.registry.context(uid)?;

        let request = handle.command_request().await;
        let kind = request.kind;

        if kind == CommandKind::None {
            let state = handle.state().await;
            if state.is_new && state.is_marked_for_deletion {
                // Never reached the store; just stop tracking it.
                provider.registry.remove_context(uid)?;
            }
            return Ok(CommandKind::None);
        }

        debug!(%uid, ?kind, entity = std::any::type_name::<T>(), "persisting entity");
        if let Err(failure) = provider.broker.execute_command(request).await {
            warn!(%uid, %failure, "broker rejected entity command");
            return Err(failure.into());
        }

        handle.mark_persisted().await;
        if kind == CommandKind::Delete {
            provider.registry.remove_context(uid)?;
        }
        Ok(kind)
    }
}

/// Orchestrates load, create and persist for root/child aggregates.
pub struct DiodeCompositeFactory {
    workspace: Arc<Workspace>,
}

impl DiodeCompositeFactory {
    /// A factory over the given workspace.
    #[must_use]
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    /// Fetches an aggregate by its root identity and starts tracking it.
    ///
    /// # Errors
    ///
    /// - [`DiodeError::NoRegistry`] if the pairing is unregistered;
    /// - [`DiodeError::AlreadyTracked`] if a composite for the uid exists;
    /// - [`DiodeError::NotFound`] if the broker reports no aggregate;
    /// - [`DiodeError::Broker`] if the broker query fails.
    pub async fn load<R: DiodeEntity, C: DiodeEntity>(
        &self,
        uid: EntityUid,
    ) -> DiodeResult<Arc<DiodeComposite<R, C>>> {
        let provider = self.workspace.composite_provider::<R, C>()?;

        if provider.registry.get(uid).is_some() {
            return Err(DiodeError::AlreadyTracked { uid });
        }

        debug!(%uid, root = std::any::type_name::<R>(), "loading composite context");
        let data: CompositeData<R, C> = provider
            .broker
            .execute_query(ItemQueryRequest::new(uid))
            .await?
            .ok_or(DiodeError::NotFound { uid })?;

        let composite = Arc::new(DiodeComposite::new());
        composite.load(data)?;
        provider
            .registry
            .insert(composite.uid()?, Arc::clone(&composite))?;
        Ok(composite)
    }

    /// Starts tracking an aggregate constructed in this unit of work: the
    /// root is state New with no children yet.
    ///
    /// # Errors
    ///
    /// - [`DiodeError::NoRegistry`] if the pairing is unregistered;
    /// - [`DiodeError::AlreadyTracked`] if a composite for the root uid
    ///   exists.
    pub fn create_new<R: DiodeEntity + Default, C: DiodeEntity>(
        &self,
        root: Option<R>,
    ) -> DiodeResult<Arc<DiodeComposite<R, C>>> {
        let provider = self.workspace.composite_provider::<R, C>()?;
        let root = root.unwrap_or_default();
        let uid = root.uid();

        let composite = Arc::new(DiodeComposite::new());
        composite.create_new(root)?;
        provider.registry.insert(uid, Arc::clone(&composite))?;
        Ok(composite)
    }

    /// Persists the identified aggregate as a single unit. Child commands are
    /// sorted by command kind before dispatch, so adds and updates are issued
    /// strictly before deletes. On success every constituent context is
    /// cleared. Returns the root's command kind.
    ///
    /// An aggregate whose every constituent derives `None` never reaches the
    /// broker; a discarded root (new and marked for deletion) removes the
    /// whole composite without any store interaction; a deleted root removes
    /// the composite after the broker confirms.
    ///
    /// # Errors
    ///
    /// - [`DiodeError::NoRegistry`] if the pairing is unregistered;
    /// - [`DiodeError::NotTracked`] if no composite exists for the uid;
    /// - [`DiodeError::Broker`] if the broker command fails; every constituent
    ///   is left untouched.
    pub async fn persist<R: DiodeEntity, C: DiodeEntity>(
        &self,
        uid: EntityUid,
    ) -> DiodeResult<CommandKind> {
        let provider = self.workspace.composite_provider::<R, C>()?;
        let composite = provider.registry.composite(uid)?;

        let data = composite.command_data().await?;
        let root_kind = data.root.kind;
        let root_state = composite.root()?.state().await;

        if root_state.is_new && root_state.is_marked_for_deletion {
            // The whole aggregate never reached the store.
            provider.registry.remove(uid)?;
            return Ok(CommandKind::None);
        }

        let all_none = root_kind == CommandKind::None
            && data.items.iter().all(|command| command.kind == CommandKind::None);
        if all_none {
            return Ok(CommandKind::None);
        }

        debug!(%uid, ?root_kind, items = data.items.len(), "persisting composite");
        if let Err(failure) = provider.broker.execute_command(data).await {
            warn!(%uid, %failure, "broker rejected composite command");
            return Err(failure.into());
        }

        composite.mark_persisted().await?;
        if root_kind == CommandKind::Delete {
            provider.registry.remove(uid)?;
        }
        Ok(root_kind)
    }
}
