//! Unit-of-work wiring.
//!
//! A workspace is the explicit replacement for an ambient service container:
//! the application constructs one per unit of work, registers a data broker
//! for each entity and composite type it will track, and passes the workspace
//! to the factories. Resolution is an explicit type-tag lookup table; an
//! unregistered type is a reported wiring defect (`NoRegistry`), never a
//! crash.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::broker::{CompositeBroker, DataBroker};
use crate::composite::CompositeRegistry;
use crate::entity::DiodeEntity;
use crate::error::{DiodeError, DiodeResult};
use crate::registry::DiodeRegistry;

pub(crate) struct EntityProvider<T: DiodeEntity> {
    pub(crate) registry: Arc<DiodeRegistry<T>>,
    pub(crate) broker: Arc<dyn DataBroker<T>>,
}

impl<T: DiodeEntity> Clone for EntityProvider<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            broker: Arc::clone(&self.broker),
        }
    }
}

pub(crate) struct CompositeProvider<R: DiodeEntity, C: DiodeEntity> {
    pub(crate) registry: Arc<CompositeRegistry<R, C>>,
    pub(crate) broker: Arc<dyn CompositeBroker<R, C>>,
}

impl<R: DiodeEntity, C: DiodeEntity> Clone for CompositeProvider<R, C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            broker: Arc::clone(&self.broker),
        }
    }
}

/// Per-unit-of-work lookup table from entity type to its registry and broker.
///
/// Registration happens once at the start of the unit of work; re-registering
/// a type replaces its provider (and discards any contexts the old registry
/// tracked).
#[derive(Default)]
pub struct Workspace {
    entities: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    composites: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Workspace {
    /// An empty workspace with nothing registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type: a fresh registry paired with the broker that
    /// persists it. Returns the registry for direct application access.
    pub fn register_entity<T: DiodeEntity>(
        &self,
        broker: Arc<dyn DataBroker<T>>,
    ) -> Arc<DiodeRegistry<T>> {
        let registry = Arc::new(DiodeRegistry::new());
        self.entities.write().insert(
            TypeId::of::<T>(),
            Box::new(EntityProvider {
                registry: Arc::clone(&registry),
                broker,
            }),
        );
        registry
    }

    /// Registers a root/child composite type pairing.
    pub fn register_composite<R: DiodeEntity, C: DiodeEntity>(
        &self,
        broker: Arc<dyn CompositeBroker<R, C>>,
    ) -> Arc<CompositeRegistry<R, C>> {
        let registry = Arc::new(CompositeRegistry::new());
        self.composites.write().insert(
            TypeId::of::<(R, C)>(),
            Box::new(CompositeProvider {
                registry: Arc::clone(&registry),
                broker,
            }),
        );
        registry
    }

    /// The registry for a registered entity type.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NoRegistry`] if the type was never registered.
    pub fn registry<T: DiodeEntity>(&self) -> DiodeResult<Arc<DiodeRegistry<T>>> {
        Ok(self.entity_provider::<T>()?.registry)
    }

    /// The registry for a registered composite type pairing.
    ///
    /// # Errors
    ///
    /// Returns [`DiodeError::NoRegistry`] if the pairing was never registered.
    pub fn composite_registry<R: DiodeEntity, C: DiodeEntity>(
        &self,
    ) -> DiodeResult<Arc<CompositeRegistry<R, C>>> {
        Ok(self.composite_provider::<R, C>()?.registry)
    }

    pub(crate) fn entity_provider<T: DiodeEntity>(&self) -> DiodeResult<EntityProvider<T>> {
        self.entities
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|provider| provider.downcast_ref::<EntityProvider<T>>())
            .cloned()
            .ok_or(DiodeError::NoRegistry {
                type_name: std::any::type_name::<T>(),
            })
    }

    pub(crate) fn composite_provider<R: DiodeEntity, C: DiodeEntity>(
        &self,
    ) -> DiodeResult<CompositeProvider<R, C>> {
        self.composites
            .read()
            .get(&TypeId::of::<(R, C)>())
            .and_then(|provider| provider.downcast_ref::<CompositeProvider<R, C>>())
            .cloned()
            .ok_or(DiodeError::NoRegistry {
                type_name: std::any::type_name::<(R, C)>(),
            })
    }
}
