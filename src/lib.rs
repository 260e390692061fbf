//! # Diode - unidirectional, optimistic entity-state management
//!
//! Diode sits between an application's domain model and a persistence
//! backend. It holds exactly one live tracking context per domain entity
//! instance, records why that entity differs from the persisted copy
//! (new / mutated / marked for deletion), and translates that difference into
//! a single well-ordered persistence command when the caller asks to save.
//!
//! ## Core concepts
//!
//! - **Entity**: an immutable value record with a stable [`EntityUid`]
//! - **Dirty state**: the new/mutated/marked-for-deletion flags tracked per
//!   context, from which the persistence [`CommandKind`] is derived
//! - **Context**: the live tracking object pairing one snapshot with its
//!   dirty state
//! - **Registry**: the per-unit-of-work store of contexts keyed by identity,
//!   at most one per identity
//! - **Composite**: a root entity plus dependent children persisted as one
//!   aggregate, deletes always ordered last
//! - **Data broker**: the external executor that performs the actual
//!   query/command against storage
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use diode::{DiodeContextFactory, Workspace};
//! use diode::forecast::{EditWeatherForecast, InMemoryWeatherBroker, WeatherForecast};
//!
//! let workspace = Arc::new(Workspace::new());
//! workspace.register_entity::<WeatherForecast>(Arc::new(InMemoryWeatherBroker::new()));
//! let factory = DiodeContextFactory::new(workspace);
//!
//! // Load, edit, persist.
//! let context = factory.load::<WeatherForecast>(uid).await?;
//! let mut edit = EditWeatherForecast::from_snapshot(&context.snapshot().await);
//! edit.temperature_c += 10;
//! context.dispatch(&edit).await?;
//! factory.persist::<WeatherForecast>(uid).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core model
pub mod action;
pub mod context;
pub mod entity;
pub mod error;
pub mod registry;
pub mod state;

// Aggregates, collaborator seams and orchestration
pub mod broker;
pub mod composite;
pub mod factory;
pub mod mapper;
pub mod query;
pub mod workspace;

// Reference domain
pub mod forecast;

// Re-export primary types at crate root for convenience
pub use action::{DiodeAction, MutationRequest};
pub use broker::{
    CommandRequest, CompositeBroker, CompositeCommandRequest, DataBroker, ItemQueryRequest,
};
pub use composite::{CompositeData, CompositeRegistry, DiodeComposite};
pub use context::{ContextHandle, DiodeContext};
pub use entity::{DiodeEntity, EntityUid};
pub use error::{BrokerError, DiodeError, DiodeResult, MutationError};
pub use factory::{DiodeCompositeFactory, DiodeContextFactory};
pub use mapper::EntityMap;
pub use query::{
    apply_filters, apply_sorts, Comparator, FilterDefinition, FilterResolver, Predicate,
    SortDefinition, SortResolver,
};
pub use registry::DiodeRegistry;
pub use state::{CommandKind, DiodeState};
pub use workspace::Workspace;
