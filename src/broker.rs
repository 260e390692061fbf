//! Data broker seam.
//!
//! The broker is the only externally-synchronized collaborator: an abstract
//! query/command executor that reads and writes entities against whatever
//! storage engine is configured. This core trusts a single broker call to be
//! atomic and never implements storage I/O itself.
//!
//! Cancellation is caller-driven: dropping an in-flight broker future cancels
//! the call, and because contexts are only marked persisted after the call
//! returns successfully, a cancelled call always leaves the pre-call state
//! intact.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::composite::CompositeData;
use crate::entity::{DiodeEntity, EntityUid};
use crate::error::BrokerError;
use crate::state::CommandKind;

/// A fetch-one-entity-by-identity request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQueryRequest {
    /// The identity to fetch.
    pub uid: EntityUid,
}

impl ItemQueryRequest {
    /// Request for the given identity.
    #[must_use]
    pub const fn new(uid: EntityUid) -> Self {
        Self { uid }
    }
}

/// A command-kind-tagged entity payload: one add/update/delete for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest<T> {
    /// The identity the command applies to.
    pub uid: EntityUid,
    /// The persistence action to perform.
    pub kind: CommandKind,
    /// The entity snapshot to persist.
    pub item: T,
}

/// The persistence payload for one aggregate: the root's tagged snapshot plus
/// each child's tagged snapshot, with children ordered so that adds and
/// updates are issued before deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeCommandRequest<R, C> {
    /// The aggregate identity (the root's uid).
    pub uid: EntityUid,
    /// The root's tagged snapshot.
    pub root: CommandRequest<R>,
    /// The children's tagged snapshots, sorted by command kind.
    pub items: Vec<CommandRequest<C>>,
}

/// Query/command executor for one entity type.
///
/// `execute_query` returning `Ok(None)` signals not-found; `Err` signals a
/// backend failure. A `CommandKind::None` request never reaches the broker;
/// the core short-circuits it.
#[async_trait]
pub trait DataBroker<T: DiodeEntity>: Send + Sync {
    /// Fetches one entity by identity.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the backend fails; `Ok(None)` when the
    /// identity is simply absent.
    async fn execute_query(&self, request: ItemQueryRequest) -> Result<Option<T>, BrokerError>;

    /// Applies one add/update/delete command for one entity.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the backend rejects or fails the command.
    async fn execute_command(&self, request: CommandRequest<T>) -> Result<(), BrokerError>;
}

/// Query/command executor for one root/child aggregate type.
///
/// The broker is trusted to apply the whole aggregate command atomically; the
/// composite itself implements no rollback.
#[async_trait]
pub trait CompositeBroker<R: DiodeEntity, C: DiodeEntity>: Send + Sync {
    /// Fetches one aggregate by the root identity.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the backend fails; `Ok(None)` when the
    /// identity is simply absent.
    async fn execute_query(
        &self,
        request: ItemQueryRequest,
    ) -> Result<Option<CompositeData<R, C>>, BrokerError>;

    /// Applies one aggregate command as a single unit.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the backend rejects or fails the command.
    async fn execute_command(
        &self,
        request: CompositeCommandRequest<R, C>,
    ) -> Result<(), BrokerError>;
}
