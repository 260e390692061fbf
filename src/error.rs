//! Error types for Diode.
//!
//! All errors are strongly typed using thiserror. Every expected condition is
//! reported as a value, never raised as an unrecoverable fault: each layer
//! converts failures from the layer below into its own result rather than
//! letting them escape. Local recovery is limited to leaving state unchanged
//! and reporting the reason.

use thiserror::Error;

use crate::entity::EntityUid;

/// Convenience alias for results returned by the core operations.
pub type DiodeResult<T> = Result<T, DiodeError>;

/// Failures reported by the core tracking operations.
#[derive(Debug, Error)]
pub enum DiodeError {
    /// The requested identity is absent from the backing store.
    #[error("no entity found in the data store for uid {uid}")]
    NotFound {
        /// The identity that was queried.
        uid: EntityUid,
    },

    /// A context for the identity already exists in the registry.
    #[error("a context is already tracked for uid {uid}")]
    AlreadyTracked {
        /// The identity that is already tracked.
        uid: EntityUid,
    },

    /// An operation was requested against an identity with no live context.
    #[error("no context is tracked for uid {uid}")]
    NotTracked {
        /// The identity with no live context.
        uid: EntityUid,
    },

    /// The entity type has no registered provider. A wiring defect, reported
    /// rather than crashed.
    #[error("no provider is registered for entity type {type_name}")]
    NoRegistry {
        /// The unregistered entity type.
        type_name: &'static str,
    },

    /// The dispatched action's transform reported failure. The context is left
    /// unchanged.
    #[error("action '{action}' rejected the mutation: {reason}")]
    MutationRejected {
        /// The name of the rejecting action.
        action: String,
        /// The transform's failure reason.
        reason: String,
    },

    /// The dispatched action was built from a snapshot version that is no
    /// longer current.
    #[error("action '{action}' was built from version {based_on} but the context is at version {current}")]
    StaleAction {
        /// The name of the stale action.
        action: String,
        /// The version the action was built from.
        based_on: u64,
        /// The context's current version.
        current: u64,
    },

    /// A composite root is already loaded.
    #[error("the composite root is already loaded for uid {uid}")]
    AlreadyLoaded {
        /// The uid of the loaded root.
        uid: EntityUid,
    },

    /// A composite operation requires a loaded root.
    #[error("the composite has no root loaded")]
    NotLoaded,

    /// The data broker reported failure. The original reason is forwarded,
    /// not swallowed.
    #[error("data broker failure: {0}")]
    Broker(#[from] BrokerError),
}

/// Failures reported by a data broker for a query or command.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// A query against the backing store failed.
    #[error("query failed: {message}")]
    QueryFailed {
        /// The backend's failure reason.
        message: String,
    },

    /// A command against the backing store failed.
    #[error("command failed: {message}")]
    CommandFailed {
        /// The backend's failure reason.
        message: String,
    },
}

impl BrokerError {
    /// A query failure with the given reason.
    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }

    /// A command failure with the given reason.
    pub fn command(message: impl Into<String>) -> Self {
        Self::CommandFailed {
            message: message.into(),
        }
    }
}

/// Failure reported by a mutation action's transform, for example a
/// validation rule.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct MutationError {
    reason: String,
}

impl MutationError {
    /// A rejection with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
