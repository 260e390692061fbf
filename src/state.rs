//! Dirty-state model.
//!
//! A context records why its entity differs from the persisted copy with three
//! independent flags, and derives the persistence command to issue from them.
//! The derivation precedence and the command ordering are both part of the
//! contract, not implementation details.

use serde::{Deserialize, Serialize};

/// The persistence command derived from a context's dirty state.
///
/// The variant order carries an intrinsic total order used when persisting an
/// aggregate: `None < Add < Update < Delete`. `Delete` is strictly maximal so
/// that a delete can never be issued ahead of dependent adds and updates in
/// backends that enforce referential constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Nothing to persist.
    None,
    /// The entity has never reached the store and must be inserted.
    Add,
    /// The stored copy must be replaced with the current snapshot.
    Update,
    /// The stored copy must be removed.
    Delete,
}

/// The lifecycle flags tracked for one entity context.
///
/// The flags are orthogonal: all eight combinations are legal input to
/// [`DiodeState::command_kind`], though only a subset is reachable through the
/// context operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiodeState {
    /// The entity was created in this unit of work and is absent from the store.
    pub is_new: bool,
    /// The snapshot differs from the stored copy.
    pub is_mutated: bool,
    /// The entity should be removed from the store on the next persist.
    pub is_marked_for_deletion: bool,
}

impl DiodeState {
    /// State for an entity fetched from the store.
    #[must_use]
    pub const fn existing() -> Self {
        Self {
            is_new: false,
            is_mutated: false,
            is_marked_for_deletion: false,
        }
    }

    /// State for an entity constructed in this unit of work.
    #[must_use]
    pub const fn new_entity() -> Self {
        Self {
            is_new: true,
            is_mutated: false,
            is_marked_for_deletion: false,
        }
    }

    /// Derives the persistence command for this state.
    ///
    /// Evaluation order is the contract:
    ///
    /// 1. new and marked for deletion: the entity never reached the store, so
    ///    there is nothing to send;
    /// 2. new: add;
    /// 3. marked for deletion: delete;
    /// 4. mutated: update;
    /// 5. otherwise nothing.
    #[must_use]
    pub const fn command_kind(self) -> CommandKind {
        if self.is_new && self.is_marked_for_deletion {
            CommandKind::None
        } else if self.is_new {
            CommandKind::Add
        } else if self.is_marked_for_deletion {
            CommandKind::Delete
        } else if self.is_mutated {
            CommandKind::Update
        } else {
            CommandKind::None
        }
    }
}
