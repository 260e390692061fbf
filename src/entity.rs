//! Entity identity.
//!
//! Every trackable entity exposes a process-unique, stable identifier. The
//! identifier is the registry key: one live tracking context per `EntityUid`
//! per unit of work. Entities themselves are immutable value records; a change
//! always produces a new value.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique, stable entity identifier.
///
/// Once created, an `EntityUid` never changes for the lifetime of the entity.
///
/// # Examples
///
/// ```
/// use diode::EntityUid;
///
/// let uid = EntityUid::new();
/// assert!(!uid.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityUid(Uuid);

impl EntityUid {
    /// Creates a new random entity uid.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity uid from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates a nil entity uid (for sentinel values and tests).
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for EntityUid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityUid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EntityUid> for Uuid {
    fn from(uid: EntityUid) -> Self {
        uid.0
    }
}

/// A domain entity that can be tracked by a Diode context.
///
/// Implementors are immutable value records: mutation actions construct a new
/// value rather than editing in place. The uid must be stable across those
/// replacements; a dispatch that changes the uid is rejected.
pub trait DiodeEntity: Clone + Send + Sync + 'static {
    /// The stable identity used as the registry key.
    fn uid(&self) -> EntityUid;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_unique_and_stable() {
        let a = EntityUid::new();
        let b = EntityUid::new();
        assert_ne!(a, b);
        assert_eq!(a, EntityUid::from_uuid(*a.as_uuid()));
    }

    #[test]
    fn nil_uid_round_trips() {
        let nil = EntityUid::nil();
        assert!(nil.is_nil());
        assert_eq!(Uuid::from(nil), Uuid::nil());
    }

    #[test]
    fn display_matches_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(EntityUid::from(uuid).to_string(), uuid.to_string());
    }
}
