//! Mutation actions.
//!
//! Actions are the single mutation entry point for a tracked entity. An action
//! exposes a pure, possibly-suspending transform from the current snapshot to
//! a new snapshot; the context applies the result atomically with its dirty
//! flags. An action never touches the context directly and never observes
//! another context.

use async_trait::async_trait;

use crate::entity::DiodeEntity;
use crate::error::MutationError;
use crate::state::DiodeState;

/// The input handed to an action's transform.
///
/// Carries a borrow of the current snapshot together with the dirty state and
/// version it was read under. The transform must not rely on anything outside
/// this request.
#[derive(Debug)]
pub struct MutationRequest<'a, T> {
    /// The context's current snapshot.
    pub item: &'a T,
    /// The dirty state paired with the snapshot.
    pub state: DiodeState,
    /// The snapshot version, monotonically increasing per successful dispatch.
    pub version: u64,
}

/// A dispatched mutation against one tracked entity.
///
/// Implementations range from plain field edits to composite edits and are
/// free to suspend (for example to run validation against another service).
/// The transform is pure with respect to the context: on `Err` the context is
/// left untouched and the reason is reported as
/// [`DiodeError::MutationRejected`](crate::DiodeError::MutationRejected).
#[async_trait]
pub trait DiodeAction<T: DiodeEntity>: Send + Sync {
    /// Human-readable action name, used in failure reports.
    fn name(&self) -> &str;

    /// The snapshot version this action was built from, if the caller wants
    /// optimistic-concurrency protection. A dispatch with a stale version is
    /// rejected before the transform runs.
    fn based_on(&self) -> Option<u64> {
        None
    }

    /// Produces the replacement snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] when the transform rejects the mutation; the
    /// context is left unchanged.
    async fn apply(&self, request: MutationRequest<'_, T>) -> Result<T, MutationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityUid;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        uid: EntityUid,
        count: i32,
    }

    impl DiodeEntity for Counter {
        fn uid(&self) -> EntityUid {
            self.uid
        }
    }

    struct Increment;

    #[async_trait]
    impl DiodeAction<Counter> for Increment {
        fn name(&self) -> &str {
            "increment"
        }

        async fn apply(&self, request: MutationRequest<'_, Counter>) -> Result<Counter, MutationError> {
            Ok(Counter {
                uid: request.item.uid,
                count: request.item.count + 1,
            })
        }
    }

    #[tokio::test]
    async fn transform_produces_a_new_value() {
        let item = Counter {
            uid: EntityUid::new(),
            count: 1,
        };
        let request = MutationRequest {
            item: &item,
            state: DiodeState::existing(),
            version: 1,
        };
        let next = Increment.apply(request).await.unwrap();
        assert_eq!(next.count, 2);
        assert_eq!(next.uid, item.uid);
        assert_eq!(item.count, 1);
    }

    #[test]
    fn actions_are_object_safe() {
        fn assert_dyn(_: &dyn DiodeAction<Counter>) {}
        assert_dyn(&Increment);
    }
}
