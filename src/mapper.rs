//! Entity/row mapping seam.
//!
//! Storage backends usually deal in a flattened row shape rather than the
//! domain entity. A mapper is the pure, total, side-effect-free translation
//! between the two; it carries no state and never fails.

/// Bidirectional translation between a domain entity and its storage
/// representation.
pub trait EntityMap {
    /// The storage row shape.
    type Row;
    /// The domain entity shape.
    type Entity;

    /// Translates a storage row into the domain entity.
    fn to_entity(row: &Self::Row) -> Self::Entity;

    /// Translates a domain entity into its storage row.
    fn to_row(entity: &Self::Entity) -> Self::Row;
}
