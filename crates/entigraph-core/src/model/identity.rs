//! Identity hashing modes used by change detection.

/// Controls how deep [`crate::model::Entity::compute_identity_hash`] looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityMode {
    /// Hash folds in only `ecs_id`. Cheapest; distinguishes versions only.
    Default,
    /// Hash additionally folds in every user field's value.
    Attributes,
    /// Hash additionally folds in the identity hash of every directly
    /// contained sub-entity. Used by the change detector to short-circuit
    /// diffing subtrees that are bit-identical.
    Containment,
}
