//! Input-pattern classification for callable kwargs.

use crate::address::{resolve, Address, Resolved};
use crate::errors::Result;
use crate::model::FieldValue;
use crate::registry::Registry;

/// How a single kwarg was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPattern {
    /// A root entity passed by value.
    Entity,
    /// A non-root entity passed by value.
    SubEntity,
    /// A string address that resolves to a root entity.
    EntityAddress,
    /// A string address that resolves to a non-root entity.
    SubEntityAddress,
    /// A string address that resolves to a non-entity value.
    FieldAddress,
    /// Any other primitive.
    Direct,
}

/// The overall shape of a call, derived from the combination of its kwargs'
/// [`InputPattern`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPattern {
    Direct,
    PureTransactional,
    PureBorrowing,
    Mixed,
    SubEntityTransactional,
}

/// Classify one kwarg value.
pub fn classify_kwarg(registry: &Registry, value: &FieldValue) -> Result<InputPattern> {
    match value {
        FieldValue::Entity(e) if e.is_root() => Ok(InputPattern::Entity),
        FieldValue::Entity(_) => Ok(InputPattern::SubEntity),
        FieldValue::Text(s) if Address::is_address(s) => match resolve(registry, s)? {
            Resolved::Entity(_) => Ok(InputPattern::EntityAddress),
            Resolved::SubEntity(_) => Ok(InputPattern::SubEntityAddress),
            Resolved::FieldValue(_) => Ok(InputPattern::FieldAddress),
        },
        _ => Ok(InputPattern::Direct),
    }
}

/// Combine a call's kwarg classifications into its overall [`CallPattern`].
pub fn combine(patterns: &[InputPattern]) -> CallPattern {
    if patterns.is_empty() || patterns.iter().all(|p| *p == InputPattern::Direct) {
        return CallPattern::Direct;
    }
    if patterns.iter().all(|p| *p == InputPattern::Entity) {
        return CallPattern::PureTransactional;
    }
    if patterns.iter().all(|p| *p == InputPattern::SubEntity) {
        return CallPattern::SubEntityTransactional;
    }
    let is_address = |p: &InputPattern| {
        matches!(
            p,
            InputPattern::EntityAddress | InputPattern::SubEntityAddress | InputPattern::FieldAddress
        )
    };
    if patterns.iter().all(is_address) {
        return CallPattern::PureBorrowing;
    }
    CallPattern::Mixed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_direct_is_direct_pattern() {
        let patterns = vec![InputPattern::Direct, InputPattern::Direct];
        assert_eq!(combine(&patterns), CallPattern::Direct);
    }

    #[test]
    fn mixed_entity_and_address_is_mixed() {
        let patterns = vec![InputPattern::Entity, InputPattern::FieldAddress];
        assert_eq!(combine(&patterns), CallPattern::Mixed);
    }

    #[test]
    fn all_addresses_is_pure_borrowing() {
        let patterns = vec![InputPattern::EntityAddress, InputPattern::FieldAddress];
        assert_eq!(combine(&patterns), CallPattern::PureBorrowing);
    }
}
