//! Per-field provenance descriptors.

use std::collections::BTreeMap;

use uuid::Uuid;

/// Where a field's value came from.
///
/// Every user field has an entry in [`crate::model::Entity::attribute_source`]
/// at all times; a field produced locally (not borrowed or resolved from an
/// address) carries [`AttributeSource::None`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeSource {
    #[default]
    None,
    /// The field's value came from a single source entity.
    Single(Uuid),
    /// The field holds an ordered sequence; each element's source is
    /// recorded at the matching index (`None` for locally-produced elements).
    List(Vec<Option<Uuid>>),
    /// The field holds a keyed mapping; each entry's source is recorded
    /// under the same key.
    Mapping(BTreeMap<String, Option<Uuid>>),
}

impl AttributeSource {
    pub fn single(source: Uuid) -> Self {
        AttributeSource::Single(source)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AttributeSource::None)
    }

    /// The single source id this descriptor resolves to, if any. Used by
    /// provenance checks that only care "did this come from one place".
    pub fn source_id(&self) -> Option<Uuid> {
        match self {
            AttributeSource::Single(id) => Some(*id),
            _ => None,
        }
    }
}
