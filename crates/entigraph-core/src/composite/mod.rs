//! Assembling a new entity from a field -> value|address|entity mapping.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::address::{resolve, Address, Resolved};
use crate::classify::{classify_kwarg, InputPattern};
use crate::errors::Result;
use crate::model::{AttributeSource, Entity, FieldValue};
use crate::registry::Registry;

/// The outcome of [`Composite::create`]/[`Composite::create_advanced`].
pub struct CompositeResult {
    pub entity: Entity,
    pub classification: BTreeMap<String, InputPattern>,
    pub dependencies: BTreeSet<Uuid>,
}

pub struct Composite;

impl Composite {
    /// Build `entity_type` from `mapping`, without promoting or registering it.
    pub fn create(
        registry: &Registry,
        entity_type: impl Into<String>,
        mapping: BTreeMap<String, FieldValue>,
    ) -> Result<CompositeResult> {
        Self::create_advanced(registry, entity_type, mapping, false)
    }

    /// Build `entity_type` from `mapping`. When `promote` is set, the
    /// result is promoted to root and registered before being returned.
    pub fn create_advanced(
        registry: &Registry,
        entity_type: impl Into<String>,
        mapping: BTreeMap<String, FieldValue>,
        promote: bool,
    ) -> Result<CompositeResult> {
        let mut fields = BTreeMap::new();
        let mut attribute_source = BTreeMap::new();
        let mut classification = BTreeMap::new();
        let mut dependencies = BTreeSet::new();

        for (field_name, raw_value) in mapping {
            let pattern = classify_kwarg(registry, &raw_value)?;
            classification.insert(field_name.clone(), pattern);

            let (value, source) = resolve_field(registry, pattern, raw_value, &mut dependencies)?;

            fields.insert(field_name.clone(), value);
            attribute_source.insert(field_name, source);
        }

        let mut entity = Entity::new(entity_type, fields);
        entity.attribute_source = attribute_source;

        if promote {
            entity.promote_to_root();
            registry.register(&mut entity)?;
        }

        Ok(CompositeResult {
            entity,
            classification,
            dependencies,
        })
    }
}

fn resolve_field(
    registry: &Registry,
    pattern: InputPattern,
    raw_value: FieldValue,
    dependencies: &mut BTreeSet<Uuid>,
) -> Result<(FieldValue, AttributeSource)> {
    match pattern {
        InputPattern::Direct => Ok((raw_value, AttributeSource::None)),
        InputPattern::Entity | InputPattern::SubEntity => {
            let source = raw_value.as_entity().map(|e| {
                dependencies.insert(e.ecs_id);
                e.ecs_id
            });
            let source = source.map(AttributeSource::Single).unwrap_or_default();
            Ok((raw_value, source))
        }
        InputPattern::EntityAddress | InputPattern::SubEntityAddress | InputPattern::FieldAddress => {
            let text = match &raw_value {
                FieldValue::Text(s) => s.clone(),
                _ => unreachable!("classify_kwarg only returns an *Address pattern for Text"),
            };
            let resolved = resolve(registry, &text)?;
            let source_id = match &resolved {
                Resolved::Entity(e) | Resolved::SubEntity(e) => e.ecs_id,
                Resolved::FieldValue(_) => Address::parse(&text)?.uuid,
            };
            dependencies.insert(source_id);
            let value = match resolved {
                Resolved::Entity(e) | Resolved::SubEntity(e) => FieldValue::Entity(Box::new(e)),
                Resolved::FieldValue(v) => v,
            };
            Ok((value, AttributeSource::single(source_id)))
        }
    }
}
