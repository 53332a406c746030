use std::collections::BTreeMap;
use std::sync::Arc;

use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::{TypeTag, Value};
use crate::introspect::descriptor::{Bounds, OperationDescriptor, ParamDescriptor};
use crate::introspect::feed::{IntrospectionFeed, RawOperation, RawParam};
use crate::types::registry::TypeRegistry;
use crate::types::variant::TypeVariant;

/// Every operation the native library exposes, keyed by name.
///
/// Built once from an [`IntrospectionFeed`] and shared read-only by all calls.
#[derive(Debug, Default)]
pub struct DescriptorStore {
    operations: BTreeMap<String, Arc<OperationDescriptor>>,
}

impl DescriptorStore {
    #[tracing::instrument(
        skip_all,
        fields(library = %feed.library, operations = feed.operations.len())
    )]
    pub fn load(feed: &IntrospectionFeed, registry: &TypeRegistry) -> BindResult<Self> {
        let mut operations = BTreeMap::new();
        for raw in &feed.operations {
            let op = build_operation(raw, registry)?;
            if operations
                .insert(op.name().to_string(), Arc::new(op))
                .is_some()
            {
                return Err(BindError::introspection(format!(
                    "operation '{}' is listed twice",
                    raw.name
                )));
            }
        }
        tracing::debug!(loaded = operations.len(), "descriptor store ready");
        Ok(Self { operations })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<OperationDescriptor>> {
        self.operations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Operation names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// `(operation, parameter, tag)` for every parameter whose native type has no variant.
    pub fn unimplemented_params(&self) -> Vec<(&str, &str, &TypeTag)> {
        self.iter()
            .flat_map(|op| {
                op.params()
                    .iter()
                    .filter(|p| matches!(p.variant, TypeVariant::NotImplemented(_)))
                    .map(move |p| (op.name(), p.name.as_str(), &p.tag))
            })
            .collect()
    }
}

fn build_operation(raw: &RawOperation, registry: &TypeRegistry) -> BindResult<OperationDescriptor> {
    let params = raw
        .params
        .iter()
        .map(|p| build_param(&raw.name, p, registry))
        .collect::<BindResult<Vec<_>>>()?;
    OperationDescriptor::new(raw.name.clone(), raw.description.clone(), params)
}

fn build_param(op: &str, raw: &RawParam, registry: &TypeRegistry) -> BindResult<ParamDescriptor> {
    if raw.name.trim().is_empty() {
        return Err(BindError::introspection(format!(
            "operation '{op}' has a parameter without a name"
        )));
    }

    let variant = registry.resolve(&raw.type_tag);
    if let TypeVariant::NotImplemented(tag) = &variant {
        tracing::warn!(
            operation = op,
            parameter = %raw.name,
            %tag,
            "no variant registered for native type; parameter cannot be supplied"
        );
    }

    let default = match &raw.default {
        None => None,
        Some(json) => Some(Value::from_json(json).ok_or_else(|| {
            BindError::introspection(format!(
                "operation '{op}': default for '{}' is not a host value: {json}",
                raw.name
            ))
        })?),
    };

    let bounds = match (raw.min, raw.max) {
        (None, None) => None,
        (min, max) => {
            let b = Bounds {
                min: min.unwrap_or(f64::NEG_INFINITY),
                max: max.unwrap_or(f64::INFINITY),
            };
            if b.min > b.max {
                return Err(BindError::introspection(format!(
                    "operation '{op}': '{}' has min > max",
                    raw.name
                )));
            }
            Some(b)
        }
    };

    Ok(ParamDescriptor {
        name: raw.name.clone(),
        tag: raw.type_tag.clone(),
        variant,
        required: raw.required,
        direction: raw.direction,
        default,
        bounds,
        description: raw.description.clone(),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/introspect/store.rs"]
mod tests;
