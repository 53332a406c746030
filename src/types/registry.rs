use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::value::{TypeTag, Value, ValueKind};
use crate::types::variant::{EnumSpec, ScalarKind, TypeVariant};

/// Mapping from native type tags to the variant that handles them.
///
/// Built once by the native binding layer through [`TypeRegistryBuilder`] and read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    variants: HashMap<TypeTag, TypeVariant>,
    // First tag registered for each value kind; used to type metadata fields nobody declared.
    preferred: HashMap<ValueKind, TypeTag>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Variant for `tag`, or the `NotImplemented` variant when nothing was registered for it.
    pub fn resolve(&self, tag: &TypeTag) -> TypeVariant {
        self.variants
            .get(tag)
            .cloned()
            .unwrap_or_else(|| TypeVariant::NotImplemented(tag.clone()))
    }

    pub fn is_registered(&self, tag: &TypeTag) -> bool {
        matches!(
            self.variants.get(tag),
            Some(v) if !matches!(v, TypeVariant::NotImplemented(_))
        )
    }

    /// Pick a tag and variant for a value stored under a field that has no declared type yet.
    pub fn infer(&self, value: &Value) -> Option<(TypeTag, TypeVariant)> {
        let tag = self.preferred.get(&value.kind())?;
        Some((tag.clone(), self.resolve(tag)))
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    inner: TypeRegistry,
}

impl TypeRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `variant` as the handler for `tag`. A later registration replaces an earlier one.
    pub fn register(&mut self, tag: impl Into<TypeTag>, variant: TypeVariant) -> &mut Self {
        let tag = tag.into();
        if let Some(kind) = natural_kind(&variant) {
            self.inner.preferred.entry(kind).or_insert_with(|| tag.clone());
        }
        if let Some(previous) = self.inner.variants.insert(tag.clone(), variant) {
            tracing::warn!(%tag, previous = previous.name(), "native type tag registered twice");
        }
        self
    }

    pub fn register_enum(
        &mut self,
        tag: impl Into<TypeTag>,
        members: &[(&str, i32)],
    ) -> &mut Self {
        let tag = tag.into();
        let spec = EnumSpec::new(tag.as_str(), members.iter().copied());
        self.register(tag, TypeVariant::Enum(Arc::new(spec)))
    }

    pub fn build(self) -> TypeRegistry {
        self.inner
    }
}

// Enums are never inferred: a bare string says nothing about which enumeration it belongs to.
fn natural_kind(variant: &TypeVariant) -> Option<ValueKind> {
    match variant {
        TypeVariant::Image => Some(ValueKind::Image),
        TypeVariant::ImageArray => Some(ValueKind::ImageArray),
        TypeVariant::DoubleArray => Some(ValueKind::DoubleArray),
        TypeVariant::IntArray => Some(ValueKind::IntArray),
        TypeVariant::Source => Some(ValueKind::Source),
        TypeVariant::Target => Some(ValueKind::Target),
        TypeVariant::Blob => Some(ValueKind::Blob),
        TypeVariant::Scalar(ScalarKind::Bool) => Some(ValueKind::Bool),
        TypeVariant::Scalar(ScalarKind::Int) => Some(ValueKind::Int),
        TypeVariant::Scalar(ScalarKind::Double) => Some(ValueKind::Double),
        TypeVariant::Scalar(ScalarKind::Str) => Some(ValueKind::Str),
        TypeVariant::Enum(_) | TypeVariant::NotImplemented(_) => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/types/registry.rs"]
mod tests;
