//! Boundary to the native image library.
//!
//! Everything the binding layer needs from the library goes through [`NativeLibrary`]: type
//! registration, introspection, operation calls and per-object field access. Objects are named by
//! [`ObjectId`]; every id the library hands out carries one reference that the binding layer
//! returns through [`NativeLibrary::release`] exactly once.

pub(crate) mod inprocess;

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::{NativeValue, ObjectId, TypeTag};
use crate::introspect::feed::IntrospectionFeed;
use crate::types::registry::TypeRegistryBuilder;

/// Failure reported by the native library. Surfaces as [`BindError::Native`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct NativeFailure {
    pub message: String,
}

impl NativeFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<NativeFailure> for BindError {
    fn from(value: NativeFailure) -> Self {
        BindError::Native {
            message: value.message,
        }
    }
}

/// Cast arguments for one native call, in descriptor order.
///
/// Omitted optional parameters are simply absent; the library applies its own defaults.
#[derive(Clone, Debug, Default)]
pub struct NativeArgs {
    values: SmallVec<[(String, NativeValue); 8]>,
}

impl NativeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: NativeValue) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&NativeValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Argument that the native side requires to be present.
    pub fn required(&self, name: &str) -> Result<&NativeValue, NativeFailure> {
        self.get(name)
            .ok_or_else(|| NativeFailure::new(format!("parameter '{name}' not set")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NativeValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output values produced by one native call, keyed by output parameter name.
#[derive(Clone, Debug, Default)]
pub struct NativeOutputs {
    values: BTreeMap<String, NativeValue>,
}

impl NativeOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: NativeValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: NativeValue) {
        self.values.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<NativeValue> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl IntoIterator for NativeOutputs {
    type Item = (String, NativeValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, NativeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Contract a native image library fulfils for the binding layer.
///
/// Implementations must be thread-safe: calls arrive concurrently from the worker pool, and
/// `release` may run on any thread that drops the last handle clone.
pub trait NativeLibrary: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Declare which variant handles each native type tag.
    fn register_types(&self, registry: &mut TypeRegistryBuilder);

    /// Describe every operation the library offers.
    fn introspect(&self) -> BindResult<IntrospectionFeed>;

    /// Run `operation`. New objects in the outputs each carry one reference owned by the caller.
    fn call(&self, operation: &str, args: &NativeArgs) -> Result<NativeOutputs, NativeFailure>;

    /// New object sharing `object`'s pixels with a private copy of its metadata.
    fn duplicate(&self, object: ObjectId) -> Result<ObjectId, NativeFailure>;

    fn field(&self, object: ObjectId, name: &str) -> Option<(TypeTag, NativeValue)>;

    fn field_names(&self, object: ObjectId) -> Vec<String>;

    fn set_field(
        &self,
        object: ObjectId,
        name: &str,
        tag: TypeTag,
        value: NativeValue,
    ) -> Result<(), NativeFailure>;

    /// `Ok(false)` when the field was not set.
    fn remove_field(&self, object: ObjectId, name: &str) -> Result<bool, NativeFailure>;

    /// Drop one reference to `object`.
    fn release(&self, object: ObjectId);
}
