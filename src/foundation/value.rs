use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::handle::image::ImageHandle;

/// Identifier the native library uses for one of its objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Native type tag as reported by introspection, e.g. `"VipsImage"` or `"gdouble"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable, cheaply cloneable byte buffer.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(Arc<[u8]>);

impl Blob {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::from(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.0.len())
    }
}

/// Readable byte source handed to native loaders.
#[derive(Clone, PartialEq, Eq)]
pub struct Source {
    bytes: Blob,
}

impl Source {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Blob::new(bytes),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_bytes()
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source({} bytes)", self.bytes.len())
    }
}

/// Shared, writable byte sink handed to native savers.
///
/// Clones refer to the same buffer, so the caller keeps a clone and reads the bytes back after the
/// save completes.
#[derive(Clone, Default)]
pub struct Target {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Target {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_all(&self, bytes: &[u8]) {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }

    /// Snapshot of everything written so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.buf
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buf, &other.buf)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({} bytes)", self.len())
    }
}

/// Shape of a host value, used for static admission checks and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Bool,
    Int,
    Double,
    Str,
    IntArray,
    DoubleArray,
    Image,
    ImageArray,
    Blob,
    Source,
    Target,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Double => "double",
            Self::Str => "string",
            Self::IntArray => "int array",
            Self::DoubleArray => "double array",
            Self::Image => "image",
            Self::ImageArray => "image array",
            Self::Blob => "blob",
            Self::Source => "source",
            Self::Target => "target",
        }
    }
}

/// Host-level argument or result value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    IntArray(Vec<i64>),
    DoubleArray(Vec<f64>),
    Image(ImageHandle),
    ImageArray(Vec<ImageHandle>),
    Blob(Blob),
    Source(Source),
    Target(Target),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Double(_) => ValueKind::Double,
            Self::Str(_) => ValueKind::Str,
            Self::IntArray(_) => ValueKind::IntArray,
            Self::DoubleArray(_) => ValueKind::DoubleArray,
            Self::Image(_) => ValueKind::Image,
            Self::ImageArray(_) => ValueKind::ImageArray,
            Self::Blob(_) => ValueKind::Blob,
            Self::Source(_) => ValueKind::Source,
            Self::Target(_) => ValueKind::Target,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(x) => Some(*x),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int_array(&self) -> Option<&[i64]> {
        match self {
            Self::IntArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double_array(&self) -> Option<&[f64]> {
        match self {
            Self::DoubleArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageHandle> {
        match self {
            Self::Image(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_image(self) -> Option<ImageHandle> {
        match self {
            Self::Image(h) => Some(h),
            _ => None,
        }
    }

    /// Convert a JSON literal from an introspection feed.
    ///
    /// Arrays of integers become `IntArray`, arrays containing any non-integer number become
    /// `DoubleArray`. Objects, nulls and mixed arrays have no host equivalent.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        use serde_json::Value as J;
        match json {
            J::Bool(b) => Some(Self::Bool(*b)),
            J::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Int(i)),
                None => n.as_f64().map(Self::Double),
            },
            J::String(s) => Some(Self::Str(s.clone())),
            J::Array(items) => {
                if let Some(ints) = items.iter().map(J::as_i64).collect::<Option<Vec<_>>>() {
                    Some(Self::IntArray(ints))
                } else {
                    items
                        .iter()
                        .map(J::as_f64)
                        .collect::<Option<Vec<_>>>()
                        .map(Self::DoubleArray)
                }
            }
            J::Null | J::Object(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str("]")
        }

        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Double(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::IntArray(v) => list(f, v),
            Self::DoubleArray(v) => list(f, v),
            Self::Image(h) => write!(f, "<image {}>", h.object_id()),
            Self::ImageArray(v) => write!(f, "<{} images>", v.len()),
            Self::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
            Self::Source(_) => f.write_str("<source>"),
            Self::Target(_) => f.write_str("<target>"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<i64>> for Value {
    fn from(value: Vec<i64>) -> Self {
        Self::IntArray(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Self::DoubleArray(value)
    }
}

impl From<ImageHandle> for Value {
    fn from(value: ImageHandle) -> Self {
        Self::Image(value)
    }
}

impl From<&ImageHandle> for Value {
    fn from(value: &ImageHandle) -> Self {
        Self::Image(value.clone())
    }
}

impl From<Vec<ImageHandle>> for Value {
    fn from(value: Vec<ImageHandle>) -> Self {
        Self::ImageArray(value)
    }
}

impl From<Blob> for Value {
    fn from(value: Blob) -> Self {
        Self::Blob(value)
    }
}

impl From<Source> for Value {
    fn from(value: Source) -> Self {
        Self::Source(value)
    }
}

impl From<Target> for Value {
    fn from(value: Target) -> Self {
        Self::Target(value)
    }
}

/// Value in the form a native call consumes or produces.
///
/// `Object`/`ObjectArray` only ever flow out of the native library: they carry one fresh native
/// reference each, which the binding layer adopts into an [`ImageHandle`].
#[derive(Clone, Debug, PartialEq)]
pub enum NativeValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Enum(i32),
    IntArray(Vec<i32>),
    DoubleArray(Vec<f64>),
    Image(ImageHandle),
    ImageArray(Vec<ImageHandle>),
    Object(ObjectId),
    ObjectArray(Vec<ObjectId>),
    Blob(Blob),
    Source(Source),
    Target(Target),
}

impl NativeValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::Enum(_) => "enum",
            Self::IntArray(_) => "int array",
            Self::DoubleArray(_) => "double array",
            Self::Image(_) => "image",
            Self::ImageArray(_) => "image array",
            Self::Object(_) => "object",
            Self::ObjectArray(_) => "object array",
            Self::Blob(_) => "blob",
            Self::Source(_) => "source",
            Self::Target(_) => "target",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/value.rs"]
mod tests;
