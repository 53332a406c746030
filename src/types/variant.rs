use std::sync::Arc;

use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::{NativeValue, TypeTag, Value};
use crate::handle::context::HandleContext;
use crate::handle::image::ImageHandle;
use crate::introspect::descriptor::ParamDescriptor;
use crate::types::typespec::StaticType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int,
    Double,
    Str,
}

/// Member table of a native enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumSpec {
    name: String,
    members: Vec<(String, i32)>,
}

impl EnumSpec {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (S, i32)>,
    ) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nicknames match case-insensitively, with `-` and `_` treated alike.
    pub fn value_of(&self, nick: &str) -> Option<i32> {
        let wanted = normalize_nick(nick);
        self.members
            .iter()
            .find(|(n, _)| normalize_nick(n) == wanted)
            .map(|(_, v)| *v)
    }

    pub fn nick_of(&self, value: i32) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    pub fn nicks(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(n, _)| n.as_str())
    }
}

fn normalize_nick(nick: &str) -> String {
    nick.trim().to_ascii_lowercase().replace('_', "-")
}

/// Closed set of parameter capabilities.
///
/// Each native type tag resolves to exactly one variant when descriptors are built. Tags nobody
/// registered resolve to [`TypeVariant::NotImplemented`], whose `cast` and `default` always fail.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeVariant {
    Image,
    ImageArray,
    Enum(Arc<EnumSpec>),
    DoubleArray,
    IntArray,
    Source,
    Target,
    Blob,
    Scalar(ScalarKind),
    NotImplemented(TypeTag),
}

/// Where a default is being requested from.
#[derive(Clone, Copy, Debug)]
pub struct DefaultContext<'a> {
    pub operation: &'a str,
    pub param: &'a ParamDescriptor,
}

impl TypeVariant {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::ImageArray => "image array",
            Self::Enum(_) => "enum",
            Self::DoubleArray => "double array",
            Self::IntArray => "int array",
            Self::Source => "source",
            Self::Target => "target",
            Self::Blob => "blob",
            Self::Scalar(ScalarKind::Bool) => "bool",
            Self::Scalar(ScalarKind::Int) => "int",
            Self::Scalar(ScalarKind::Double) => "double",
            Self::Scalar(ScalarKind::Str) => "string",
            Self::NotImplemented(_) => "not implemented",
        }
    }

    pub fn typespec(&self) -> StaticType {
        match self {
            Self::Image => StaticType::Image,
            Self::ImageArray => StaticType::ImageArray,
            Self::Enum(spec) => StaticType::Enum(spec.name().to_string()),
            Self::DoubleArray => StaticType::DoubleArray,
            Self::IntArray => StaticType::IntArray,
            Self::Source => StaticType::Source,
            Self::Target => StaticType::Target,
            Self::Blob => StaticType::Blob,
            Self::Scalar(ScalarKind::Bool) => StaticType::Bool,
            Self::Scalar(ScalarKind::Int) => StaticType::Int,
            Self::Scalar(ScalarKind::Double) => StaticType::Double,
            Self::Scalar(ScalarKind::Str) => StaticType::Str,
            Self::NotImplemented(tag) => StaticType::Unsupported(tag.to_string()),
        }
    }

    /// Value for an omitted optional parameter.
    ///
    /// A default declared by introspection wins (after it passes this variant's own cast). Without
    /// one, only booleans have a zero value; images, arrays, enums, sources and targets report
    /// `UnsupportedDefault`.
    pub fn default(&self, ctx: DefaultContext<'_>) -> BindResult<Value> {
        if let Self::NotImplemented(tag) = self {
            return Err(self.not_implemented(tag, &ctx.param.name));
        }
        if let Some(declared) = &ctx.param.default {
            self.cast(declared, ctx.param).map_err(|e| {
                BindError::introspection(format!(
                    "operation '{}' declares an invalid default for '{}': {e}",
                    ctx.operation, ctx.param.name
                ))
            })?;
            return Ok(declared.clone());
        }
        match self {
            Self::Scalar(ScalarKind::Bool) => Ok(Value::Bool(false)),
            _ => Err(BindError::UnsupportedDefault {
                parameter: ctx.param.name.clone(),
                variant: self.name(),
            }),
        }
    }

    /// Validate `raw` against this variant and convert it into native-call form.
    pub fn cast(&self, raw: &Value, param: &ParamDescriptor) -> BindResult<NativeValue> {
        if let Self::NotImplemented(tag) = self {
            return Err(self.not_implemented(tag, &param.name));
        }
        if !self.typespec().admits(raw.kind()) {
            return Err(self.mismatch(param, format!("found {}", raw.kind().name())));
        }

        let native = match (self, raw) {
            (Self::Image, Value::Image(h)) => NativeValue::Image(h.clone()),
            (Self::ImageArray, Value::Image(h)) => NativeValue::ImageArray(vec![h.clone()]),
            (Self::ImageArray, Value::ImageArray(v)) => {
                if v.is_empty() {
                    return Err(self.mismatch(param, "array must hold at least one image"));
                }
                NativeValue::ImageArray(v.clone())
            }
            (Self::Enum(spec), Value::Str(nick)) => {
                let value = spec.value_of(nick).ok_or_else(|| {
                    self.mismatch(
                        param,
                        format!(
                            "'{nick}' is not a member of {} (one of: {})",
                            spec.name(),
                            spec.nicks().collect::<Vec<_>>().join(", ")
                        ),
                    )
                })?;
                NativeValue::Enum(value)
            }
            (Self::Enum(spec), Value::Int(i)) => {
                let value = i32::try_from(*i)
                    .ok()
                    .filter(|v| spec.nick_of(*v).is_some())
                    .ok_or_else(|| {
                        self.mismatch(param, format!("{i} is not a member of {}", spec.name()))
                    })?;
                NativeValue::Enum(value)
            }
            (Self::DoubleArray, Value::DoubleArray(v)) => NativeValue::DoubleArray(v.clone()),
            (Self::DoubleArray, Value::IntArray(v)) => {
                NativeValue::DoubleArray(v.iter().map(|&i| i as f64).collect())
            }
            (Self::DoubleArray, Value::Double(x)) => NativeValue::DoubleArray(vec![*x]),
            (Self::DoubleArray, Value::Int(i)) => NativeValue::DoubleArray(vec![*i as f64]),
            (Self::IntArray, Value::IntArray(v)) => {
                let mut out = Vec::with_capacity(v.len());
                for (idx, &i) in v.iter().enumerate() {
                    out.push(i32::try_from(i).map_err(|_| {
                        self.mismatch(param, format!("element {idx} ({i}) does not fit in i32"))
                    })?);
                }
                NativeValue::IntArray(out)
            }
            (Self::IntArray, Value::DoubleArray(v)) => {
                let mut out = Vec::with_capacity(v.len());
                for (idx, &x) in v.iter().enumerate() {
                    let in_range = (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&x);
                    if !x.is_finite() || x.fract() != 0.0 || !in_range {
                        return Err(
                            self.mismatch(param, format!("element {idx} ({x}) is not an i32"))
                        );
                    }
                    out.push(x as i32);
                }
                NativeValue::IntArray(out)
            }
            (Self::IntArray, Value::Int(i)) => {
                let v = i32::try_from(*i)
                    .map_err(|_| self.mismatch(param, format!("{i} does not fit in i32")))?;
                NativeValue::IntArray(vec![v])
            }
            (Self::Source, Value::Source(s)) => NativeValue::Source(s.clone()),
            (Self::Target, Value::Target(t)) => NativeValue::Target(t.clone()),
            (Self::Blob, Value::Blob(b)) => NativeValue::Blob(b.clone()),
            (Self::Scalar(ScalarKind::Bool), Value::Bool(b)) => NativeValue::Bool(*b),
            (Self::Scalar(ScalarKind::Int), Value::Int(i)) => {
                if i32::try_from(*i).is_err() {
                    return Err(self.mismatch(param, format!("{i} does not fit in i32")));
                }
                self.check_bounds(param, *i as f64)?;
                NativeValue::Int(*i)
            }
            (Self::Scalar(ScalarKind::Double), Value::Double(x)) => {
                self.check_bounds(param, *x)?;
                NativeValue::Double(*x)
            }
            (Self::Scalar(ScalarKind::Double), Value::Int(i)) => {
                self.check_bounds(param, *i as f64)?;
                NativeValue::Double(*i as f64)
            }
            (Self::Scalar(ScalarKind::Str), Value::Str(s)) => NativeValue::Str(s.clone()),
            (_, other) => {
                return Err(self.mismatch(param, format!("found {}", other.kind().name())));
            }
        };
        Ok(native)
    }

    /// Convert a native value back into host form.
    ///
    /// Fresh native objects are adopted into handles here, so a value that fails to convert still
    /// has its native references released.
    pub(crate) fn read_back(
        &self,
        name: &str,
        native: NativeValue,
        ctx: &Arc<HandleContext>,
    ) -> BindResult<Value> {
        let value = match (self, native) {
            (Self::Image, NativeValue::Object(id)) => {
                Value::Image(ImageHandle::adopt(ctx.clone(), id))
            }
            (Self::Image, NativeValue::Image(h)) => Value::Image(h),
            (Self::ImageArray, NativeValue::ObjectArray(ids)) => Value::ImageArray(
                ids.into_iter()
                    .map(|id| ImageHandle::adopt(ctx.clone(), id))
                    .collect(),
            ),
            (Self::ImageArray, NativeValue::ImageArray(v)) => Value::ImageArray(v),
            (Self::Enum(spec), NativeValue::Enum(v)) => match spec.nick_of(v) {
                Some(nick) => Value::Str(nick.to_string()),
                None => Value::Int(v.into()),
            },
            (Self::DoubleArray, NativeValue::DoubleArray(v)) => Value::DoubleArray(v),
            (Self::IntArray, NativeValue::IntArray(v)) => {
                Value::IntArray(v.into_iter().map(i64::from).collect())
            }
            (Self::Source, NativeValue::Source(s)) => Value::Source(s),
            (Self::Target, NativeValue::Target(t)) => Value::Target(t),
            (Self::Blob, NativeValue::Blob(b)) => Value::Blob(b),
            (Self::Scalar(ScalarKind::Bool), NativeValue::Bool(b)) => Value::Bool(b),
            (Self::Scalar(ScalarKind::Int), NativeValue::Int(i)) => Value::Int(i),
            (Self::Scalar(ScalarKind::Double), NativeValue::Double(x)) => Value::Double(x),
            (Self::Scalar(ScalarKind::Double), NativeValue::Int(i)) => Value::Double(i as f64),
            (Self::Scalar(ScalarKind::Str), NativeValue::Str(s)) => Value::Str(s),
            (variant, other) => {
                let found = other.kind_name();
                discard(other, ctx);
                if let Self::NotImplemented(tag) = variant {
                    return Err(self.not_implemented(tag, name));
                }
                return Err(BindError::native(format!(
                    "native library returned {found} for '{name}', expected {}",
                    variant.name()
                )));
            }
        };
        Ok(value)
    }

    fn check_bounds(&self, param: &ParamDescriptor, x: f64) -> BindResult<()> {
        match param.bounds {
            Some(b) if !b.contains(x) => Err(self.mismatch(
                param,
                format!("{x} is outside [{}, {}]", b.min, b.max),
            )),
            _ => Ok(()),
        }
    }

    fn mismatch(&self, param: &ParamDescriptor, reason: impl Into<String>) -> BindError {
        BindError::cast(param.name.clone(), self.name(), reason)
    }

    fn not_implemented(&self, tag: &TypeTag, parameter: &str) -> BindError {
        BindError::NotImplemented {
            tag: tag.to_string(),
            parameter: parameter.to_string(),
        }
    }
}

/// Release any native objects carried by a value that will not reach the caller.
pub(crate) fn discard(native: NativeValue, ctx: &Arc<HandleContext>) {
    match native {
        NativeValue::Object(id) => drop(ImageHandle::adopt(ctx.clone(), id)),
        NativeValue::ObjectArray(ids) => {
            for id in ids {
                drop(ImageHandle::adopt(ctx.clone(), id));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "../../tests/unit/types/variant.rs"]
mod tests;
