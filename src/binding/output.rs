use std::collections::BTreeMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::Value;
use crate::handle::context::HandleContext;
use crate::handle::image::ImageHandle;
use crate::introspect::descriptor::OperationDescriptor;
use crate::native::NativeOutputs;
use crate::types::variant::discard;

/// Results of one call: required outputs in declared order, then optional outputs by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputBundle {
    primary: SmallVec<[Value; 2]>,
    extras: BTreeMap<String, Value>,
}

impl OutputBundle {
    pub fn primary(&self) -> &[Value] {
        &self.primary
    }

    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extras
    }

    /// Number of primary values; always the operation's declared return arity.
    pub fn arity(&self) -> usize {
        self.primary.len()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.primary.get(index)
    }

    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extras.get(name)
    }

    pub fn into_parts(self) -> (Vec<Value>, BTreeMap<String, Value>) {
        (self.primary.into_vec(), self.extras)
    }

    /// First primary value as an image, for the common single-image-output case.
    pub fn into_image(self) -> BindResult<ImageHandle> {
        match self.primary.into_iter().next() {
            Some(Value::Image(h)) => Ok(h),
            Some(other) => Err(BindError::validation(format!(
                "first output is {}, not an image",
                other.kind().name()
            ))),
            None => Err(BindError::validation("operation produced no primary output")),
        }
    }
}

/// Package native outputs per the descriptor.
///
/// Every native object in `outputs` ends up owned by a handle, including on the error path, so
/// nothing leaks when a required output is missing or mistyped.
pub(crate) fn collect_outputs(
    op: &OperationDescriptor,
    mut outputs: NativeOutputs,
    ctx: &Arc<HandleContext>,
) -> BindResult<OutputBundle> {
    let mut bundle = OutputBundle::default();
    let mut first_err = None::<BindError>;

    for p in op.params().iter().filter(|p| p.is_output()) {
        match outputs.remove(&p.name) {
            Some(native) => match p.variant.read_back(&p.name, native, ctx) {
                Ok(value) if p.required => bundle.primary.push(value),
                Ok(value) => {
                    bundle.extras.insert(p.name.clone(), value);
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            },
            None if p.required => {
                first_err.get_or_insert(BindError::native(format!(
                    "operation '{}' did not produce required output '{}'",
                    op.name(),
                    p.name
                )));
            }
            None => {}
        }
    }

    for (name, native) in outputs {
        tracing::warn!(
            operation = op.name(),
            output = %name,
            "native library returned an undeclared output; discarding"
        );
        discard(native, ctx);
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(bundle),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/binding/output.rs"]
mod tests;
