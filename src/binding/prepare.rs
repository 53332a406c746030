use std::collections::BTreeMap;
use std::sync::Arc;

use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::{NativeValue, Value};
use crate::handle::context::HandleContext;
use crate::handle::image::ImageHandle;
use crate::introspect::descriptor::{Direction, OperationDescriptor, ParamDescriptor};
use crate::introspect::store::DescriptorStore;
use crate::native::NativeArgs;
use crate::types::variant::DefaultContext;

/// Arguments validated and cast for one operation, ready to hand to the native library.
pub(crate) struct PreparedCall {
    pub(crate) op: Arc<OperationDescriptor>,
    pub(crate) args: NativeArgs,
}

/// Resolve, check and cast a call without touching native state.
///
/// `in_place` is the transaction duplicate bound to the operation's modified parameter; it must be
/// present exactly when the operation modifies an image. Images must belong to `ctx`'s library.
pub(crate) fn prepare(
    store: &DescriptorStore,
    ctx: &HandleContext,
    name: &str,
    positional: &[Value],
    optional: &BTreeMap<String, Value>,
    in_place: Option<&ImageHandle>,
) -> BindResult<PreparedCall> {
    let op = store
        .get(name)
        .ok_or_else(|| BindError::UnknownOperation(name.to_string()))?;

    match (op.is_in_place(), in_place) {
        (true, None) => return Err(BindError::RequiresTransaction(name.to_string())),
        (false, Some(_)) => {
            return Err(BindError::validation(format!(
                "operation '{name}' does not modify an image and cannot be applied in place"
            )));
        }
        _ => {}
    }

    if positional.len() != op.positional_arity() {
        return Err(BindError::ArityMismatch {
            operation: name.to_string(),
            expected: op.positional_arity(),
            got: positional.len(),
        });
    }

    for key in optional.keys() {
        let declared = op
            .param(key)
            .is_some_and(|p| p.direction == Direction::Input && !p.required);
        if !declared {
            return Err(BindError::UnknownParameter {
                operation: name.to_string(),
                parameter: key.clone(),
            });
        }
    }

    // Cast everything the caller supplied before resolving any default, so the first cast
    // failure is reported regardless of parameter order.
    let mut cast = BTreeMap::<&str, NativeValue>::new();
    for (p, raw) in op.required_inputs().zip(positional) {
        cast.insert(&p.name, cast_owned(ctx, raw, p)?);
    }
    for p in op.optional_inputs() {
        if let Some(raw) = optional.get(&p.name) {
            cast.insert(&p.name, cast_owned(ctx, raw, p)?);
        }
    }

    for p in op.optional_inputs() {
        if cast.contains_key(p.name.as_str()) {
            continue;
        }
        let dctx = DefaultContext {
            operation: name,
            param: p,
        };
        match p.variant.default(dctx) {
            Ok(value) => {
                cast.insert(&p.name, p.variant.cast(&value, p)?);
            }
            Err(BindError::UnsupportedDefault { .. } | BindError::NotImplemented { .. }) => {
                tracing::trace!(operation = name, parameter = %p.name, "no default; omitted");
            }
            Err(e) => return Err(e),
        }
    }

    let mut args = NativeArgs::new();
    for p in op.params() {
        match p.direction {
            Direction::Modify => {
                if let Some(target) = in_place {
                    args.push(p.name.clone(), NativeValue::Image(target.clone()));
                }
            }
            Direction::Input => {
                if let Some(v) = cast.remove(p.name.as_str()) {
                    args.push(p.name.clone(), v);
                }
            }
            Direction::Output => {}
        }
    }

    Ok(PreparedCall {
        op: op.clone(),
        args,
    })
}

fn cast_owned(ctx: &HandleContext, raw: &Value, p: &ParamDescriptor) -> BindResult<NativeValue> {
    let foreign = match raw {
        Value::Image(img) => !img.belongs_to(ctx),
        Value::ImageArray(imgs) => imgs.iter().any(|img| !img.belongs_to(ctx)),
        _ => false,
    };
    if foreign {
        return Err(BindError::cast(
            p.name.clone(),
            p.variant.name(),
            "image belongs to a different library",
        ));
    }
    p.variant.cast(raw, p)
}

#[cfg(test)]
#[path = "../../tests/unit/binding/prepare.rs"]
mod tests;
