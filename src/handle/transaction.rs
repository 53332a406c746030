use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::binding::binder::BinderShared;
use crate::binding::output::OutputBundle;
use crate::binding::prepare::prepare;
use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::Value;
use crate::handle::image::{BorrowGuard, ImageHandle};
use crate::introspect::descriptor::ParamDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    Open,
    Committed,
    Aborted,
}

/// Exclusive, copy-on-write mutation window over an image.
///
/// Opening a view borrows the source handle exclusively and duplicates its native object: the
/// duplicate gets its own metadata and shares pixels until a pixel write touches them. All
/// mutation lands on the duplicate. [`commit`](Self::commit) publishes it as a new handle;
/// [`abort`](Self::abort), or dropping the view, discards it. The source never changes.
pub struct MutableView {
    guard: BorrowGuard,
    duplicate: Option<ImageHandle>,
    shared: Arc<BinderShared>,
    state: ViewState,
}

impl MutableView {
    pub(crate) fn open(shared: Arc<BinderShared>, source: &ImageHandle) -> BindResult<Self> {
        if !source.belongs_to(&shared.ctx) {
            return Err(BindError::validation(format!(
                "image {} belongs to a different library",
                source.object_id()
            )));
        }
        let guard = source.try_borrow()?;
        let ctx = source.context().clone();
        let object = ctx.library.duplicate(source.object_id())?;
        let duplicate = ImageHandle::adopt(ctx, object);
        tracing::debug!(
            source = %source.object_id(),
            duplicate = %duplicate.object_id(),
            "transaction opened"
        );
        Ok(Self {
            guard,
            duplicate: Some(duplicate),
            shared,
            state: ViewState::Open,
        })
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// The handle this view was opened on. Reads through it never observe the view's changes.
    pub fn source(&self) -> &ImageHandle {
        self.guard.handle()
    }

    /// Read a field of the working copy.
    pub fn get(&self, name: &str) -> BindResult<Option<Value>> {
        self.working()?.get(name)
    }

    pub fn field_names(&self) -> BindResult<Vec<String>> {
        Ok(self.working()?.field_names())
    }

    /// Set a metadata field on the working copy.
    ///
    /// A field that already exists keeps its declared native type: a value that does not cast to
    /// it fails with `InvalidFieldType` and leaves the field untouched. A new field takes the type
    /// the registry infers from the value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> BindResult<()> {
        let value = value.into();
        let working = self.working()?;
        let ctx = working.context();

        let declared = ctx.library.field(working.object_id(), name).map(|(tag, _)| tag);
        let (tag, variant) = match declared {
            Some(tag) => {
                let variant = ctx.registry.resolve(&tag);
                (tag, variant)
            }
            None => ctx.registry.infer(&value).ok_or_else(|| BindError::InvalidFieldType {
                field: name.to_string(),
                expected: "a registered field type",
                found: value.kind().name(),
            })?,
        };

        let site = ParamDescriptor::field(name, tag.clone(), variant.clone());
        let native = variant.cast(&value, &site).map_err(|e| match e {
            BindError::Cast { .. } | BindError::NotImplemented { .. } => {
                BindError::InvalidFieldType {
                    field: name.to_string(),
                    expected: variant.name(),
                    found: value.kind().name(),
                }
            }
            other => other,
        })?;

        ctx.library.set_field(working.object_id(), name, tag, native)?;
        Ok(())
    }

    /// Remove a metadata field from the working copy. `Ok(false)` if it was not set.
    pub fn remove(&mut self, name: &str) -> BindResult<bool> {
        let working = self.working()?;
        Ok(working
            .context()
            .library
            .remove_field(working.object_id(), name)?)
    }

    /// Run an in-place native operation (one with a `modify` parameter) on the working copy.
    ///
    /// Arguments follow the same rules as [`Binder::invoke`](crate::Binder::invoke), minus the
    /// modified image, which is always the working copy.
    pub fn apply(
        &mut self,
        operation: &str,
        positional: &[Value],
        optional: &BTreeMap<String, Value>,
    ) -> BindResult<OutputBundle> {
        let working = self.working()?.clone();
        let prepared = prepare(
            &self.shared.store,
            &self.shared.ctx,
            operation,
            positional,
            optional,
            Some(&working),
        )?;
        drop(working);
        self.shared.dispatch(prepared).wait()
    }

    /// Publish the working copy as a new, immutable handle.
    pub fn commit(mut self) -> BindResult<ImageHandle> {
        let duplicate = self
            .duplicate
            .take()
            .ok_or_else(|| BindError::validation("transaction has no working copy"))?;
        let aliases = duplicate.ref_count() - 1;
        if aliases > 0 {
            return Err(BindError::OutstandingAlias(aliases));
        }
        self.state = ViewState::Committed;
        tracing::debug!(
            source = %self.source().object_id(),
            committed = %duplicate.object_id(),
            "transaction committed"
        );
        Ok(duplicate)
    }

    /// Discard the working copy.
    pub fn abort(mut self) {
        self.discard("transaction aborted");
    }

    fn working(&self) -> BindResult<&ImageHandle> {
        self.duplicate
            .as_ref()
            .ok_or_else(|| BindError::validation("transaction has no working copy"))
    }

    fn discard(&mut self, reason: &'static str) {
        self.state = ViewState::Aborted;
        if let Some(duplicate) = self.duplicate.take() {
            tracing::debug!(
                source = %self.source().object_id(),
                discarded = %duplicate.object_id(),
                "{reason}"
            );
        }
    }
}

impl Drop for MutableView {
    fn drop(&mut self) {
        if self.state == ViewState::Open {
            self.discard("transaction dropped while open");
        }
    }
}

impl fmt::Debug for MutableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableView")
            .field("source", &self.source().object_id())
            .field("duplicate", &self.duplicate.as_ref().map(ImageHandle::object_id))
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/handle/transaction.rs"]
mod tests;
