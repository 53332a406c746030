use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::{ObjectId, Value};
use crate::handle::context::HandleContext;

/// Observable state of a live handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleState {
    Live,
    /// A transaction is open on this object.
    ExclusivelyBorrowed,
}

/// Shared, immutable reference to a native image.
///
/// Clones share one native reference. When the last clone is dropped the native library is asked
/// to release the object, exactly once. The content behind a handle never changes; mutation goes
/// through a [`MutableView`](crate::MutableView), which produces a new handle.
#[derive(Clone)]
pub struct ImageHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    object: ObjectId,
    ctx: Arc<HandleContext>,
    borrowed: AtomicBool,
    finalized: AtomicBool,
}

impl HandleInner {
    fn finalize(&self) {
        if self.finalized.swap(true, Ordering::AcqRel) {
            tracing::warn!(object = %self.object, "finalizer ran twice; ignoring");
            return;
        }
        tracing::trace!(object = %self.object, "releasing native object");
        self.ctx.library.release(self.object);
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl ImageHandle {
    /// Take ownership of one native reference to `object`.
    pub(crate) fn adopt(ctx: Arc<HandleContext>, object: ObjectId) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                object,
                ctx,
                borrowed: AtomicBool::new(false),
                finalized: AtomicBool::new(false),
            }),
        }
    }

    pub fn object_id(&self) -> ObjectId {
        self.inner.object
    }

    pub fn state(&self) -> HandleState {
        if self.inner.borrowed.load(Ordering::Acquire) {
            HandleState::ExclusivelyBorrowed
        } else {
            HandleState::Live
        }
    }

    pub fn is_borrowed(&self) -> bool {
        self.state() == HandleState::ExclusivelyBorrowed
    }

    /// Number of host-side clones currently sharing the native reference.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a metadata field. `Ok(None)` when the field is not set.
    pub fn get(&self, name: &str) -> BindResult<Option<Value>> {
        let ctx = &self.inner.ctx;
        let Some((tag, native)) = ctx.library.field(self.inner.object, name) else {
            return Ok(None);
        };
        ctx.registry
            .resolve(&tag)
            .read_back(name, native, ctx)
            .map(Some)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.inner.ctx.library.field_names(self.inner.object)
    }

    pub fn width(&self) -> BindResult<u32> {
        self.dimension("width")
    }

    pub fn height(&self) -> BindResult<u32> {
        self.dimension("height")
    }

    pub fn bands(&self) -> BindResult<u32> {
        self.dimension("bands")
    }

    fn dimension(&self, name: &str) -> BindResult<u32> {
        self.get(name)?
            .as_ref()
            .and_then(Value::as_i64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| BindError::native(format!("image has no valid '{name}' field")))
    }

    pub(crate) fn context(&self) -> &Arc<HandleContext> {
        &self.inner.ctx
    }

    pub(crate) fn belongs_to(&self, ctx: &HandleContext) -> bool {
        self.inner.ctx.same_library(ctx)
    }

    /// Claim exclusive mutation rights. The guard keeps a strong reference, so the object cannot be
    /// finalized while it is borrowed.
    pub(crate) fn try_borrow(&self) -> BindResult<BorrowGuard> {
        self.inner
            .borrowed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BindError::AlreadyBorrowed)?;
        Ok(BorrowGuard {
            handle: self.clone(),
        })
    }
}

impl PartialEq for ImageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHandle")
            .field("object", &self.inner.object)
            .field("state", &self.state())
            .finish()
    }
}

/// Exclusive borrow of a handle, cleared on drop.
pub(crate) struct BorrowGuard {
    handle: ImageHandle,
}

impl BorrowGuard {
    pub(crate) fn handle(&self) -> &ImageHandle {
        &self.handle
    }
}

impl Drop for BorrowGuard {
    fn drop(&mut self) {
        self.handle.inner.borrowed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/handle/image.rs"]
mod tests;
