use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::binding::call::CallBuilder;
use crate::binding::output::{OutputBundle, collect_outputs};
use crate::binding::pool::{PendingCall, WorkerPool};
use crate::binding::prepare::{PreparedCall, prepare};
use crate::config::RuntimeOpts;
use crate::foundation::error::{BindError, BindResult};
use crate::foundation::value::{ObjectId, Value};
use crate::handle::context::HandleContext;
use crate::handle::image::ImageHandle;
use crate::handle::transaction::MutableView;
use crate::introspect::descriptor::OperationDescriptor;
use crate::introspect::store::DescriptorStore;
use crate::native::NativeLibrary;
use crate::types::registry::{TypeRegistry, TypeRegistryBuilder};
use crate::types::variant::DefaultContext;

/// Generated calling surface over every introspected native operation.
///
/// Cheap to clone; clones share the descriptor store and the worker pool.
#[derive(Clone)]
pub struct Binder {
    shared: Arc<BinderShared>,
}

pub(crate) struct BinderShared {
    pub(crate) ctx: Arc<HandleContext>,
    pub(crate) store: Arc<DescriptorStore>,
    pub(crate) pool: WorkerPool,
    pub(crate) opts: RuntimeOpts,
}

impl Binder {
    /// Register the library's types, load its operations and start the worker pool.
    #[tracing::instrument(skip_all, fields(library = library.name()))]
    pub fn new(library: Arc<dyn NativeLibrary>, opts: RuntimeOpts) -> BindResult<Self> {
        opts.validate()?;

        let mut types = TypeRegistryBuilder::new();
        library.register_types(&mut types);
        let registry = types.build();

        let feed = library.introspect()?;
        let store = DescriptorStore::load(&feed, &registry)?;
        let pool = WorkerPool::new(&opts)?;

        tracing::info!(
            operations = store.len(),
            types = registry.len(),
            threads = pool.threads(),
            "binder ready"
        );

        Ok(Self {
            shared: Arc::new(BinderShared {
                ctx: Arc::new(HandleContext::new(library, registry)),
                store: Arc::new(store),
                pool,
                opts,
            }),
        })
    }

    pub fn store(&self) -> &DescriptorStore {
        &self.shared.store
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.shared.ctx.registry
    }

    pub fn opts(&self) -> &RuntimeOpts {
        &self.shared.opts
    }

    pub fn operation(&self, name: &str) -> BindResult<&OperationDescriptor> {
        self.shared
            .store
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| BindError::UnknownOperation(name.to_string()))
    }

    /// Calling convention of `name`, rendered from its parameters' static types.
    pub fn describe(&self, name: &str) -> BindResult<String> {
        self.operation(name).map(OperationDescriptor::signature)
    }

    /// Default the binding layer would send for an omitted optional input.
    ///
    /// Unlike [`invoke`](Self::invoke), which omits such parameters, this reports
    /// `UnsupportedDefault` when the variant has none.
    pub fn default_for(&self, operation: &str, param: &str) -> BindResult<Value> {
        let op = self.operation(operation)?;
        let p = op
            .optional_inputs()
            .find(|p| p.name == param)
            .ok_or_else(|| BindError::UnknownParameter {
                operation: operation.to_string(),
                parameter: param.to_string(),
            })?;
        p.variant.default(DefaultContext {
            operation,
            param: p,
        })
    }

    /// Run `name` and wait for its outputs.
    pub fn invoke(
        &self,
        name: &str,
        positional: &[Value],
        optional: &BTreeMap<String, Value>,
    ) -> BindResult<OutputBundle> {
        self.submit(name, positional, optional)?.wait()
    }

    /// Validate and cast on the calling thread, then queue the native call.
    ///
    /// Every error before the native call is returned here; nothing has been sent to the native
    /// library in that case.
    #[tracing::instrument(skip(self, positional, optional), fields(positional = positional.len()))]
    pub fn submit(
        &self,
        name: &str,
        positional: &[Value],
        optional: &BTreeMap<String, Value>,
    ) -> BindResult<PendingCall<OutputBundle>> {
        let shared = &self.shared;
        let prepared = prepare(&shared.store, &shared.ctx, name, positional, optional, None)?;
        Ok(self.dispatch(prepared))
    }

    pub(crate) fn dispatch(&self, prepared: PreparedCall) -> PendingCall<OutputBundle> {
        self.shared.dispatch(prepared)
    }

    /// Builder-style call: `binder.call("resize").arg(&img).opt("vscale", 0.5).invoke()`.
    pub fn call<'a>(&'a self, name: &'a str) -> CallBuilder<'a> {
        CallBuilder::new(self, name)
    }

    /// Open a mutation transaction on `handle`.
    #[tracing::instrument(skip(self), fields(object = %handle.object_id()))]
    pub fn transaction(&self, handle: &ImageHandle) -> BindResult<MutableView> {
        MutableView::open(self.shared.clone(), handle)
    }

    /// Run `body` inside a transaction: commit on `Ok`, abort on `Err`.
    pub fn mutate<F>(&self, handle: &ImageHandle, body: F) -> BindResult<ImageHandle>
    where
        F: FnOnce(&mut MutableView) -> BindResult<()>,
    {
        let mut view = self.transaction(handle)?;
        match body(&mut view) {
            Ok(()) => view.commit(),
            Err(e) => {
                view.abort();
                Err(e)
            }
        }
    }

    /// Wrap an object reference produced outside [`invoke`](Self::invoke), taking ownership of it.
    pub fn adopt(&self, object: ObjectId) -> ImageHandle {
        ImageHandle::adopt(self.shared.ctx.clone(), object)
    }

    /// Native calls admitted to the pool and not yet finished.
    pub fn calls_in_flight(&self) -> usize {
        self.shared.pool.in_flight()
    }
}

impl BinderShared {
    pub(crate) fn dispatch(&self, prepared: PreparedCall) -> PendingCall<OutputBundle> {
        let ctx = self.ctx.clone();
        self.pool.submit(move || {
            let PreparedCall { op, args } = prepared;
            tracing::debug!(operation = op.name(), args = args.len(), "native call");
            let outputs = ctx.library.call(op.name(), &args)?;
            collect_outputs(&op, outputs, &ctx)
        })
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("context", &self.shared.ctx)
            .field("operations", &self.shared.store.len())
            .field("threads", &self.shared.pool.threads())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/binding/binder.rs"]
mod tests;
