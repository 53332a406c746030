//! pixbind binds Rust to a reference-counted native image library.
//!
//! The native library describes its operations through introspection; pixbind turns that
//! description into a checked calling convention and manages the lifetime of the images it hands
//! back:
//!
//! - [`Binder`] validates, casts and runs operations on a bounded worker pool
//! - [`ImageHandle`] shares one native reference and releases it exactly once
//! - [`MutableView`] is a copy-on-write transaction that commits into a new handle
//!
//! [`InProcessLibrary`] is a pure-Rust implementation of [`NativeLibrary`] for tests and for
//! embedding without a native dependency.
#![forbid(unsafe_code)]

mod foundation;

pub(crate) mod binding;
mod config;
pub(crate) mod handle;
pub(crate) mod introspect;
pub(crate) mod native;
pub(crate) mod types;

use std::sync::{Arc, OnceLock};

pub use crate::binding::binder::Binder;
pub use crate::binding::call::CallBuilder;
pub use crate::binding::output::OutputBundle;
pub use crate::binding::pool::PendingCall;
pub use crate::config::RuntimeOpts;
pub use crate::foundation::error::{BindError, BindResult};
pub use crate::foundation::value::{
    Blob, NativeValue, ObjectId, Source, Target, TypeTag, Value, ValueKind,
};
pub use crate::handle::image::{HandleState, ImageHandle};
pub use crate::handle::transaction::{MutableView, ViewState};
pub use crate::introspect::descriptor::{Bounds, Direction, OperationDescriptor, ParamDescriptor};
pub use crate::introspect::feed::{IntrospectionFeed, RawOperation, RawParam};
pub use crate::introspect::store::DescriptorStore;
pub use crate::native::inprocess::{InProcessLibrary, NativeStats};
pub use crate::native::{NativeArgs, NativeFailure, NativeLibrary, NativeOutputs};
pub use crate::types::registry::{TypeRegistry, TypeRegistryBuilder};
pub use crate::types::typespec::StaticType;
pub use crate::types::variant::{DefaultContext, EnumSpec, ScalarKind, TypeVariant};

static GLOBAL: OnceLock<Binder> = OnceLock::new();

/// Build the process-wide [`Binder`] over `library`.
///
/// Runs once per process. Later calls fail with [`BindError::Validation`] and leave the installed
/// binder untouched.
pub fn init(library: Arc<dyn NativeLibrary>, opts: RuntimeOpts) -> BindResult<&'static Binder> {
    if GLOBAL.get().is_some() {
        return Err(BindError::validation("pixbind is already initialized"));
    }
    let binder = Binder::new(library, opts)?;
    let mut fresh = false;
    let installed = GLOBAL.get_or_init(|| {
        fresh = true;
        binder
    });
    if !fresh {
        return Err(BindError::validation("pixbind is already initialized"));
    }
    Ok(installed)
}

/// The binder installed by [`init`], if any.
pub fn global() -> Option<&'static Binder> {
    GLOBAL.get()
}
