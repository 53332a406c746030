use std::fmt;
use std::sync::Arc;

use crate::native::NativeLibrary;
use crate::types::registry::TypeRegistry;

/// What a handle needs to outlive its creator: the library that owns the object and the registry
/// used to read its fields back.
pub(crate) struct HandleContext {
    pub(crate) library: Arc<dyn NativeLibrary>,
    pub(crate) registry: TypeRegistry,
}

impl HandleContext {
    pub(crate) fn new(library: Arc<dyn NativeLibrary>, registry: TypeRegistry) -> Self {
        Self { library, registry }
    }

    /// Whether both contexts talk to the same library instance.
    pub(crate) fn same_library(&self, other: &HandleContext) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.library), Arc::as_ptr(&other.library))
    }
}

impl fmt::Debug for HandleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleContext")
            .field("library", &self.library.name())
            .field("types", &self.registry.len())
            .finish()
    }
}
