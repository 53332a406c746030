//! Pure-Rust stand-in for a native image library.
//!
//! Objects live in a reference-counted table keyed by [`ObjectId`]. Pixel buffers are shared
//! between duplicates and copied on first write, so transactions behave the way they would over a
//! real copy-on-write native library. Operations are backed by the `image` crate.

mod codec;
mod ops;
mod raster;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::error::BindResult;
use crate::foundation::value::{NativeValue, ObjectId, TypeTag};
use crate::handle::image::ImageHandle;
use crate::introspect::feed::IntrospectionFeed;
use crate::native::{NativeArgs, NativeFailure, NativeLibrary, NativeOutputs};
use crate::types::registry::TypeRegistryBuilder;
use crate::types::variant::{ScalarKind, TypeVariant};

use self::raster::ImageData;

const FEED: &str = include_str!("operations.json");

/// Counters describing what the library has done so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NativeStats {
    /// Operation calls that reached the library.
    pub calls: u64,
    /// References returned through `release`.
    pub releases: u64,
    pub live_objects: usize,
    /// Releases of ids the library did not know. Always zero unless a reference was
    /// double-released.
    pub invalid_releases: u64,
}

struct Slot {
    image: ImageData,
    refs: usize,
}

#[derive(Default)]
pub struct InProcessLibrary {
    objects: Mutex<HashMap<ObjectId, Slot>>,
    next_id: AtomicU64,
    calls: AtomicU64,
    releases: AtomicU64,
    invalid_releases: AtomicU64,
}

impl InProcessLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn stats(&self) -> NativeStats {
        NativeStats {
            calls: self.calls.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            live_objects: self.live_objects(),
            invalid_releases: self.invalid_releases.load(Ordering::Relaxed),
        }
    }

    pub fn live_objects(&self) -> usize {
        self.table().len()
    }

    /// Whether two images still share one pixel buffer.
    pub fn shares_pixels(&self, a: &ImageHandle, b: &ImageHandle) -> bool {
        let table = self.table();
        match (table.get(&a.object_id()), table.get(&b.object_id())) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a.image.pixels, &b.image.pixels),
            _ => false,
        }
    }

    /// Raw interleaved pixels of a live object.
    pub fn pixels(&self, image: &ImageHandle) -> Option<Arc<Vec<u8>>> {
        self.table()
            .get(&image.object_id())
            .map(|slot| slot.image.pixels.clone())
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ObjectId, Slot>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, image: ImageData) -> ObjectId {
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.table().insert(id, Slot { image, refs: 1 });
        id
    }

    /// Add a reference to an existing object and hand it out again.
    pub(crate) fn retain(&self, id: ObjectId) -> Result<ObjectId, NativeFailure> {
        let mut table = self.table();
        let slot = table.get_mut(&id).ok_or_else(|| unknown(id))?;
        slot.refs += 1;
        Ok(id)
    }

    /// Header, metadata and a shared reference to the pixels of `id`.
    pub(crate) fn snapshot(&self, id: ObjectId) -> Result<ImageData, NativeFailure> {
        self.table()
            .get(&id)
            .map(|slot| slot.image.clone())
            .ok_or_else(|| unknown(id))
    }

    pub(crate) fn modify<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&mut ImageData) -> Result<R, NativeFailure>,
    ) -> Result<R, NativeFailure> {
        let mut table = self.table();
        let slot = table.get_mut(&id).ok_or_else(|| unknown(id))?;
        f(&mut slot.image)
    }
}

fn unknown(id: ObjectId) -> NativeFailure {
    NativeFailure::new(format!("no live object {id}"))
}

impl NativeLibrary for InProcessLibrary {
    fn name(&self) -> &str {
        "inprocess"
    }

    fn register_types(&self, registry: &mut TypeRegistryBuilder) {
        registry
            .register("VipsImage", TypeVariant::Image)
            .register("VipsArrayImage", TypeVariant::ImageArray)
            .register("VipsArrayDouble", TypeVariant::DoubleArray)
            .register("VipsArrayInt", TypeVariant::IntArray)
            .register("VipsBlob", TypeVariant::Blob)
            .register("VipsSource", TypeVariant::Source)
            .register("VipsTarget", TypeVariant::Target)
            .register("gboolean", TypeVariant::Scalar(ScalarKind::Bool))
            .register(raster::TAG_INT, TypeVariant::Scalar(ScalarKind::Int))
            .register(raster::TAG_DOUBLE, TypeVariant::Scalar(ScalarKind::Double))
            .register("gchararray", TypeVariant::Scalar(ScalarKind::Str))
            .register_enum(
                "VipsKernel",
                &[
                    ("nearest", 0),
                    ("linear", 1),
                    ("cubic", 2),
                    ("mitchell", 3),
                    ("lanczos2", 4),
                    ("lanczos3", 5),
                ],
            )
            .register_enum("VipsDirection", &[("horizontal", 0), ("vertical", 1)])
            .register_enum(
                "VipsExtend",
                &[
                    ("black", 0),
                    ("copy", 1),
                    ("repeat", 2),
                    ("mirror", 3),
                    ("white", 4),
                    ("background", 5),
                ],
            );
    }

    fn introspect(&self) -> BindResult<IntrospectionFeed> {
        IntrospectionFeed::from_json(FEED)
    }

    fn call(&self, operation: &str, args: &NativeArgs) -> Result<NativeOutputs, NativeFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        ops::run(self, operation, args)
    }

    fn duplicate(&self, object: ObjectId) -> Result<ObjectId, NativeFailure> {
        let image = self.snapshot(object)?;
        Ok(self.insert(image))
    }

    fn field(&self, object: ObjectId, name: &str) -> Option<(TypeTag, NativeValue)> {
        self.table().get(&object)?.image.field(name)
    }

    fn field_names(&self, object: ObjectId) -> Vec<String> {
        self.table()
            .get(&object)
            .map(|slot| slot.image.field_names())
            .unwrap_or_default()
    }

    fn set_field(
        &self,
        object: ObjectId,
        name: &str,
        tag: TypeTag,
        value: NativeValue,
    ) -> Result<(), NativeFailure> {
        self.modify(object, |img| img.set_field(name, tag, value))
    }

    fn remove_field(&self, object: ObjectId, name: &str) -> Result<bool, NativeFailure> {
        self.modify(object, |img| img.remove_field(name))
    }

    fn release(&self, object: ObjectId) {
        let mut table = self.table();
        match table.get_mut(&object) {
            Some(slot) => {
                slot.refs -= 1;
                if slot.refs == 0 {
                    table.remove(&object);
                }
            }
            None => {
                self.invalid_releases.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%object, "release of unknown object");
                return;
            }
        }
        self.releases.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "../../../tests/unit/native/inprocess.rs"]
mod tests;
