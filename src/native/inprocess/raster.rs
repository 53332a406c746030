use std::collections::BTreeMap;
use std::sync::Arc;

use crate::foundation::value::{NativeValue, TypeTag};
use crate::native::NativeFailure;

pub(crate) const TAG_INT: &str = "gint";
pub(crate) const TAG_DOUBLE: &str = "gdouble";

const READ_ONLY: [&str; 3] = ["width", "height", "bands"];
const RESOLUTION: [&str; 2] = ["xres", "yres"];

/// 8-bit interleaved image with 1 to 4 bands.
///
/// Pixels sit behind an `Arc` so duplicates share them until one side writes.
#[derive(Clone, Debug)]
pub(crate) struct ImageData {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) bands: u32,
    pub(crate) pixels: Arc<Vec<u8>>,
    pub(crate) xres: f64,
    pub(crate) yres: f64,
    meta: BTreeMap<String, (TypeTag, NativeValue)>,
}

impl ImageData {
    pub(crate) fn new(
        width: u32,
        height: u32,
        bands: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, NativeFailure> {
        if width == 0 || height == 0 {
            return Err(NativeFailure::new(format!(
                "image dimensions must be non-zero, got {width}x{height}"
            )));
        }
        if !(1..=4).contains(&bands) {
            return Err(NativeFailure::new(format!(
                "images have 1 to 4 bands, got {bands}"
            )));
        }
        let expected = width as usize * height as usize * bands as usize;
        if pixels.len() != expected {
            return Err(NativeFailure::new(format!(
                "pixel buffer holds {} bytes, {width}x{height}x{bands} needs {expected}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            bands,
            pixels: Arc::new(pixels),
            xres: 1.0,
            yres: 1.0,
            meta: BTreeMap::new(),
        })
    }

    pub(crate) fn filled(
        width: u32,
        height: u32,
        bands: u32,
        value: u8,
    ) -> Result<Self, NativeFailure> {
        let len = width as usize * height as usize * bands as usize;
        Self::new(width, height, bands, vec![value; len])
    }

    /// New image with the same header and metadata but different pixels.
    pub(crate) fn derive(
        &self,
        width: u32,
        height: u32,
        bands: u32,
        pixels: Vec<u8>,
    ) -> Result<Self, NativeFailure> {
        let mut out = Self::new(width, height, bands, pixels)?;
        out.xres = self.xres;
        out.yres = self.yres;
        out.meta = self.meta.clone();
        Ok(out)
    }

    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.bands as usize
    }

    pub(crate) fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let i = self.index(x, y);
        &self.pixels[i..i + self.bands as usize]
    }

    pub(crate) fn field(&self, name: &str) -> Option<(TypeTag, NativeValue)> {
        let int = |v: u32| Some((TypeTag::from(TAG_INT), NativeValue::Int(v.into())));
        match name {
            "width" => int(self.width),
            "height" => int(self.height),
            "bands" => int(self.bands),
            "xres" => Some((TypeTag::from(TAG_DOUBLE), NativeValue::Double(self.xres))),
            "yres" => Some((TypeTag::from(TAG_DOUBLE), NativeValue::Double(self.yres))),
            _ => self.meta.get(name).cloned(),
        }
    }

    pub(crate) fn field_names(&self) -> Vec<String> {
        READ_ONLY
            .iter()
            .chain(RESOLUTION.iter())
            .map(|s| s.to_string())
            .chain(self.meta.keys().cloned())
            .collect()
    }

    pub(crate) fn set_field(
        &mut self,
        name: &str,
        tag: TypeTag,
        value: NativeValue,
    ) -> Result<(), NativeFailure> {
        if READ_ONLY.contains(&name) {
            return Err(NativeFailure::new(format!("field '{name}' is read-only")));
        }
        if RESOLUTION.contains(&name) {
            let res = match value {
                NativeValue::Double(x) => x,
                NativeValue::Int(i) => i as f64,
                other => {
                    return Err(NativeFailure::new(format!(
                        "field '{name}' holds a double, not {}",
                        other.kind_name()
                    )));
                }
            };
            if !res.is_finite() || res <= 0.0 {
                return Err(NativeFailure::new(format!(
                    "field '{name}' must be positive, got {res}"
                )));
            }
            if name == "xres" {
                self.xres = res;
            } else {
                self.yres = res;
            }
            return Ok(());
        }

        match value {
            NativeValue::Image(_)
            | NativeValue::ImageArray(_)
            | NativeValue::Object(_)
            | NativeValue::ObjectArray(_)
            | NativeValue::Source(_)
            | NativeValue::Target(_) => Err(NativeFailure::new(format!(
                "cannot store {} in metadata field '{name}'",
                value.kind_name()
            ))),
            value => {
                self.meta.insert(name.to_string(), (tag, value));
                Ok(())
            }
        }
    }

    pub(crate) fn remove_field(&mut self, name: &str) -> Result<bool, NativeFailure> {
        if READ_ONLY.contains(&name) || RESOLUTION.contains(&name) {
            return Err(NativeFailure::new(format!(
                "header field '{name}' cannot be removed"
            )));
        }
        Ok(self.meta.remove(name).is_some())
    }
}
