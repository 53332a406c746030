use std::sync::Arc;

use image::imageops::FilterType;
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};

use crate::foundation::value::{Blob, NativeValue};
use crate::native::inprocess::InProcessLibrary;
use crate::native::inprocess::codec;
use crate::native::inprocess::raster::{ImageData, TAG_DOUBLE};
use crate::native::{NativeArgs, NativeFailure, NativeOutputs};

type OpResult = Result<NativeOutputs, NativeFailure>;

pub(crate) fn run(lib: &InProcessLibrary, operation: &str, args: &NativeArgs) -> OpResult {
    match operation {
        "black" => black(lib, args),
        "copy" => copy(lib, args),
        "invert" => invert(lib, args),
        "linear" => linear(lib, args),
        "resize" => resize(lib, args),
        "extract_area" => extract_area(lib, args),
        "embed" => embed(lib, args),
        "flip" => flip(lib, args),
        "avg" => avg(lib, args),
        "max" => max(lib, args),
        "getpoint" => getpoint(lib, args),
        "arrayjoin" => arrayjoin(lib, args),
        "pngload_buffer" => pngload_buffer(lib, args),
        "pngsave_buffer" => pngsave_buffer(lib, args),
        "pngload_source" => pngload_source(lib, args),
        "pngsave_target" => pngsave_target(lib, args),
        "affine" => affine(lib, args),
        "draw_rect" => draw_rect(lib, args),
        other => Err(NativeFailure::new(format!("class \"{other}\" not found"))),
    }
}

fn image_out(lib: &InProcessLibrary, img: ImageData) -> OpResult {
    Ok(NativeOutputs::new().with("out", NativeValue::Object(lib.insert(img))))
}

fn black(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let width = dim(args, "width")?;
    let height = dim(args, "height")?;
    let bands = opt_dim(args, "bands")?.unwrap_or(1);
    image_out(lib, ImageData::filled(width, height, bands, 0)?)
}

fn copy(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let mut out = image_arg(lib, args, "in")?;
    for name in ["xres", "yres"] {
        if let Some(res) = opt_double(args, name)? {
            out.set_field(name, TAG_DOUBLE.into(), NativeValue::Double(res))?;
        }
    }
    image_out(lib, out)
}

fn invert(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let pixels = img.pixels.iter().map(|v| 255 - v).collect();
    let out = img.derive(img.width, img.height, img.bands, pixels)?;
    image_out(lib, out)
}

fn linear(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let a = per_band(doubles_arg(args, "a")?, img.bands, "a")?;
    let b = per_band(doubles_arg(args, "b")?, img.bands, "b")?;
    let bands = img.bands as usize;
    let pixels = img
        .pixels
        .iter()
        .enumerate()
        .map(|(i, &v)| clamp_u8(a[i % bands] * f64::from(v) + b[i % bands]))
        .collect();
    let out = img.derive(img.width, img.height, img.bands, pixels)?;
    image_out(lib, out)
}

fn resize(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let hscale = opt_double(args, "scale")?.unwrap_or(1.0);
    let vscale = opt_double(args, "vscale")?.unwrap_or(hscale);
    if !(hscale.is_finite() && hscale > 0.0 && vscale.is_finite() && vscale > 0.0) {
        return Err(NativeFailure::new(format!(
            "resize: scale factors must be positive, got {hscale} x {vscale}"
        )));
    }
    let filter = match opt_enum(args, "kernel")?.unwrap_or(5) {
        0 => FilterType::Nearest,
        1 => FilterType::Triangle,
        2 | 3 => FilterType::CatmullRom,
        _ => FilterType::Lanczos3,
    };

    let width = scaled(img.width, hscale)?;
    let height = scaled(img.height, vscale)?;
    let pixels = match img.bands {
        1 => resample::<Luma<u8>>(&img, width, height, filter)?,
        2 => resample::<LumaA<u8>>(&img, width, height, filter)?,
        3 => resample::<Rgb<u8>>(&img, width, height, filter)?,
        _ => resample::<Rgba<u8>>(&img, width, height, filter)?,
    };
    let out = img.derive(width, height, img.bands, pixels)?;
    image_out(lib, out)
}

fn scaled(len: u32, scale: f64) -> Result<u32, NativeFailure> {
    let n = (f64::from(len) * scale).round().max(1.0);
    if n > f64::from(u32::MAX) {
        return Err(NativeFailure::new(format!(
            "resize: {len} x {scale} is too large"
        )));
    }
    Ok(n as u32)
}

fn resample<P>(
    img: &ImageData,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<Vec<u8>, NativeFailure>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let src = ImageBuffer::<P, Vec<u8>>::from_raw(img.width, img.height, img.pixels.to_vec())
        .ok_or_else(|| NativeFailure::new("resize: pixel buffer does not match header"))?;
    Ok(image::imageops::resize(&src, width, height, filter).into_raw())
}

fn extract_area(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "input")?;
    let left = dim_or_zero(args, "left")?;
    let top = dim_or_zero(args, "top")?;
    let width = dim(args, "width")?;
    let height = dim(args, "height")?;
    if u64::from(left) + u64::from(width) > u64::from(img.width)
        || u64::from(top) + u64::from(height) > u64::from(img.height)
    {
        return Err(NativeFailure::new(format!(
            "extract_area: bad extract area {width}x{height}+{left}+{top} for a {}x{} image",
            img.width, img.height
        )));
    }

    let row = width as usize * img.bands as usize;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for y in top..top + height {
        let start = img.index(left, y);
        pixels.extend_from_slice(&img.pixels[start..start + row]);
    }
    let out = img.derive(width, height, img.bands, pixels)?;
    image_out(lib, out)
}

fn embed(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let x = int_arg(args, "x")?;
    let y = int_arg(args, "y")?;
    let width = dim(args, "width")?;
    let height = dim(args, "height")?;
    let extend = opt_enum(args, "extend")?.unwrap_or(0);
    let bands = img.bands as usize;

    let fill = match extend {
        0 => Some(vec![0u8; bands]),
        4 => Some(vec![255u8; bands]),
        5 => {
            let bg = per_band(doubles_arg(args, "background")?, img.bands, "background")?;
            Some(bg.into_iter().map(clamp_u8).collect())
        }
        _ => None,
    };

    let (w, h) = (i64::from(img.width), i64::from(img.height));
    let mut pixels = Vec::with_capacity(width as usize * height as usize * bands);
    for oy in 0..i64::from(height) {
        for ox in 0..i64::from(width) {
            let (sx, sy) = (ox - x, oy - y);
            let inside = (0..w).contains(&sx) && (0..h).contains(&sy);
            let src = if inside {
                Some((sx, sy))
            } else {
                match extend {
                    1 => Some((sx.clamp(0, w - 1), sy.clamp(0, h - 1))),
                    2 => Some((sx.rem_euclid(w), sy.rem_euclid(h))),
                    3 => Some((mirror(sx, w), mirror(sy, h))),
                    _ => None,
                }
            };
            match (src, &fill) {
                (Some((sx, sy)), _) => {
                    pixels.extend_from_slice(img.pixel(sx as u32, sy as u32));
                }
                (None, Some(fill)) => pixels.extend_from_slice(fill),
                (None, None) => {
                    return Err(NativeFailure::new(format!(
                        "embed: unknown extend mode {extend}"
                    )));
                }
            }
        }
    }
    let out = img.derive(width, height, img.bands, pixels)?;
    image_out(lib, out)
}

fn mirror(i: i64, len: i64) -> i64 {
    let m = i.rem_euclid(2 * len);
    if m >= len { 2 * len - 1 - m } else { m }
}

fn flip(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let horizontal = match enum_arg(args, "direction")? {
        0 => true,
        1 => false,
        other => {
            return Err(NativeFailure::new(format!("flip: bad direction {other}")));
        }
    };

    let mut pixels = Vec::with_capacity(img.pixels.len());
    for y in 0..img.height {
        for x in 0..img.width {
            let (sx, sy) = if horizontal {
                (img.width - 1 - x, y)
            } else {
                (x, img.height - 1 - y)
            };
            pixels.extend_from_slice(img.pixel(sx, sy));
        }
    }
    let out = img.derive(img.width, img.height, img.bands, pixels)?;
    image_out(lib, out)
}

fn avg(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let sum: u64 = img.pixels.iter().map(|&v| u64::from(v)).sum();
    let mean = sum as f64 / img.pixels.len() as f64;
    Ok(NativeOutputs::new().with("out", NativeValue::Double(mean)))
}

fn max(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let bands = img.bands as usize;
    let (pos, value) = img
        .pixels
        .iter()
        .enumerate()
        .fold((0usize, 0u8), |best, (i, &v)| {
            if v > best.1 { (i, v) } else { best }
        });
    let px = pos / bands;
    let (x, y) = (px % img.width as usize, px / img.width as usize);
    Ok(NativeOutputs::new()
        .with("out", NativeValue::Double(f64::from(value)))
        .with("x", NativeValue::Int(x as i64))
        .with("y", NativeValue::Int(y as i64)))
}

// `unpack_complex` only affects complex formats, which 8-bit images never are.
fn getpoint(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let x = dim_or_zero(args, "x")?;
    let y = dim_or_zero(args, "y")?;
    if x >= img.width || y >= img.height {
        return Err(NativeFailure::new(format!(
            "getpoint: point ({x}, {y}) is outside a {}x{} image",
            img.width, img.height
        )));
    }
    let values = img.pixel(x, y).iter().map(|&v| f64::from(v)).collect();
    Ok(NativeOutputs::new().with("out-array", NativeValue::DoubleArray(values)))
}

fn arrayjoin(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let ids = match args.required("in")? {
        NativeValue::ImageArray(handles) => {
            handles.iter().map(|h| h.object_id()).collect::<Vec<_>>()
        }
        other => return Err(type_error("in", "image array", other)),
    };
    if let [only] = ids.as_slice() {
        let id = lib.retain(*only)?;
        return Ok(NativeOutputs::new().with("out", NativeValue::Object(id)));
    }

    let images = ids
        .iter()
        .map(|&id| lib.snapshot(id))
        .collect::<Result<Vec<_>, _>>()?;
    let first = images
        .first()
        .ok_or_else(|| NativeFailure::new("arrayjoin: no input images"))?;
    if let Some(odd) = images.iter().find(|i| i.bands != first.bands) {
        return Err(NativeFailure::new(format!(
            "arrayjoin: images must have the same number of bands ({} vs {})",
            first.bands, odd.bands
        )));
    }

    let across = opt_dim(args, "across")?.unwrap_or(1).min(images.len() as u32);
    let shim = opt_dim_or_zero(args, "shim")?;
    let background = match args.get("background") {
        Some(_) => per_band(doubles_arg(args, "background")?, first.bands, "background")?,
        None => vec![0.0; first.bands as usize],
    };

    let cell_w = images.iter().map(|i| i.width).max().unwrap_or(1);
    let cell_h = images.iter().map(|i| i.height).max().unwrap_or(1);
    let down = (images.len() as u32).div_ceil(across);
    let width = across * cell_w + (across - 1) * shim;
    let height = down * cell_h + (down - 1) * shim;

    let bands = first.bands as usize;
    let fill = background.into_iter().map(clamp_u8).collect::<Vec<_>>();
    let mut pixels = fill.repeat(width as usize * height as usize);
    for (n, img) in images.iter().enumerate() {
        let (col, row) = (n as u32 % across, n as u32 / across);
        let (ox, oy) = (col * (cell_w + shim), row * (cell_h + shim));
        let row_len = img.width as usize * bands;
        for y in 0..img.height {
            let src = img.index(0, y);
            let dst = ((oy + y) as usize * width as usize + ox as usize) * bands;
            pixels[dst..dst + row_len].copy_from_slice(&img.pixels[src..src + row_len]);
        }
    }
    let out = first.derive(width, height, first.bands, pixels)?;
    image_out(lib, out)
}

fn pngload_buffer(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let blob = match args.required("buffer")? {
        NativeValue::Blob(b) => b,
        other => return Err(type_error("buffer", "blob", other)),
    };
    let img = codec::decode_png(blob.as_bytes()).map_err(flatten)?;
    image_out(lib, img)
}

fn pngsave_buffer(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let compression = opt_int(args, "compression")?.unwrap_or(6);
    let bytes = codec::encode_png(&img, compression).map_err(flatten)?;
    Ok(NativeOutputs::new().with("buffer", NativeValue::Blob(Blob::new(bytes))))
}

fn pngload_source(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let source = match args.required("source")? {
        NativeValue::Source(s) => s,
        other => return Err(type_error("source", "source", other)),
    };
    let img = codec::decode_png(source.bytes()).map_err(flatten)?;
    image_out(lib, img)
}

fn pngsave_target(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let target = match args.required("target")? {
        NativeValue::Target(t) => t,
        other => return Err(type_error("target", "target", other)),
    };
    let compression = opt_int(args, "compression")?.unwrap_or(6);
    let bytes = codec::encode_png(&img, compression).map_err(flatten)?;
    target.write_all(&bytes);
    Ok(NativeOutputs::new())
}

/// Nearest-neighbour affine transform with matrix `[a, b, c, d]`, output sized to the bounding box
/// of the transformed input.
fn affine(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let img = image_arg(lib, args, "in")?;
    let [a, b, c, d] = match doubles_arg(args, "matrix")?.as_slice() {
        &[a, b, c, d] => [a, b, c, d],
        other => {
            return Err(NativeFailure::new(format!(
                "affine: matrix needs 4 elements, got {}",
                other.len()
            )));
        }
    };
    let det = a * d - b * c;
    if !det.is_finite() || det.abs() < 1e-12 {
        return Err(NativeFailure::new("affine: matrix is singular"));
    }

    let (w, h) = (f64::from(img.width), f64::from(img.height));
    let corners =
        [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)].map(|(x, y)| (a * x + b * y, c * x + d * y));
    let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let out_w = ((max_x - min_x).round() as u32).max(1);
    let out_h = ((max_y - min_y).round() as u32).max(1);

    let bands = img.bands as usize;
    let mut pixels = vec![0u8; out_w as usize * out_h as usize * bands];
    for oy in 0..out_h {
        for ox in 0..out_w {
            let (tx, ty) = (f64::from(ox) + min_x + 0.5, f64::from(oy) + min_y + 0.5);
            let sx = ((d * tx - b * ty) / det).floor();
            let sy = ((a * ty - c * tx) / det).floor();
            if sx < 0.0 || sy < 0.0 || sx >= w || sy >= h {
                continue;
            }
            let dst = (oy as usize * out_w as usize + ox as usize) * bands;
            pixels[dst..dst + bands].copy_from_slice(img.pixel(sx as u32, sy as u32));
        }
    }
    let out = img.derive(out_w, out_h, img.bands, pixels)?;
    image_out(lib, out)
}

fn draw_rect(lib: &InProcessLibrary, args: &NativeArgs) -> OpResult {
    let id = match args.required("image")? {
        NativeValue::Image(h) => h.object_id(),
        other => return Err(type_error("image", "image", other)),
    };
    let ink = doubles_arg(args, "ink")?;
    let (left, top) = (int_arg(args, "left")?, int_arg(args, "top")?);
    let (width, height) = (int_arg(args, "width")?, int_arg(args, "height")?);
    let fill = opt_bool(args, "fill")?.unwrap_or(false);

    let mut img = lib.snapshot(id)?;
    let ink = per_band(ink, img.bands, "ink")?
        .into_iter()
        .map(clamp_u8)
        .collect::<Vec<_>>();
    let (w, h) = (i64::from(img.width), i64::from(img.height));
    let (x0, y0) = (left.max(0), top.max(0));
    let (x1, y1) = ((left + width).min(w), (top + height).min(h));
    if x0 >= x1 || y0 >= y1 {
        return Ok(NativeOutputs::new());
    }

    // Paint a private copy; the table lock is only taken to swap it in.
    let bands = img.bands as usize;
    let stride = img.width as usize;
    let pixels = Arc::make_mut(&mut img.pixels);
    for y in y0..y1 {
        for x in x0..x1 {
            let edge = x == left || y == top || x == left + width - 1 || y == top + height - 1;
            if fill || edge {
                let i = (y as usize * stride + x as usize) * bands;
                pixels[i..i + bands].copy_from_slice(&ink);
            }
        }
    }
    lib.modify(id, |slot| {
        slot.pixels = img.pixels;
        Ok(())
    })?;
    Ok(NativeOutputs::new())
}

fn image_arg(
    lib: &InProcessLibrary,
    args: &NativeArgs,
    name: &str,
) -> Result<ImageData, NativeFailure> {
    match args.required(name)? {
        NativeValue::Image(h) => lib.snapshot(h.object_id()),
        NativeValue::Object(id) => lib.snapshot(*id),
        other => Err(type_error(name, "image", other)),
    }
}

fn int_arg(args: &NativeArgs, name: &str) -> Result<i64, NativeFailure> {
    match args.required(name)? {
        NativeValue::Int(i) => Ok(*i),
        other => Err(type_error(name, "int", other)),
    }
}

fn opt_int(args: &NativeArgs, name: &str) -> Result<Option<i64>, NativeFailure> {
    if args.contains(name) {
        int_arg(args, name).map(Some)
    } else {
        Ok(None)
    }
}

fn dim(args: &NativeArgs, name: &str) -> Result<u32, NativeFailure> {
    let v = int_arg(args, name)?;
    u32::try_from(v)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| {
            NativeFailure::new(format!("parameter '{name}' must be positive, got {v}"))
        })
}

fn opt_dim(args: &NativeArgs, name: &str) -> Result<Option<u32>, NativeFailure> {
    if args.contains(name) {
        dim(args, name).map(Some)
    } else {
        Ok(None)
    }
}

fn dim_or_zero(args: &NativeArgs, name: &str) -> Result<u32, NativeFailure> {
    let v = int_arg(args, name)?;
    u32::try_from(v).map_err(|_| {
        NativeFailure::new(format!("parameter '{name}' must not be negative, got {v}"))
    })
}

fn opt_dim_or_zero(args: &NativeArgs, name: &str) -> Result<u32, NativeFailure> {
    if args.contains(name) {
        dim_or_zero(args, name)
    } else {
        Ok(0)
    }
}

fn opt_double(args: &NativeArgs, name: &str) -> Result<Option<f64>, NativeFailure> {
    match args.get(name) {
        None => Ok(None),
        Some(NativeValue::Double(x)) => Ok(Some(*x)),
        Some(NativeValue::Int(i)) => Ok(Some(*i as f64)),
        Some(other) => Err(type_error(name, "double", other)),
    }
}

fn opt_bool(args: &NativeArgs, name: &str) -> Result<Option<bool>, NativeFailure> {
    match args.get(name) {
        None => Ok(None),
        Some(NativeValue::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(type_error(name, "bool", other)),
    }
}

fn enum_arg(args: &NativeArgs, name: &str) -> Result<i32, NativeFailure> {
    match args.required(name)? {
        NativeValue::Enum(v) => Ok(*v),
        other => Err(type_error(name, "enum", other)),
    }
}

fn opt_enum(args: &NativeArgs, name: &str) -> Result<Option<i32>, NativeFailure> {
    if args.contains(name) {
        enum_arg(args, name).map(Some)
    } else {
        Ok(None)
    }
}

fn doubles_arg(args: &NativeArgs, name: &str) -> Result<Vec<f64>, NativeFailure> {
    match args.required(name)? {
        NativeValue::DoubleArray(v) => Ok(v.clone()),
        other => Err(type_error(name, "double array", other)),
    }
}

/// Expand a one-element constant to every band, or check it has one element per band.
fn per_band(values: Vec<f64>, bands: u32, name: &str) -> Result<Vec<f64>, NativeFailure> {
    match values.len() {
        1 => Ok(vec![values[0]; bands as usize]),
        n if n == bands as usize => Ok(values),
        n => Err(NativeFailure::new(format!(
            "parameter '{name}' needs 1 or {bands} elements, got {n}"
        ))),
    }
}

fn clamp_u8(x: f64) -> u8 {
    x.round().clamp(0.0, 255.0) as u8
}

fn type_error(name: &str, expected: &str, found: &NativeValue) -> NativeFailure {
    NativeFailure::new(format!(
        "parameter '{name}' expects {expected}, got {}",
        found.kind_name()
    ))
}

fn flatten(err: anyhow::Error) -> NativeFailure {
    NativeFailure::new(format!("{err:#}"))
}
