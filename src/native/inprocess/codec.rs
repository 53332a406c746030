use std::io::Cursor;

use anyhow::Context;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use crate::native::inprocess::raster::ImageData;

pub(crate) fn decode_png(bytes: &[u8]) -> anyhow::Result<ImageData> {
    let dyn_img = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
        .context("decode png from memory")?;
    let (width, height) = (dyn_img.width(), dyn_img.height());
    let (bands, pixels) = match dyn_img.color().channel_count() {
        1 => (1, dyn_img.to_luma8().into_raw()),
        2 => (2, dyn_img.to_luma_alpha8().into_raw()),
        3 => (3, dyn_img.to_rgb8().into_raw()),
        _ => (4, dyn_img.to_rgba8().into_raw()),
    };
    ImageData::new(width, height, bands, pixels).context("build image from decoded png")
}

/// `compression` follows zlib levels 0..=9.
pub(crate) fn encode_png(img: &ImageData, compression: i64) -> anyhow::Result<Vec<u8>> {
    let color = match img.bands {
        1 => ExtendedColorType::L8,
        2 => ExtendedColorType::La8,
        3 => ExtendedColorType::Rgb8,
        4 => ExtendedColorType::Rgba8,
        n => anyhow::bail!("cannot encode a {n}-band image as png"),
    };
    let level = match compression {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    };

    let mut out = Cursor::new(Vec::new());
    PngEncoder::new_with_quality(&mut out, level, FilterType::Adaptive)
        .write_image(&img.pixels, img.width, img.height, color)
        .with_context(|| format!("encode {}x{} png", img.width, img.height))?;
    Ok(out.into_inner())
}
