//! Decodes image files and scales them to fit the display.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;
use tracing::debug;

use crate::processing::layout::fit_within;
use crate::render::surface::resize_rgba;

// Decodes an image to RGBA8 and applies EXIF orientation if available.
// Orientation handling is best-effort; without metadata the pixels are kept as stored.
fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()? // sniff based on content, not just the extension
        .decode()?;

    let mut img = img.to_rgba8();

    let orientation: u16 = read_orientation(path).unwrap_or(1);
    match orientation {
        2 => img = image::imageops::flip_horizontal(&img),
        3 => img = image::imageops::rotate180(&img),
        4 => img = image::imageops::flip_vertical(&img),
        5 => {
            img = image::imageops::rotate90(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        6 => img = image::imageops::rotate90(&img),
        7 => {
            img = image::imageops::rotate270(&img);
            img = image::imageops::flip_horizontal(&img);
        }
        8 => img = image::imageops::rotate270(&img),
        _ => {}
    }

    Ok(img)
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = field.value.get_uint(0)? as u16;
    debug!(orientation = o, path = %path.display(), "exif orientation");
    Some(o)
}

/// Decode `path` and scale it to the largest size that fits `width` x `height`
/// with its aspect ratio preserved.
pub fn load_fitted(path: &Path, width: u32, height: u32) -> Result<RgbaImage> {
    let decoded = decode_rgba8_apply_exif(path)
        .with_context(|| format!("failed to decode {}", path.display()))?;
    let (w, h) = fit_within(width, height, decoded.width(), decoded.height());
    resize_rgba(&decoded, w, h, fir::FilterType::CatmullRom)
        .with_context(|| format!("failed to scale {} to {w}x{h}", path.display()))
}
