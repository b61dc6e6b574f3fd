//! The single off-screen frame that holds "what is currently shown", plus
//! the opaque RGBA compositing primitives the transitions are built from.

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::{Rgba, RgbaImage};

use crate::processing::layout::center_offset;

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Clip to a `width` x `height` area anchored at the origin.
    pub fn clipped(self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let w = self.w.min(width - x);
        let h = self.h.min(height - y);
        Self { x, y, w, h }
    }

    pub const fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

#[derive(Debug, Clone)]
pub struct RenderSurface {
    frame: RgbaImage,
}

impl RenderSurface {
    pub fn new(width: u32, height: u32, fill: Rgba<u8>) -> Self {
        Self {
            frame: RgbaImage::from_pixel(width.max(1), height.max(1), fill),
        }
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// Copy of the current contents, used as the start frame of a transition.
    pub fn snapshot(&self) -> RgbaImage {
        self.frame.clone()
    }

    pub fn fill(&mut self, color: Rgba<u8>) {
        for px in self.frame.pixels_mut() {
            *px = color;
        }
    }

    /// Replace the whole surface with `src`, which must match its size.
    pub fn copy_from(&mut self, src: &RgbaImage) {
        debug_assert_eq!(src.dimensions(), self.frame.dimensions());
        let dst: &mut [u8] = &mut self.frame;
        dst.copy_from_slice(src.as_raw());
    }

    /// Copy `rect` of a same-sized `src` onto the same place of the surface.
    pub fn copy_region(&mut self, src: &RgbaImage, rect: Rect) {
        let (width, height) = self.frame.dimensions();
        let rect = rect.clipped(width.min(src.width()), height.min(src.height()));
        if rect.is_empty() {
            return;
        }
        let dst_stride = width as usize * 4;
        let src_stride = src.width() as usize * 4;
        let span = rect.w as usize * 4;
        let src_raw = src.as_raw();
        let dst: &mut [u8] = &mut self.frame;
        for row in rect.y..rect.y + rect.h {
            let d = row as usize * dst_stride + rect.x as usize * 4;
            let s = row as usize * src_stride + rect.x as usize * 4;
            dst[d..d + span].copy_from_slice(&src_raw[s..s + span]);
        }
    }

    /// Draw `src` with its top-left corner at `(x, y)`; anything outside is clipped.
    pub fn blit(&mut self, src: &RgbaImage, x: i64, y: i64) {
        let (width, height) = self.frame.dimensions();
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + i64::from(src.width())).min(i64::from(width));
        let y1 = (y + i64::from(src.height())).min(i64::from(height));
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let dst_stride = width as usize * 4;
        let src_stride = src.width() as usize * 4;
        let span = (x1 - x0) as usize * 4;
        let sx = (x0 - x) as usize;
        let src_raw = src.as_raw();
        let dst: &mut [u8] = &mut self.frame;
        for row in y0..y1 {
            let sy = (row - y) as usize;
            let s = sy * src_stride + sx * 4;
            let d = row as usize * dst_stride + x0 as usize * 4;
            dst[d..d + span].copy_from_slice(&src_raw[s..s + span]);
        }
    }

    /// Write `old * (1 - alpha) + new * alpha` into the surface.
    ///
    /// `alpha == 255` reproduces `new` exactly.
    pub fn blend(&mut self, old: &RgbaImage, new: &RgbaImage, alpha: u8) {
        let a = u32::from(alpha);
        let inv = 255 - a;
        let dst: &mut [u8] = &mut self.frame;
        for ((d, o), n) in dst.iter_mut().zip(old.as_raw()).zip(new.as_raw()) {
            *d = ((u32::from(*o) * inv + u32::from(*n) * a + 127) / 255) as u8;
        }
    }
}

/// Center `image` on a `width` x `height` canvas filled with `background`.
pub fn compose_centered(
    image: &RgbaImage,
    width: u32,
    height: u32,
    background: Rgba<u8>,
) -> RgbaImage {
    let mut canvas = RenderSurface::new(width, height, background);
    let (ox, oy) = center_offset(image.width(), image.height(), width, height);
    canvas.blit(&flatten_over(image, background), i64::from(ox), i64::from(oy));
    canvas.frame
}

/// Composite `image` over an opaque `background`; the result is fully opaque.
pub fn flatten_over(image: &RgbaImage, background: Rgba<u8>) -> RgbaImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        let a = u32::from(px[3]);
        if a == 255 {
            continue;
        }
        let inv = 255 - a;
        for c in 0..3 {
            px[c] = ((u32::from(px[c]) * a + u32::from(background[c]) * inv + 127) / 255) as u8;
        }
        px[3] = 255;
    }
    out
}

/// Resize an RGBA buffer with `fast_image_resize`.
pub fn resize_rgba(
    source: &RgbaImage,
    target_w: u32,
    target_h: u32,
    filter: fir::FilterType,
) -> Result<RgbaImage> {
    if target_w == 0 || target_h == 0 {
        anyhow::bail!("resize dimensions must be positive");
    }
    if source.width() == target_w && source.height() == target_h {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(filter));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("resize failed")?;
    let buffer = dst_image.into_vec();
    RgbaImage::from_raw(target_w, target_h, buffer)
        .ok_or_else(|| anyhow::anyhow!("failed to construct resized RGBA image"))
}
