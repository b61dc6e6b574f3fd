//! Frame sinks. The framebuffer mirror copies every rendered frame into a
//! memory-mapped Linux framebuffer so off-screen rendering shows up on
//! hardware without a compositor.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use image::RgbaImage;
use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, info, warn};

use crate::config::FramebufferConfig;

/// Receives each fully rasterized frame, once per transition step.
pub trait FrameSink {
    fn present(&mut self, frame: &RgbaImage) -> Result<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        (**self).present(frame)
    }
}

/// Sink used when no framebuffer device is present.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &RgbaImage) -> Result<()> {
        Ok(())
    }
}

/// Native pixel encodings supported by the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 32 bpp, little-endian XRGB: bytes B, G, R, X.
    Xrgb8888,
    /// 24 bpp, bytes B, G, R.
    Bgr888,
    /// 16 bpp RGB565, little-endian.
    Rgb565,
}

impl PixelLayout {
    pub fn from_bits_per_pixel(bpp: u32) -> Option<Self> {
        match bpp {
            32 => Some(Self::Xrgb8888),
            24 => Some(Self::Bgr888),
            16 => Some(Self::Rgb565),
            _ => None,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Xrgb8888 => 4,
            Self::Bgr888 => 3,
            Self::Rgb565 => 2,
        }
    }
}

/// Convert one row of RGBA8 pixels into the device encoding.
///
/// Converts as many pixels as fit in both slices; the rest of `dst` is left alone.
pub fn encode_row(src: &[u8], dst: &mut [u8], layout: PixelLayout) {
    let pixels = src.chunks_exact(4);
    match layout {
        PixelLayout::Xrgb8888 => {
            for (s, d) in pixels.zip(dst.chunks_exact_mut(4)) {
                d[0] = s[2];
                d[1] = s[1];
                d[2] = s[0];
                d[3] = 0xFF;
            }
        }
        PixelLayout::Bgr888 => {
            for (s, d) in pixels.zip(dst.chunks_exact_mut(3)) {
                d[0] = s[2];
                d[1] = s[1];
                d[2] = s[0];
            }
        }
        PixelLayout::Rgb565 => {
            for (s, d) in pixels.zip(dst.chunks_exact_mut(2)) {
                let mut rgb565: u16 = (u16::from(s[0]) & 0b1111_1000) << 8;
                rgb565 |= (u16::from(s[1]) & 0b1111_1100) << 3;
                rgb565 |= u16::from(s[2]) >> 3;
                d.copy_from_slice(&rgb565.to_le_bytes());
            }
        }
    }
}

/// Pixel geometry of a framebuffer device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FbGeometry {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including any padding.
    pub stride: usize,
    pub layout: PixelLayout,
}

impl FbGeometry {
    /// Read `bits_per_pixel`, `stride` and `virtual_size` from a sysfs
    /// directory such as `/sys/class/graphics/fb0`.
    pub fn read_sysfs(dir: &Path) -> Result<Self> {
        let bpp: u32 = read_sysfs_value(dir, "bits_per_pixel")?
            .parse()
            .context("bits_per_pixel is not a number")?;
        let stride: usize = read_sysfs_value(dir, "stride")?
            .parse()
            .context("stride is not a number")?;
        let (width, height) = read_virtual_size(dir)?;
        let Some(layout) = PixelLayout::from_bits_per_pixel(bpp) else {
            bail!("unsupported framebuffer depth: {bpp} bpp");
        };
        ensure!(
            stride >= width as usize * layout.bytes_per_pixel(),
            "framebuffer stride {stride} is shorter than a {width}px row"
        );
        Ok(Self {
            width,
            height,
            stride,
            layout,
        })
    }

    pub fn mapped_len(&self) -> usize {
        self.stride * self.height as usize
    }
}

fn read_sysfs_value(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw.trim().to_owned())
}

/// Parse `virtual_size`, formatted as `width,height`.
pub fn read_virtual_size(dir: &Path) -> Result<(u32, u32)> {
    let raw = read_sysfs_value(dir, "virtual_size")?;
    let (w, h) = raw
        .split_once(',')
        .with_context(|| format!("malformed virtual_size '{raw}'"))?;
    let w: u32 = w.trim().parse().context("virtual_size width")?;
    let h: u32 = h.trim().parse().context("virtual_size height")?;
    ensure!(w > 0 && h > 0, "virtual_size must be non-zero");
    Ok((w, h))
}

/// Render size: the device's virtual size when readable, else the configured fallback.
pub fn display_size(cfg: &FramebufferConfig) -> (u32, u32) {
    match read_virtual_size(&cfg.sysfs) {
        Ok(size) => size,
        Err(err) => {
            debug!("no framebuffer geometry ({err:#}); using fallback size");
            let [w, h] = cfg.fallback_size;
            (w, h)
        }
    }
}

/// Memory-mapped view of a framebuffer device. Write-only: nothing is read back.
#[derive(Debug)]
pub struct FramebufferMirror {
    device: PathBuf,
    geometry: FbGeometry,
    map: MmapMut,
}

impl FramebufferMirror {
    pub fn open(device: &Path, geometry: FbGeometry) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .with_context(|| format!("failed to open {}", device.display()))?;
        let len = geometry.mapped_len();
        let meta = file.metadata()?;
        // Device nodes report a zero length; plain files must be large enough to map.
        if meta.is_file() {
            ensure!(
                meta.len() as usize >= len,
                "{} is smaller than the {len} bytes the geometry requires",
                device.display()
            );
        }
        // SAFETY: the mapping is owned by this mirror and only written through `present`.
        let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }
            .with_context(|| format!("failed to map {}", device.display()))?;
        Ok(Self {
            device: device.to_path_buf(),
            geometry,
            map,
        })
    }

    /// Open the configured device if it exists. Absence is normal (headless runs);
    /// any other failure is logged and the mirror stays off.
    pub fn detect(cfg: &FramebufferConfig) -> Option<Self> {
        if !cfg.device.exists() {
            info!(device = %cfg.device.display(), "no framebuffer device; rendering off-screen only");
            return None;
        }
        let opened = FbGeometry::read_sysfs(&cfg.sysfs)
            .and_then(|geometry| Self::open(&cfg.device, geometry));
        match opened {
            Ok(mirror) => {
                let g = mirror.geometry;
                info!(
                    device = %cfg.device.display(),
                    width = g.width,
                    height = g.height,
                    stride = g.stride,
                    layout = ?g.layout,
                    "framebuffer mirror active"
                );
                Some(mirror)
            }
            Err(err) => {
                warn!(device = %cfg.device.display(), "framebuffer mirror unavailable: {err:#}");
                None
            }
        }
    }

    pub fn geometry(&self) -> FbGeometry {
        self.geometry
    }
}

impl FrameSink for FramebufferMirror {
    fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        let g = self.geometry;
        let rows = g.height.min(frame.height()) as usize;
        let src_stride = frame.width() as usize * 4;
        let row_bytes = g.width as usize * g.layout.bytes_per_pixel();
        let raw = frame.as_raw();
        for y in 0..rows {
            let src = &raw[y * src_stride..(y + 1) * src_stride];
            let start = y * g.stride;
            encode_row(src, &mut self.map[start..start + row_bytes], g.layout);
        }
        Ok(())
    }
}

impl Drop for FramebufferMirror {
    fn drop(&mut self) {
        debug!(device = %self.device.display(), "releasing framebuffer mapping");
    }
}
