//! Pixel-level animations between the frame currently on the render surface
//! and the next image.
//!
//! Every kind runs `max(1, duration_ms / 16)` steps. Each step is fully
//! rasterized into the surface and handed to the sink before the next one is
//! computed, and the final step always leaves the surface holding exactly the
//! composited new frame.

use std::fmt;
use std::ops::Range;
use std::time::{Duration, Instant};

use anyhow::Result;
use fast_image_resize as fir;
use image::{Rgba, RgbaImage};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use tracing::debug;

use crate::processing::layout::{center_offset, scaled_extent};
use crate::render::mirror::FrameSink;
use crate::render::surface::{Rect, RenderSurface, compose_centered, resize_rgba};

/// Nominal time per animation step (about 60 Hz).
pub const STEP_MS: u64 = 16;
/// Edge length of the square cells revealed by [`TransitionKind::Dissolve`].
pub const DISSOLVE_BLOCK: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// Immediate replace.
    None,
    /// Linear alpha blend of new over old.
    Fade,
    /// Both frames move together; the old one exits towards `Direction`.
    Slide(Direction),
    /// New frame grows from the centre (ease-out) over the static old frame.
    ZoomIn,
    /// Old frame shrinks into the centre (ease-in) over the static new frame.
    ZoomOut,
    /// A growing crop of the new frame, starting at the `Direction` edge.
    Wipe(Direction),
    /// Shuffled 16x16 blocks of the new frame appear batch by batch.
    Dissolve,
}

impl TransitionKind {
    pub const ALL: [Self; 13] = [
        Self::None,
        Self::Fade,
        Self::Slide(Direction::Left),
        Self::Slide(Direction::Right),
        Self::Slide(Direction::Up),
        Self::Slide(Direction::Down),
        Self::ZoomIn,
        Self::ZoomOut,
        Self::Wipe(Direction::Left),
        Self::Wipe(Direction::Right),
        Self::Wipe(Direction::Up),
        Self::Wipe(Direction::Down),
        Self::Dissolve,
    ];
    pub const NAMES: &'static [&'static str] = &[
        "none",
        "fade",
        "slide-left",
        "slide-right",
        "slide-up",
        "slide-down",
        "zoom-in",
        "zoom-out",
        "wipe-left",
        "wipe-right",
        "wipe-up",
        "wipe-down",
        "dissolve",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fade => "fade",
            Self::Slide(Direction::Left) => "slide-left",
            Self::Slide(Direction::Right) => "slide-right",
            Self::Slide(Direction::Up) => "slide-up",
            Self::Slide(Direction::Down) => "slide-down",
            Self::ZoomIn => "zoom-in",
            Self::ZoomOut => "zoom-out",
            Self::Wipe(Direction::Left) => "wipe-left",
            Self::Wipe(Direction::Right) => "wipe-right",
            Self::Wipe(Direction::Up) => "wipe-up",
            Self::Wipe(Direction::Down) => "wipe-down",
            Self::Dissolve => "dissolve",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Uniform pick among every kind except [`TransitionKind::None`].
    pub fn choose_random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[1..].choose(rng).copied().unwrap_or(Self::Fade)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition resolved for a single show event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionSpec {
    pub kind: TransitionKind,
    pub duration: Duration,
}

/// Number of animation steps for `duration`.
pub fn step_count(duration: Duration) -> u32 {
    let steps = duration.as_millis() / u128::from(STEP_MS);
    steps.clamp(1, u128::from(u32::MAX)) as u32
}

/// Caps the step rate like a game-loop tick. Slow steps delay later ones;
/// nothing is ever dropped.
#[derive(Debug, Clone)]
pub struct FrameClock {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new(frames_per_second: u32) -> Self {
        Self {
            interval: Some(Duration::from_secs(1) / frames_per_second.max(1)),
            last: None,
        }
    }

    /// A clock that never waits.
    pub fn unthrottled() -> Self {
        Self {
            interval: None,
            last: None,
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn tick(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

struct Presenter<'a, S: FrameSink + ?Sized> {
    sink: &'a mut S,
    clock: &'a mut FrameClock,
}

impl<S: FrameSink + ?Sized> Presenter<'_, S> {
    fn frame(&mut self, surface: &RenderSurface) -> Result<()> {
        self.sink.present(surface.frame())?;
        self.clock.tick();
        Ok(())
    }
}

/// Animate from the surface's current contents to `image` centred on
/// `background`.
pub fn run<S, R>(
    surface: &mut RenderSurface,
    image: &RgbaImage,
    background: Rgba<u8>,
    spec: TransitionSpec,
    sink: &mut S,
    clock: &mut FrameClock,
    rng: &mut R,
) -> Result<()>
where
    S: FrameSink + ?Sized,
    R: Rng + ?Sized,
{
    let (width, height) = surface.dimensions();
    let target = compose_centered(image, width, height, background);
    let steps = step_count(spec.duration);
    debug!(kind = %spec.kind, steps, "running transition");

    clock.reset();
    let mut out = Presenter { sink, clock };
    match spec.kind {
        TransitionKind::None => {
            surface.copy_from(&target);
            out.frame(surface)
        }
        TransitionKind::Fade => fade(surface, &target, steps, &mut out),
        TransitionKind::Slide(direction) => slide(surface, &target, direction, steps, &mut out),
        TransitionKind::ZoomIn => zoom_in(surface, &target, steps, &mut out),
        TransitionKind::ZoomOut => zoom_out(surface, &target, steps, &mut out),
        TransitionKind::Wipe(direction) => wipe(surface, &target, direction, steps, &mut out),
        TransitionKind::Dissolve => {
            let plan = dissolve_plan(width, height, steps, rng);
            for batch in plan {
                for block in batch {
                    surface.copy_region(&target, block);
                }
                out.frame(surface)?;
            }
            Ok(())
        }
    }
}

/// `extent * step / steps`, rounded down.
fn portion(extent: u32, step: u32, steps: u32) -> u32 {
    (u64::from(extent) * u64::from(step) / u64::from(steps)) as u32
}

fn fade<S: FrameSink + ?Sized>(
    surface: &mut RenderSurface,
    target: &RgbaImage,
    steps: u32,
    out: &mut Presenter<'_, S>,
) -> Result<()> {
    let old = surface.snapshot();
    for i in 1..=steps {
        let alpha = portion(255, i, steps) as u8;
        surface.blend(&old, target, alpha);
        out.frame(surface)?;
    }
    Ok(())
}

fn slide<S: FrameSink + ?Sized>(
    surface: &mut RenderSurface,
    target: &RgbaImage,
    direction: Direction,
    steps: u32,
    out: &mut Presenter<'_, S>,
) -> Result<()> {
    let old = surface.snapshot();
    let (w, h) = (i64::from(surface.width()), i64::from(surface.height()));
    for i in 1..=steps {
        match direction {
            Direction::Left => {
                let off = i64::from(portion(surface.width(), i, steps));
                surface.blit(&old, -off, 0);
                surface.blit(target, w - off, 0);
            }
            Direction::Right => {
                let off = i64::from(portion(surface.width(), i, steps));
                surface.blit(&old, off, 0);
                surface.blit(target, off - w, 0);
            }
            Direction::Up => {
                let off = i64::from(portion(surface.height(), i, steps));
                surface.blit(&old, 0, -off);
                surface.blit(target, 0, h - off);
            }
            Direction::Down => {
                let off = i64::from(portion(surface.height(), i, steps));
                surface.blit(&old, 0, off);
                surface.blit(target, 0, off - h);
            }
        }
        out.frame(surface)?;
    }
    Ok(())
}

fn zoom_in<S: FrameSink + ?Sized>(
    surface: &mut RenderSurface,
    target: &RgbaImage,
    steps: u32,
    out: &mut Presenter<'_, S>,
) -> Result<()> {
    let old = surface.snapshot();
    let (width, height) = surface.dimensions();
    for i in 1..=steps {
        if i == steps {
            surface.copy_from(target);
        } else {
            let progress = f64::from(i) / f64::from(steps);
            let eased = 1.0 - (1.0 - progress).powi(2);
            draw_scaled_centered(surface, &old, target, scaled_extent(width, height, eased))?;
        }
        out.frame(surface)?;
    }
    Ok(())
}

fn zoom_out<S: FrameSink + ?Sized>(
    surface: &mut RenderSurface,
    target: &RgbaImage,
    steps: u32,
    out: &mut Presenter<'_, S>,
) -> Result<()> {
    let old = surface.snapshot();
    let (width, height) = surface.dimensions();
    for i in 1..=steps {
        if i == steps {
            surface.copy_from(target);
        } else {
            let progress = f64::from(i) / f64::from(steps);
            let remaining = 1.0 - progress.powi(2);
            draw_scaled_centered(surface, target, &old, scaled_extent(width, height, remaining))?;
        }
        out.frame(surface)?;
    }
    Ok(())
}

/// Paint `under` full-size, then `over` resized to `size` in the centre.
fn draw_scaled_centered(
    surface: &mut RenderSurface,
    under: &RgbaImage,
    over: &RgbaImage,
    size: (u32, u32),
) -> Result<()> {
    let scaled = resize_rgba(over, size.0, size.1, fir::FilterType::Bilinear)?;
    let (ox, oy) = center_offset(size.0, size.1, surface.width(), surface.height());
    surface.copy_from(under);
    surface.blit(&scaled, i64::from(ox), i64::from(oy));
    Ok(())
}

fn wipe<S: FrameSink + ?Sized>(
    surface: &mut RenderSurface,
    target: &RgbaImage,
    direction: Direction,
    steps: u32,
    out: &mut Presenter<'_, S>,
) -> Result<()> {
    let (width, height) = surface.dimensions();
    for i in 1..=steps {
        let rect = match direction {
            Direction::Left => Rect::new(0, 0, portion(width, i, steps), height),
            Direction::Right => {
                let w = portion(width, i, steps);
                Rect::new(width - w, 0, w, height)
            }
            Direction::Down => Rect::new(0, 0, width, portion(height, i, steps)),
            Direction::Up => {
                let h = portion(height, i, steps);
                Rect::new(0, height - h, width, h)
            }
        };
        // The old frame is never redrawn; only the revealed area changes.
        surface.copy_region(target, rect);
        out.frame(surface)?;
    }
    Ok(())
}

/// Row-major grid of [`DISSOLVE_BLOCK`] cells, clipped at the right and bottom edges.
pub fn dissolve_blocks(width: u32, height: u32) -> Vec<Rect> {
    let cols = width.div_ceil(DISSOLVE_BLOCK);
    let rows = height.div_ceil(DISSOLVE_BLOCK);
    let mut blocks = Vec::with_capacity((cols * rows) as usize);
    for r in 0..rows {
        for c in 0..cols {
            let rect = Rect::new(
                c * DISSOLVE_BLOCK,
                r * DISSOLVE_BLOCK,
                DISSOLVE_BLOCK,
                DISSOLVE_BLOCK,
            );
            blocks.push(rect.clipped(width, height));
        }
    }
    blocks
}

/// Index range revealed at each step: after step `i`, `total * i / steps`
/// blocks are visible.
pub fn batch_ranges(total: usize, steps: u32) -> impl Iterator<Item = Range<usize>> {
    let steps = steps.max(1) as usize;
    (1..=steps).map(move |i| (total * (i - 1) / steps)..(total * i / steps))
}

/// Shuffle the blocks once and split them into one batch per step.
pub fn dissolve_plan<R: Rng + ?Sized>(
    width: u32,
    height: u32,
    steps: u32,
    rng: &mut R,
) -> Vec<Vec<Rect>> {
    let mut blocks = dissolve_blocks(width, height);
    blocks.shuffle(rng);
    batch_ranges(blocks.len(), steps)
        .map(|range| blocks[range].to_vec())
        .collect()
}
