use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use image::{Rgba, RgbaImage};
use picture_show::render::mirror::FrameSink;
use picture_show::render::surface::{RenderSurface, compose_centered};
use picture_show::render::transition::{
    self, FrameClock, TransitionKind, TransitionSpec, dissolve_plan, step_count,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

const OLD: Rgba<u8> = Rgba([10, 200, 30, 255]);
const BG: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Default)]
struct Recorder {
    frames: Vec<RgbaImage>,
}

impl FrameSink for Recorder {
    fn present(&mut self, frame: &RgbaImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }
}

fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 7) as u8, (y * 5) as u8, 128, 255]))
}

fn spec(kind: TransitionKind, millis: u64) -> TransitionSpec {
    TransitionSpec {
        kind,
        duration: Duration::from_millis(millis),
    }
}

#[test]
fn every_kind_ends_on_the_composited_frame() {
    let image = gradient(30, 20);
    let target = compose_centered(&image, 48, 40, BG);
    let mut rng = StdRng::seed_from_u64(1);

    for kind in TransitionKind::ALL {
        let mut surface = RenderSurface::new(48, 40, OLD);
        let mut sink = Recorder::default();
        let mut clock = FrameClock::unthrottled();
        transition::run(
            &mut surface,
            &image,
            BG,
            spec(kind, 100),
            &mut sink,
            &mut clock,
            &mut rng,
        )
        .unwrap();

        assert_eq!(surface.frame(), &target, "{kind} did not land on the new frame");
        let expected_frames = if kind == TransitionKind::None {
            1
        } else {
            step_count(Duration::from_millis(100)) as usize
        };
        assert_eq!(sink.frames.len(), expected_frames, "{kind} frame count");
        assert_eq!(sink.frames.last(), Some(&target));
    }
}

#[test]
fn rerunning_none_with_same_frame_changes_nothing() {
    let image = gradient(16, 16);
    let mut surface = RenderSurface::new(32, 24, OLD);
    let mut sink = Recorder::default();
    let mut clock = FrameClock::unthrottled();
    let mut rng = StdRng::seed_from_u64(2);
    let none = spec(TransitionKind::None, 0);

    transition::run(&mut surface, &image, BG, none, &mut sink, &mut clock, &mut rng).unwrap();
    let first = surface.snapshot();
    transition::run(&mut surface, &image, BG, none, &mut sink, &mut clock, &mut rng).unwrap();
    assert_eq!(surface.frame(), &first);
}

#[test]
fn fade_moves_monotonically_towards_new_frame() {
    let white = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]));
    let mut surface = RenderSurface::new(8, 8, BG);
    let mut sink = Recorder::default();
    let mut clock = FrameClock::unthrottled();
    let mut rng = StdRng::seed_from_u64(3);

    transition::run(
        &mut surface,
        &white,
        BG,
        spec(TransitionKind::Fade, 64),
        &mut sink,
        &mut clock,
        &mut rng,
    )
    .unwrap();

    let reds: Vec<u8> = sink.frames.iter().map(|f| f.get_pixel(0, 0)[0]).collect();
    assert_eq!(reds.len(), 4);
    assert!(reds.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(reds.last(), Some(&255));
}

#[test]
fn wipe_left_never_touches_the_unrevealed_area() {
    let image = RgbaImage::from_pixel(40, 10, Rgba([1, 2, 3, 255]));
    let mut surface = RenderSurface::new(40, 10, OLD);
    let mut sink = Recorder::default();
    let mut clock = FrameClock::unthrottled();
    let mut rng = StdRng::seed_from_u64(4);

    transition::run(
        &mut surface,
        &image,
        BG,
        spec(TransitionKind::Wipe(transition::Direction::Left), 64),
        &mut sink,
        &mut clock,
        &mut rng,
    )
    .unwrap();

    // after the first of four steps only the leftmost quarter is new
    let first = &sink.frames[0];
    assert_eq!(*first.get_pixel(9, 5), Rgba([1, 2, 3, 255]));
    assert_eq!(*first.get_pixel(10, 5), OLD);
    assert_eq!(*first.get_pixel(39, 9), OLD);
}

#[test]
fn dissolve_reveals_each_block_exactly_once() {
    let steps = step_count(Duration::from_millis(320));
    assert_eq!(steps, 20);

    let plan = dissolve_plan(640, 480, steps, &mut StdRng::seed_from_u64(5));
    assert_eq!(plan.len(), 20);
    assert!(plan.iter().all(|batch| batch.len() == 60));

    let unique: HashSet<(u32, u32)> = plan.iter().flatten().map(|r| (r.x, r.y)).collect();
    assert_eq!(unique.len(), 1200);
    assert_eq!(plan.iter().map(Vec::len).sum::<usize>(), 1200);
}

#[test]
fn dissolve_on_surface_completes_with_clipped_edges() {
    // 50x33 does not divide into 16px blocks
    let image = gradient(50, 33);
    let target = compose_centered(&image, 50, 33, BG);
    let mut surface = RenderSurface::new(50, 33, OLD);
    let mut sink = Recorder::default();
    let mut clock = FrameClock::unthrottled();
    let mut rng = StdRng::seed_from_u64(6);

    transition::run(
        &mut surface,
        &image,
        BG,
        spec(TransitionKind::Dissolve, 48),
        &mut sink,
        &mut clock,
        &mut rng,
    )
    .unwrap();
    assert_eq!(sink.frames.len(), 3);
    assert_eq!(surface.frame(), &target);
}
