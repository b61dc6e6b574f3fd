use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use picture_show::config::{BackgroundColor, Configuration, Settings, TransitionSelection};
use picture_show::render::transition::{Direction, TransitionKind};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn parse(yaml: &str) -> Configuration {
    serde_yaml::from_str::<Configuration>(yaml)
        .unwrap()
        .validated()
        .unwrap()
}

#[test]
fn defaults_apply_to_an_empty_document() {
    let cfg = parse("{}");
    assert_eq!(cfg.paths.base_path, PathBuf::from("/home/pi/slideshow"));
    assert_eq!(cfg.paths.trash_dir(), PathBuf::from("/home/pi/slideshow/trash"));
    assert_eq!(cfg.timing.logo_display, Duration::from_secs(5));
    assert_eq!(cfg.timing.pictures_display, Duration::from_secs(10));
    assert_eq!(cfg.timing.uploaded_display, Duration::from_secs(8));
    assert_eq!(cfg.timing.empty_wait, Duration::from_secs(10));
    assert_eq!(cfg.display.transition, TransitionSelection::Fixed(TransitionKind::Fade));
    assert_eq!(cfg.display.duration_bounds(), (300, 800));
    assert_eq!(cfg.display.background_color, BackgroundColor([0, 0, 0]));
    assert!(!cfg.slideshow.shuffle);
    assert!(cfg.slideshow.recursive);
    assert_eq!(cfg.trash.delete_after_days, 30);
    assert_eq!(
        cfg.rescan_trigger,
        Some(PathBuf::from("/tmp/rpi-slideshow-rescan"))
    );
    assert_eq!(cfg.framebuffer.fallback_size, [1920, 1080]);
}

#[test]
fn parses_a_full_document() {
    let cfg = parse(
        r##"
paths:
  base-path: /srv/show
  logo-folder: brand
timing:
  logo-display: 2s
  pictures-display: 1500ms
display:
  transition: wipe_down
  transition-duration-min-ms: 200
  transition-duration-max-ms: 400
  transition-duration-random: true
  background-color: "#102030"
slideshow:
  shuffle: true
  recursive: false
trash:
  delete-after-days: 0
rescan-trigger: null
framebuffer:
  device: /dev/fb1
  frame-rate: 30
"##,
    );
    assert_eq!(cfg.paths.logo_dir(), PathBuf::from("/srv/show/brand"));
    assert_eq!(cfg.paths.pictures_dir(), PathBuf::from("/srv/show/pictures"));
    assert_eq!(cfg.timing.logo_display, Duration::from_secs(2));
    assert_eq!(cfg.timing.pictures_display, Duration::from_millis(1500));
    assert_eq!(
        cfg.display.transition,
        TransitionSelection::Fixed(TransitionKind::Wipe(Direction::Down))
    );
    assert_eq!(cfg.display.background_color, BackgroundColor([0x10, 0x20, 0x30]));
    assert!(cfg.slideshow.shuffle);
    assert!(!cfg.slideshow.recursive);
    assert_eq!(cfg.trash.delete_after_days, 0);
    assert_eq!(cfg.rescan_trigger, None);
    assert_eq!(cfg.framebuffer.device, PathBuf::from("/dev/fb1"));
    assert_eq!(cfg.framebuffer.frame_rate, 30);

    let mut rng = StdRng::seed_from_u64(9);
    for _ in 0..50 {
        let ms = cfg.display.resolve_transition(&mut rng).duration.as_millis();
        assert!((200..=400).contains(&ms));
    }
}

#[test]
fn legacy_duration_fills_both_bounds() {
    let cfg = parse("display:\n  transition-duration-ms: 450\n");
    assert_eq!(cfg.display.duration_bounds(), (450, 450));

    let cfg = parse("display:\n  transition-duration-ms: 450\n  transition-duration-min-ms: 100\n");
    assert_eq!(cfg.display.duration_bounds(), (100, 800));
}

#[test]
fn fixed_duration_uses_the_minimum() {
    let cfg = parse("display:\n  transition-duration-min-ms: 250\n");
    let spec = cfg.display.resolve_transition(&mut StdRng::seed_from_u64(1));
    assert_eq!(spec.duration, Duration::from_millis(250));
    assert_eq!(spec.kind, TransitionKind::Fade);
}

#[test]
fn random_selection_never_resolves_to_none() {
    let cfg = parse("display:\n  transition: random\n");
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        assert_ne!(cfg.display.resolve_transition(&mut rng).kind, TransitionKind::None);
    }
}

#[test]
fn invalid_values_are_rejected() {
    assert!(serde_yaml::from_str::<Configuration>("display:\n  background-color: red\n").is_err());

    let zero: Configuration = serde_yaml::from_str("timing:\n  logo-display: 0s\n").unwrap();
    assert!(zero.validated().is_err());
}

#[test]
fn inverted_duration_bounds_still_load() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.yaml");
    fs::write(
        &path,
        "display:\n  transition-duration-min-ms: 800\n  transition-duration-max-ms: 300\n  transition-duration-random: true\n",
    )
    .unwrap();

    let settings = Settings::from_file(&path).unwrap();
    let display = &settings.current().display;
    assert_eq!(display.duration_bounds(), (800, 800));
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..20 {
        let spec = display.resolve_transition(&mut rng);
        assert_eq!(spec.duration, Duration::from_millis(800));
    }
}

#[test]
fn unknown_transition_name_falls_back_to_fade() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.yaml");
    fs::write(&path, "display:\n  transition: slide_diagonal\n").unwrap();

    let settings = Settings::from_file(&path).unwrap();
    assert_eq!(
        settings.current().display.transition,
        TransitionSelection::Fixed(TransitionKind::Fade)
    );
}

#[test]
fn missing_file_yields_defaults_and_refresh_keeps_last_good() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.yaml");

    let mut settings = Settings::from_file(&path).unwrap();
    assert_eq!(settings.current().trash.delete_after_days, 30);

    fs::write(&path, "trash:\n  delete-after-days: 7\n").unwrap();
    assert_eq!(settings.refresh().trash.delete_after_days, 7);

    fs::write(&path, "trash: [this is not a mapping").unwrap();
    assert_eq!(settings.refresh().trash.delete_after_days, 7);
}
