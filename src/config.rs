use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use rand::Rng;
use serde::Deserialize;
use serde::de::{self, Deserializer};
use tracing::{debug, info, warn};

use crate::render::transition::{TransitionKind, TransitionSpec};

pub const DEFAULT_RESCAN_TRIGGER: &str = "/tmp/rpi-slideshow-rescan";

/// Immutable-during-a-cycle snapshot of everything the engine reads from settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    pub paths: PathsConfig,
    pub timing: TimingConfig,
    pub display: DisplayConfig,
    pub slideshow: SlideshowConfig,
    pub trash: TrashConfig,
    /// Marker file dropped by the upload interface to request an early rescan.
    /// `null` disables polling.
    pub rescan_trigger: Option<PathBuf>,
    pub framebuffer: FramebufferConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Like [`Configuration::from_yaml_file`], but a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found; using defaults");
            return Ok(Self::default());
        }
        Self::from_yaml_file(path)
            .with_context(|| format!("failed to parse configuration {}", path.display()))
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.timing.validate()?;
        match (
            self.display.transition_duration_min_ms,
            self.display.transition_duration_max_ms,
        ) {
            (Some(min), Some(max)) if min > max => warn!(
                min,
                max,
                "transition-duration-min-ms exceeds the max; using the min as a fixed duration"
            ),
            _ => {}
        }
        ensure!(
            self.framebuffer.frame_rate > 0,
            "framebuffer.frame-rate must be greater than zero"
        );
        ensure!(
            self.framebuffer.fallback_size.iter().all(|d| *d > 0),
            "framebuffer.fallback-size must be non-zero"
        );
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            timing: TimingConfig::default(),
            display: DisplayConfig::default(),
            slideshow: SlideshowConfig::default(),
            trash: TrashConfig::default(),
            rescan_trigger: Some(PathBuf::from(DEFAULT_RESCAN_TRIGGER)),
            framebuffer: FramebufferConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PathsConfig {
    pub base_path: PathBuf,
    pub logo_folder: String,
    pub pictures_folder: String,
    pub uploaded_folder: String,
    pub trash_folder: String,
}

impl PathsConfig {
    pub fn logo_dir(&self) -> PathBuf {
        self.base_path.join(&self.logo_folder)
    }

    pub fn pictures_dir(&self) -> PathBuf {
        self.base_path.join(&self.pictures_folder)
    }

    pub fn uploaded_dir(&self) -> PathBuf {
        self.base_path.join(&self.uploaded_folder)
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.base_path.join(&self.trash_folder)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/home/pi/slideshow"),
            logo_folder: "logo".into(),
            pictures_folder: "pictures".into(),
            uploaded_folder: "uploaded".into(),
            trash_folder: "trash".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TimingConfig {
    /// Hold time for each logo image.
    #[serde(with = "humantime_serde")]
    pub logo_display: Duration,
    /// Hold time for each library picture.
    #[serde(with = "humantime_serde")]
    pub pictures_display: Duration,
    /// Hold time for a freshly uploaded image before it is retired.
    #[serde(with = "humantime_serde")]
    pub uploaded_display: Duration,
    /// Pause between rescans while every folder is empty.
    #[serde(with = "humantime_serde")]
    pub empty_wait: Duration,
    /// Granularity at which hold periods check for a stop request.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl TimingConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("timing.logo-display", self.logo_display),
            ("timing.pictures-display", self.pictures_display),
            ("timing.uploaded-display", self.uploaded_display),
            ("timing.poll-interval", self.poll_interval),
        ] {
            ensure!(!value.is_zero(), "{name} must be positive");
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            logo_display: Duration::from_secs(5),
            pictures_display: Duration::from_secs(10),
            uploaded_display: Duration::from_secs(8),
            empty_wait: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSelection {
    Fixed(TransitionKind),
    Random,
}

impl Default for TransitionSelection {
    fn default() -> Self {
        Self::Fixed(TransitionKind::Fade)
    }
}

impl fmt::Display for TransitionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(kind) => write!(f, "{kind}"),
            Self::Random => f.write_str("random"),
        }
    }
}

impl<'de> Deserialize<'de> for TransitionSelection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(parse_transition_selection(&raw))
    }
}

/// Unknown names fall back to the default transition.
fn parse_transition_selection(raw: &str) -> TransitionSelection {
    // The upload interface writes snake_case names.
    let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
    if normalized == "random" {
        return TransitionSelection::Random;
    }
    match TransitionKind::from_name(&normalized) {
        Some(kind) => TransitionSelection::Fixed(kind),
        None => {
            let fallback = TransitionSelection::default();
            warn!(
                "unknown transition '{raw}' (expected random, {}); using {fallback}",
                TransitionKind::NAMES.join(", ")
            );
            fallback
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DisplayConfig {
    pub transition: TransitionSelection,
    pub transition_duration_min_ms: Option<u64>,
    pub transition_duration_max_ms: Option<u64>,
    /// Draw each transition's duration uniformly from the min/max bounds.
    pub transition_duration_random: bool,
    /// Older single-value setting; used for both bounds when the min key is absent.
    pub transition_duration_ms: Option<u64>,
    pub background_color: BackgroundColor,
}

impl DisplayConfig {
    const DEFAULT_MIN_MS: u64 = 300;
    const DEFAULT_MAX_MS: u64 = 800;

    /// Effective `(min, max)` transition duration in milliseconds.
    ///
    /// A max below the min is raised to the min.
    pub fn duration_bounds(&self) -> (u64, u64) {
        match (self.transition_duration_min_ms, self.transition_duration_ms) {
            (None, Some(legacy)) => (legacy, legacy),
            (min, _) => {
                let min = min.unwrap_or(Self::DEFAULT_MIN_MS);
                let max = self
                    .transition_duration_max_ms
                    .unwrap_or(Self::DEFAULT_MAX_MS);
                (min, max.max(min))
            }
        }
    }

    /// Resolve the transition for a single show event.
    pub fn resolve_transition<R: Rng + ?Sized>(&self, rng: &mut R) -> TransitionSpec {
        let kind = match self.transition {
            TransitionSelection::Fixed(kind) => kind,
            TransitionSelection::Random => TransitionKind::choose_random(rng),
        };
        let (min, max) = self.duration_bounds();
        let millis = if self.transition_duration_random && max > min {
            rng.random_range(min..=max)
        } else {
            min
        };
        debug!(%kind, millis, "resolved transition");
        TransitionSpec {
            kind,
            duration: Duration::from_millis(millis),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            transition: TransitionSelection::default(),
            transition_duration_min_ms: None,
            transition_duration_max_ms: None,
            transition_duration_random: false,
            transition_duration_ms: None,
            background_color: BackgroundColor::default(),
        }
    }
}

/// 24-bit RGB fill written as `#RRGGBB` in the settings file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackgroundColor(pub [u8; 3]);

impl BackgroundColor {
    pub fn parse(raw: &str) -> Result<Self> {
        let hex = raw.trim().trim_start_matches('#');
        ensure!(
            hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()),
            "background color '{raw}' must be a 6-digit hex triple like #1a2b3c"
        );
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        Ok(Self([channel(0)?, channel(2)?, channel(4)?]))
    }

    pub fn rgba(self) -> image::Rgba<u8> {
        let [r, g, b] = self.0;
        image::Rgba([r, g, b, 255])
    }
}

impl<'de> Deserialize<'de> for BackgroundColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SlideshowConfig {
    pub shuffle: bool,
    pub recursive: bool,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            shuffle: false,
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TrashConfig {
    /// Retention for retired uploads; zero or negative keeps them forever.
    pub delete_after_days: i64,
}

impl Default for TrashConfig {
    fn default() -> Self {
        Self {
            delete_after_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FramebufferConfig {
    pub device: PathBuf,
    /// Directory exposing `bits_per_pixel`, `stride` and `virtual_size`.
    pub sysfs: PathBuf,
    /// Render size used when no device geometry is available.
    pub fallback_size: [u32; 2],
    pub frame_rate: u32,
}

impl Default for FramebufferConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/fb0"),
            sysfs: PathBuf::from("/sys/class/graphics/fb0"),
            fallback_size: [1920, 1080],
            frame_rate: 60,
        }
    }
}

/// Settings source re-read by the engine at the start of every rescan.
#[derive(Debug)]
pub struct Settings {
    path: Option<PathBuf>,
    current: Configuration,
}

impl Settings {
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = Configuration::load(&path)?
            .validated()
            .context("invalid configuration values")?;
        Ok(Self {
            path: Some(path),
            current,
        })
    }

    /// A snapshot that never changes; used by tests and embedders.
    pub fn fixed(cfg: Configuration) -> Self {
        Self {
            path: None,
            current: cfg,
        }
    }

    pub fn current(&self) -> &Configuration {
        &self.current
    }

    /// Re-read the backing file. A broken file keeps the last good snapshot.
    pub fn refresh(&mut self) -> &Configuration {
        if let Some(path) = &self.path {
            match Configuration::load(path).and_then(Configuration::validated) {
                Ok(cfg) => self.current = cfg,
                Err(err) => {
                    warn!(path = %path.display(), "keeping previous settings: {err:#}");
                }
            }
        }
        &self.current
    }
}
