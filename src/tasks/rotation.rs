//! The playback state machine: logo rotation interleaved with content, where
//! pending uploads pre-empt the picture library.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::Sender;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::events::{EngineEvent, Source};
use crate::render::loader::load_fitted;
use crate::render::mirror::FrameSink;
use crate::render::surface::RenderSurface;
use crate::render::transition::{self, FrameClock};
use crate::scan::{Catalog, scan};
use crate::tasks::trash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Rescan,
    EmptyWait,
    LogoSlot,
    /// Uploaded priority or library picture, decided fresh on entry.
    ContentSlot,
    Stopping,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackState {
    pub logo_index: usize,
    pub pictures_index: usize,
    pub running: bool,
}

pub struct RotationEngine {
    settings: Settings,
    surface: RenderSurface,
    sink: Box<dyn FrameSink + Send>,
    clock: FrameClock,
    state: PlaybackState,
    logos: Catalog,
    pictures: Catalog,
    /// Whether anything was displayed since the last rescan.
    shown_this_cycle: bool,
    /// Undecodable uploads that could not be retired; ignored until the next rescan.
    stuck_uploads: HashSet<PathBuf>,
    rng: StdRng,
    cancel: CancellationToken,
    events: Option<Sender<EngineEvent>>,
}

impl RotationEngine {
    pub fn new(
        settings: Settings,
        surface: RenderSurface,
        sink: Box<dyn FrameSink + Send>,
        clock: FrameClock,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            surface,
            sink,
            clock,
            state: PlaybackState::default(),
            logos: Catalog::default(),
            pictures: Catalog::default(),
            shown_this_cycle: false,
            stuck_uploads: HashSet::new(),
            rng: StdRng::from_os_rng(),
            cancel,
            events: None,
        }
    }

    /// Publish every state-machine effect on `tx`.
    pub fn with_events(mut self, tx: Sender<EngineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Replace the random source used for shuffling and transition picks.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    /// Drive the state machine until the cancellation token fires.
    pub fn run(mut self) -> Result<()> {
        self.prepare_folders();
        self.state.running = true;
        let mut phase = Phase::Rescan;
        while phase != Phase::Stopping {
            phase = self.step(phase)?;
            if self.cancel.is_cancelled() {
                phase = Phase::Stopping;
            } else if matches!(phase, Phase::LogoSlot | Phase::ContentSlot)
                && self.take_rescan_request()
            {
                phase = Phase::Rescan;
            }
        }
        self.step(Phase::Stopping)?;
        let Self { sink, .. } = self;
        drop(sink);
        info!("slideshow stopped");
        Ok(())
    }

    /// Execute one state and return the next one.
    pub fn step(&mut self, phase: Phase) -> Result<Phase> {
        debug!(?phase, "engine step");
        match phase {
            Phase::Rescan => Ok(self.rescan()),
            Phase::EmptyWait => self.empty_wait(),
            Phase::LogoSlot => self.logo_slot(),
            Phase::ContentSlot => self.content_slot(),
            Phase::Stopping => {
                self.state.running = false;
                self.emit(EngineEvent::Stopped);
                Ok(Phase::Stopping)
            }
        }
    }

    fn prepare_folders(&self) {
        let paths = &self.settings.current().paths;
        for dir in [paths.uploaded_dir(), paths.trash_dir()] {
            if let Err(err) = fs::create_dir_all(&dir) {
                warn!(path = %dir.display(), "could not create folder: {err}");
            }
        }
    }

    fn rescan(&mut self) -> Phase {
        let cfg = self.settings.refresh().clone();

        match trash::sweep(&cfg.paths.trash_dir(), cfg.trash.delete_after_days) {
            Ok(0) => {}
            Ok(deleted) => info!(deleted, "trash sweep finished"),
            Err(err) => warn!("trash sweep failed: {err:#}"),
        }

        let recursive = cfg.slideshow.recursive;
        let mut logos = scan(&cfg.paths.logo_dir(), recursive);
        let mut pictures = scan(&cfg.paths.pictures_dir(), recursive);
        if cfg.slideshow.shuffle {
            logos = logos.shuffled(&mut self.rng);
            pictures = pictures.shuffled(&mut self.rng);
        }
        info!(
            logos = logos.len(),
            pictures = pictures.len(),
            "rescanned folders"
        );
        self.emit(EngineEvent::Rescanned {
            logos: logos.len(),
            pictures: pictures.len(),
        });
        self.logos = logos;
        self.pictures = pictures;
        self.state.logo_index = 0;
        self.state.pictures_index = 0;
        self.shown_this_cycle = false;
        self.stuck_uploads.clear();

        if !self.logos.is_empty() {
            Phase::LogoSlot
        } else if self.pictures.is_empty() && scan(&cfg.paths.uploaded_dir(), false).is_empty() {
            Phase::EmptyWait
        } else {
            Phase::ContentSlot
        }
    }

    fn empty_wait(&mut self) -> Result<Phase> {
        let cfg = self.settings.current();
        let wait = cfg.timing.empty_wait;
        self.surface.fill(cfg.display.background_color.rgba());
        self.sink.present(self.surface.frame())?;
        info!(wait = ?wait, "nothing to show; waiting before the next scan");
        self.emit(EngineEvent::EmptyWait);
        if self.hold(wait) {
            Ok(Phase::Rescan)
        } else {
            Ok(Phase::Stopping)
        }
    }

    fn logo_slot(&mut self) -> Result<Phase> {
        let Some(path) = self.logos.get(self.state.logo_index).map(Path::to_path_buf) else {
            return Ok(self.cycle_end());
        };
        let hold = self.settings.current().timing.logo_display;
        self.show(Source::Logo, &path, hold)?;

        self.state.logo_index += 1;
        if self.state.logo_index >= self.logos.len() {
            self.state.logo_index = 0;
            debug!("logo rotation wrapped");
            return Ok(self.cycle_end());
        }
        Ok(Phase::ContentSlot)
    }

    fn content_slot(&mut self) -> Result<Phase> {
        let cfg = self.settings.current();
        let uploaded = scan(&cfg.paths.uploaded_dir(), false);

        let pending = uploaded
            .as_slice()
            .iter()
            .find(|path| !self.stuck_uploads.contains(*path))
            .cloned();
        if let Some(path) = pending {
            let hold = cfg.timing.uploaded_display;
            let trash_dir = cfg.paths.trash_dir();
            let displayed = self.show(Source::Uploaded, &path, hold)?;
            let retired = self.retire(&path, &trash_dir);
            if !displayed && !retired {
                warn!(path = %path.display(), "ignoring upload until the next rescan");
                self.stuck_uploads.insert(path);
            }
            return Ok(self.after_content());
        }

        if let Some(path) = self.pictures.get(self.state.pictures_index).map(Path::to_path_buf) {
            let hold = cfg.timing.pictures_display;
            self.show(Source::Pictures, &path, hold)?;
            self.state.pictures_index += 1;
            if self.state.pictures_index >= self.pictures.len() {
                self.state.pictures_index = 0;
                debug!("picture rotation wrapped");
                return Ok(self.cycle_end());
            }
            return Ok(self.after_content());
        }

        if self.logos.is_empty() {
            Ok(self.cycle_end())
        } else {
            Ok(Phase::LogoSlot)
        }
    }

    /// Rescan after a cycle that displayed something; otherwise pause first.
    fn cycle_end(&self) -> Phase {
        if self.shown_this_cycle {
            Phase::Rescan
        } else {
            debug!("nothing could be displayed this cycle");
            Phase::EmptyWait
        }
    }

    fn after_content(&self) -> Phase {
        if self.logos.is_empty() {
            Phase::ContentSlot
        } else {
            Phase::LogoSlot
        }
    }

    /// Decode, animate in, then hold. Decode failures are skipped without a
    /// hold; returns whether the image was displayed.
    fn show(&mut self, source: Source, path: &Path, hold: Duration) -> Result<bool> {
        let (width, height) = self.surface.dimensions();
        let image = match load_fitted(path, width, height) {
            Ok(image) => image,
            Err(err) => {
                warn!(%source, path = %path.display(), "skipping image: {err:#}");
                self.emit(EngineEvent::Skipped {
                    source,
                    path: path.to_path_buf(),
                });
                return Ok(false);
            }
        };

        let display = &self.settings.current().display;
        let background = display.background_color.rgba();
        let spec = display.resolve_transition(&mut self.rng);
        transition::run(
            &mut self.surface,
            &image,
            background,
            spec,
            &mut self.sink,
            &mut self.clock,
            &mut self.rng,
        )?;

        info!(%source, path = %path.display(), hold = ?hold, transition = %spec.kind, "showing image");
        self.shown_this_cycle = true;
        self.hold(hold);
        self.emit(EngineEvent::Shown {
            source,
            path: path.to_path_buf(),
        });
        Ok(true)
    }

    fn retire(&mut self, path: &Path, trash_dir: &Path) -> bool {
        match trash::retire(path, trash_dir) {
            Ok(to) => {
                self.emit(EngineEvent::Retired {
                    from: path.to_path_buf(),
                    to,
                });
                true
            }
            Err(err) => {
                warn!(path = %path.display(), "could not move upload to trash: {err:#}");
                self.emit(EngineEvent::RetireFailed {
                    path: path.to_path_buf(),
                });
                false
            }
        }
    }

    /// Sleep for `duration` in poll-interval slices. Returns false if a stop
    /// was requested before the hold completed.
    fn hold(&self, duration: Duration) -> bool {
        let poll = self.settings.current().timing.poll_interval;
        let deadline = Instant::now() + duration;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(poll.min(deadline - now));
        }
    }

    fn take_rescan_request(&self) -> bool {
        let Some(marker) = self.settings.current().rescan_trigger.as_deref() else {
            return false;
        };
        if !marker.exists() {
            return false;
        }
        if let Err(err) = fs::remove_file(marker) {
            warn!(path = %marker.display(), "could not remove rescan marker: {err}");
        }
        info!("rescan requested");
        true
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }
}
