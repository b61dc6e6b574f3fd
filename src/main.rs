use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use picture_show::config::Settings;
use picture_show::render::mirror::{FrameSink, FramebufferMirror, NullSink, display_size};
use picture_show::render::surface::RenderSurface;
use picture_show::render::transition::FrameClock;
use picture_show::tasks::rotation::RotationEngine;

#[derive(Debug, Parser)]
#[command(
    name = "picture-show",
    version,
    about = "framebuffer slideshow with logo rotation and upload priority"
)]
struct Args {
    /// Path to YAML config; missing file means defaults
    #[arg(value_name = "CONFIG", default_value = "config.yaml")]
    config: PathBuf,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("picture_show={level},warn")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args { config, verbose } = Args::parse();
    init_tracing(verbose);

    let settings = Settings::from_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;
    let cfg = settings.current().clone();
    tracing::info!("Loaded configuration from {}:\n{:#?}", config.display(), cfg);

    let (width, height) = display_size(&cfg.framebuffer);
    ensure!(width > 0 && height > 0, "render surface has zero size");
    let surface = RenderSurface::new(width, height, cfg.display.background_color.rgba());
    let sink: Box<dyn FrameSink + Send> = match FramebufferMirror::detect(&cfg.framebuffer) {
        Some(mirror) => Box::new(mirror),
        None => Box::new(NullSink),
    };
    let clock = FrameClock::new(cfg.framebuffer.frame_rate);

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sigterm.recv() => {
                            tracing::info!("SIGTERM received; initiating shutdown");
                            cancel.cancel();
                        }
                    }
                }
                Err(err) => tracing::warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }

    let engine = RotationEngine::new(settings, surface, sink, clock, cancel.clone());
    let result = tokio::task::spawn_blocking(move || engine.run())
        .await
        .context("slideshow thread panicked")?;
    cancel.cancel();
    result
}
