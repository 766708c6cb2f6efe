use clap::Parser;
use mw_capture::{
    open_frame_source, AnnotatedFrameWriter, FileEventLogger, LogRenderer, PngSnapshotSink,
};
use mw_config::Config;
use mw_core::{init_tracing, LogFormat, Result};
use mw_vision::{Monitor, Renderer, RunSummary};
use std::process;

mod cli;

use cli::Cli;

fn main() {
    let cli = Cli::parse();

    let loaded = cli.loader().and_then(|loader| loader.load());

    // A broken configuration is still reported in the requested format
    let format = match &loaded {
        Ok(config) => config.logging.format,
        Err(_) => cli
            .log_format
            .as_deref()
            .map(LogFormat::from_name)
            .unwrap_or_default(),
    };
    init_tracing(format, "motionwatch");
    tracing::info!("motionwatch starting");

    // Load configuration - exit with non-zero if invalid
    let config = match loaded {
        Ok(config) => {
            tracing::debug!(?config, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let summary = match run(&config) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("motionwatch failed: {}", e);
            process::exit(1);
        }
    };

    if cli.summary_json {
        match serde_json::to_string(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                tracing::error!("Failed to serialize run summary: {}", e);
                process::exit(1);
            }
        }
    }
}

/// Acquire every resource up front, then run the monitor to completion
fn run(config: &Config) -> Result<RunSummary> {
    let mut source = open_frame_source(&config.source)?;

    let mut monitor = Monitor::new(config.detection.clone(), renderer(config)?)
        .show_mask(config.display.show_mask);

    if config.snapshots.enabled {
        let sink = PngSnapshotSink::create(&config.snapshots.directory)?;
        monitor = monitor.with_snapshots(Box::new(sink));
    }

    if let Some(path) = &config.logging.event_log {
        monitor = monitor.with_event_log(Box::new(FileEventLogger::open(path)));
    }

    tracing::info!(
        source = %source.describe(),
        algorithm = %config.detection.algorithm,
        snapshots = config.snapshots.enabled,
        "Application configured and ready"
    );

    monitor.run(source.as_mut())
}

#[cfg(feature = "heavy_opencv")]
fn renderer(config: &Config) -> Result<Box<dyn Renderer>> {
    if config.display.window {
        return Ok(Box::new(mw_capture::WindowRenderer::new("motionwatch")));
    }
    headless_renderer(config)
}

#[cfg(not(feature = "heavy_opencv"))]
fn renderer(config: &Config) -> Result<Box<dyn Renderer>> {
    if config.display.window {
        tracing::warn!("Window display requires the heavy_opencv feature, running headless");
    }
    headless_renderer(config)
}

fn headless_renderer(config: &Config) -> Result<Box<dyn Renderer>> {
    match &config.display.annotate_dir {
        Some(dir) => Ok(Box::new(AnnotatedFrameWriter::create(dir)?)),
        None => Ok(Box::new(LogRenderer::new())),
    }
}
