mod capture;
mod db;
mod detector;
mod persistence;
mod sink;
mod source;

use capture::CaptureLoop;
use detector::MotionDetector;
use motion_monitor_common::config::Config;
use persistence::PersistencePolicy;
use sink::{CaptureSink, NoopSink};
use source::http::HttpSnapshotSource;
use source::replay::ReplaySource;
use source::FrameSource;
use std::path::PathBuf;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let explicit_path = std::env::args().nth(1).map(PathBuf::from);
    let config_path = explicit_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let loaded = match &explicit_path {
        Some(path) => Config::load(path).map(|c| (c, true)),
        None => Config::load_or_default(&config_path),
    };
    let (config, found) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    if found {
        info!(path = config_path.display().to_string(), "loaded config");
    } else {
        info!(
            path = config_path.display().to_string(),
            "config file not found, using defaults"
        );
    }
    info!(
        camera = config.camera.kind,
        width = config.camera.width,
        height = config.camera.height,
        interval_secs = config.capture.interval_secs,
        movement_threshold = config.persistence.movement_threshold,
        pixel_diff_threshold = config.detector.pixel_diff_threshold,
        blur_kernel = config.detector.blur_kernel,
        output_dir = config.persistence.output_dir.display().to_string(),
        "starting motion monitor"
    );

    let camera = &config.camera;
    let ok = match camera.kind.as_str() {
        "http" => match (camera.warmup(), camera.request_timeout()) {
            (Ok(warmup), Ok(timeout)) => {
                let source =
                    HttpSnapshotSource::new(camera.url.clone(), camera.width, camera.height, warmup)
                        .with_request_timeout(timeout);
                monitor(source, &config).await
            }
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "invalid camera configuration");
                false
            }
        },
        "replay" => {
            let source = ReplaySource::new(camera.directory.clone(), camera.width, camera.height);
            monitor(source, &config).await
        }
        other => {
            error!(kind = other, "unknown camera kind, expected 'http' or 'replay'");
            false
        }
    };

    if !ok {
        std::process::exit(1);
    }
}

/// Open the optional capture database; a broken database only costs records.
fn open_sink(config: &Config) -> Box<dyn CaptureSink> {
    let Some(database) = &config.database else {
        return Box::new(NoopSink);
    };
    match db::SqliteSink::open(&database.path) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            error!(
                error = %e,
                path = database.path.display().to_string(),
                "failed to open capture database; records will not be persisted"
            );
            Box::new(NoopSink)
        }
    }
}

/// Build the pipeline around `source` and run it. Returns false on a fatal error.
async fn monitor<S: FrameSource>(source: S, config: &Config) -> bool {
    let detector = match MotionDetector::new(
        config.detector.pixel_diff_threshold,
        config.detector.blur_kernel,
    ) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "invalid detector configuration");
            return false;
        }
    };

    let policy = match PersistencePolicy::new(
        config.persistence.movement_threshold,
        config.persistence.output_dir.clone(),
        config.persistence.jpeg_quality,
        open_sink(config),
    ) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to prepare output directory");
            return false;
        }
    };

    let interval = match config.capture.interval() {
        Ok(i) => i,
        Err(e) => {
            error!(error = %e, "invalid capture configuration");
            return false;
        }
    };
    let mut capture_loop = CaptureLoop::new(source, detector, policy, interval);
    match capture_loop.run().await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "monitor terminated");
            false
        }
    }
}
