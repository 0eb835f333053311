//! Depth Fusion CLI
//!
//! Runs the detection-to-depth pipeline against the synthetic depth
//! camera. Ctrl-C stops the run and releases the device.

use std::path::PathBuf;

use clap::Parser;
use depth_fusion::{
    capture::{FileConfig, SceneObject, SyntheticCamera, SyntheticFault, SyntheticScene},
    detection::{BoundingBox, ClassLabels, Detection, FixedDetector},
    fusion::DepthFuser,
    metrics::{MetricsRegistry, MetricsSnapshot},
    pipeline::{CycleOutcome, LoggingSink, PipelineError, PipelineOrchestrator, RunState},
};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "depth-fusion", version, about = "Detection-to-depth fusion demo")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of cycles to run (0 runs until Ctrl-C).
    #[arg(short = 'n', long)]
    cycles: Option<u64>,

    /// Detector confidence threshold.
    #[arg(long)]
    confidence: Option<f32>,

    /// Snapshot every Nth completed cycle (0 disables).
    #[arg(long, default_value_t = 0)]
    snapshot_every: u64,

    /// Simulate an acquisition timeout every N frames (0 disables).
    #[arg(long, default_value_t = 0)]
    drop_every: u64,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Depth Fusion v{}", depth_fusion::VERSION);

    let mut config = match args.config.as_ref() {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };
    if let Some(cycles) = args.cycles {
        config.pipeline.max_cycles = cycles;
    }
    if let Some(confidence) = args.confidence {
        config.detector.confidence_threshold = confidence;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let (camera, detector) = demo_scene(&args, &config);
    let labels = ClassLabels::new(config.detector.class_names.clone());
    let mut pipeline = PipelineOrchestrator::new(
        camera,
        detector,
        LoggingSink::new(labels),
        config.device.clone(),
    )
    .with_fuser(DepthFuser::new(config.fusion.sampling))
    .with_confidence_threshold(config.detector.confidence_threshold)
    .with_max_cycles(config.pipeline.max_cycles)
    .with_snapshot_every(args.snapshot_every);

    let control = pipeline.control();
    if let Err(e) = ctrlc::set_handler(move || control.request_stop()) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };
    #[cfg(feature = "metrics")]
    let metrics_state = spawn_metrics_server(config.pipeline.metrics_port);

    info!("Running; press Ctrl-C to stop");
    let result = pipeline.run_with(|outcome, stats| {
        if let CycleOutcome::Completed(report) = outcome {
            if report.detector_failed {
                warn!(sequence = report.sequence, "Cycle ran without detections");
            }
        }

        let snapshot = MetricsSnapshot::from_stats(stats, RunState::Running);
        registry.update(&snapshot);
        #[cfg(feature = "metrics")]
        {
            if let Some(state) = metrics_state.as_ref() {
                state.blocking_write().update(&snapshot);
            }
        }
    });

    let stats = match result {
        Ok(stats) => stats,
        Err(PipelineError::Device(e)) => {
            eprintln!("Failed to start depth camera: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Run aborted: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Processed {} cycles: {} completed, {} skipped, {} detector failures",
        stats.cycles,
        stats.completed,
        stats.skipped(),
        stats.detector_failures
    );
    if let Some(coverage) = stats.depth_coverage() {
        info!("Depth coverage: {:.1}%", coverage * 100.0);
    }
    let snapshot = MetricsSnapshot::from_stats(&stats, pipeline.state());
    registry.update(&snapshot);
    #[cfg(feature = "metrics")]
    {
        if let Some(state) = metrics_state.as_ref() {
            state.blocking_write().update(&snapshot);
        }
    }
    match registry.encode() {
        Ok(text) => tracing::debug!("Final metrics:\n{}", text),
        Err(e) => warn!("Failed to encode metrics: {}", e),
    }
}

/// Builds the synthetic scene and a detector that reports its objects.
fn demo_scene(args: &Args, config: &FileConfig) -> (SyntheticCamera, FixedDetector) {
    let (w, h) = (config.device.stream_width, config.device.stream_height);
    let scene = SyntheticScene {
        background_m: 3.0,
        objects: vec![
            SceneObject::at(w / 8, h / 4, w / 3, h * 3 / 4, 1.25),
            SceneObject::at(w / 2, h / 3, w * 5 / 8, h / 2, 0.8),
            SceneObject::dropout(w * 3 / 4, h / 2, w * 7 / 8, h * 7 / 8),
        ],
    };
    let confidences = [0.92, 0.71, 0.55];
    let detections = scene
        .objects
        .iter()
        .zip(confidences)
        .enumerate()
        .map(|(class_id, (object, confidence))| {
            Detection::new(
                BoundingBox::new(object.x1, object.y1, object.x2, object.y2),
                class_id as u32,
                confidence,
            )
        })
        .collect();

    let mut camera = SyntheticCamera::new(scene);
    if args.drop_every > 0 {
        let warm_up = config.device.warm_up_frame_count as u64;
        let horizon = match config.pipeline.max_cycles {
            0 => 10_000,
            n => n,
        };
        for call in (warm_up + args.drop_every..=warm_up + horizon).step_by(args.drop_every as usize) {
            camera.inject_fault(call, SyntheticFault::Timeout);
        }
    }
    (camera, FixedDetector::new(detections))
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(
    port: u16,
) -> Option<std::sync::Arc<tokio::sync::RwLock<depth_fusion::metrics::MetricsState>>> {
    use depth_fusion::metrics::{MetricsServer, MetricsServerConfig};

    if port == 0 {
        return None;
    }
    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Metrics server disabled: {}", e);
            return None;
        }
    };
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
    let state = server.state();

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.run()) {
            error!("Metrics server stopped: {}", e);
        }
    });
    Some(state)
}
