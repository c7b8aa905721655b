//! RGB-D capture front end: pulls paired depth/color frames from a camera
//! session and feeds them to a visual tracking consumer, exporting the
//! trajectory on shutdown.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use color_eyre::Result;
use tracing::{error, info};

use artemis::capture::{
    CameraDriver, DeviceSession, DriverContext, StreamKind, SyntheticCamera,
};
use artemis::pipeline::{CancelToken, PipelineDriver};
use artemis::tracking::{TrackingConsumer, TrajectoryRecorder};
use artemis::{CaptureSource, Config};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artemis=info".into()),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: artemis path_to_vocabulary path_to_settings");
        return Ok(ExitCode::from(1));
    }
    let vocabulary = PathBuf::from(&args[1]);

    let config = match Config::load(Path::new(&args[2])) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %args[2], error = %e, "could not load settings");
            return Ok(ExitCode::from(1));
        }
    };
    artemis::CONFIG.store(Arc::new(config.clone()));

    let (backend, driver): (_, Box<dyn CameraDriver>) = match config.capture.source {
        CaptureSource::Synthetic => ("synthetic", Box::new(SyntheticCamera::new().paced())),
    };

    let ctx = DriverContext::initialize(backend)?;
    let mut session = DeviceSession::open(ctx, driver, config.capture.device_uri.as_deref())?;

    // Configure and start both streams. Individual failures are logged, not
    // fatal: the validity check below is the single startup gate.
    for (kind, mode) in [
        (StreamKind::Depth, &config.capture.depth),
        (StreamKind::Color, &config.capture.color),
    ] {
        if let Err(e) = session.configure_stream(kind, mode) {
            error!(stream = kind.as_str(), error = %e, "stream configuration failed");
        }
        if let Err(e) = session.start(kind) {
            error!(stream = kind.as_str(), error = %e, "stream start failed");
        }
    }

    if !session.streams_valid() {
        error!("depth or color stream invalid after start");
        session.close();
        return Ok(ExitCode::from(1));
    }

    if config.capture.registration {
        session.enable_depth_to_color_registration();
    }

    let mut consumer = TrajectoryRecorder::new(vocabulary, config.pipeline.keyframe_interval);
    info!(vocabulary = %consumer.vocabulary().display(), "tracking consumer ready");
    info!("start processing sequence, interrupt with ctrl-c");

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                cancel.cancel();
            }
        });
    }

    // The acquisition loop blocks on every read, keep it off the runtime
    let pipeline_config = config.pipeline.clone();
    let (mut consumer, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = PipelineDriver::new(&pipeline_config, cancel).run(&mut session, &mut consumer);
        session.close();
        (consumer, outcome)
    })
    .await?;

    let run_failed = match outcome {
        Ok(stats) => {
            info!(
                iterations = stats.iterations,
                forwarded = stats.forwarded,
                skipped = stats.skipped_invalid,
                read_errors = stats.read_errors,
                "pipeline finished"
            );
            false
        }
        Err(e) => {
            error!(error = %e, "pipeline aborted");
            true
        }
    };

    // Stop consumer activity strictly before touching its trajectory state
    consumer.shutdown();

    // Best-effort exports: failures are reported, the process still exits
    let config = artemis::CONFIG.load();
    let path = &config.output.trajectory_path;
    match consumer.export_trajectory(path) {
        Ok(()) => info!(file = %path.display(), "trajectory saved"),
        Err(e) => error!(file = %path.display(), error = %e, "trajectory export failed"),
    }
    let path = &config.output.keyframe_path;
    match consumer.export_keyframes(path) {
        Ok(()) => info!(file = %path.display(), "keyframe trajectory saved"),
        Err(e) => error!(file = %path.display(), error = %e, "keyframe export failed"),
    }

    Ok(if run_failed {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
