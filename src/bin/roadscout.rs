use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};

use roadscout::integration::{CaptureHub, CsvReportSink, ReplaySource, StatsSnapshot, TrafficPipeline};
use roadscout::{IdentityStore, Settings, VehicleRegistry, aggregation};

#[derive(Parser, Debug)]
#[command(name = "roadscout", about = "Multi-camera vehicle counting from recorded detections")]
struct Args {
    /// Settings file (JSON)
    #[arg(long, default_value = "settings.json")]
    config: PathBuf,
    /// Recorded detections, one camera frame per line (JSON lines)
    #[arg(long, value_name = "PATH")]
    replay: PathBuf,
    /// Overrides `export.report_file`
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Overrides `export.identity_file`
    #[arg(long, value_name = "PATH")]
    identities: Option<PathBuf>,
    /// Log a status line every N ticks (0 disables)
    #[arg(long, default_value_t = 50)]
    status_every: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("roadscout=info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let settings = Settings::load(&args.config)
        .with_context(|| format!("loading settings from {}", args.config.display()))?;

    let sources = ReplaySource::from_path(&args.replay)
        .with_context(|| format!("reading detections from {}", args.replay.display()))?;
    if sources.is_empty() {
        bail!("{} contains no camera frames", args.replay.display());
    }

    if let Some(params) = settings.external_tracker_params() {
        info!(
            max_age = params.max_age,
            min_hits = params.min_hits,
            iou_threshold = params.iou_threshold,
            "boxes must arrive pre-tracked; external tracker parameters"
        );
    }

    let store = IdentityStore::new(
        args.identities
            .unwrap_or_else(|| settings.export.identity_file.clone()),
    );
    let registry = VehicleRegistry::from_state(store.load());
    info!(tracked = registry.known_count(), "starting with known vehicle ids");

    let mut hub = CaptureHub::new(settings.capture_timeout());
    for (camera, source) in sources {
        hub.spawn(camera, source)
            .with_context(|| format!("starting capture for camera {camera}"))?;
    }

    let report_path = args
        .report
        .unwrap_or_else(|| settings.export.report_file.clone());
    let (snapshots_tx, snapshots_rx) = crossbeam_channel::bounded::<StatsSnapshot>(16);
    let status_every = args.status_every;
    let status = thread::spawn(move || {
        for snapshot in snapshots_rx {
            if status_every > 0 && snapshot.tick % status_every == 0 {
                info!(
                    tick = snapshot.tick,
                    visible = ?snapshot.visible_per_camera,
                    with_direction = snapshot.vehicles_with_direction,
                    known = snapshot.known_vehicles,
                    "status"
                );
            }
        }
    });

    let mut pipeline = TrafficPipeline::new(
        &settings,
        registry,
        CsvReportSink::new(report_path),
        aggregation::unix_now(),
    )
    .with_observer(snapshots_tx);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            info!("shutdown requested");
            stop.store(true, Ordering::Relaxed);
        })
        .context("installing the shutdown handler")?;
    }

    let ticks = pipeline.run(&mut hub, settings.frame_interval(), &stop);
    info!(ticks, "processing finished");

    let registry = pipeline.into_registry();
    store.save(registry.state());

    join_status(status);
    Ok(())
}

/// Wait for the status logger. Returns false if it panicked.
fn join_status(handle: JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(%reason, "status thread panicked");
            false
        }
    }
}
