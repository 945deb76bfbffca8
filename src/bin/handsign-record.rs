//! Developer utility to record a labeled gesture from replayed detections.
//!
//! Frames are fed to the recording controller one per sample interval on a
//! simulated clock, so a replay records exactly what a live session with the
//! same settings would have recorded.

use std::path::PathBuf;
use std::sync::Arc;

use handsign::clock::ManualClock;
use handsign::config;
use handsign::dataset::{GestureDataset, load_snapshot, save_snapshot, snapshot_path};
use handsign::detector::{BlankFrames, ReplayDetector, SharedCapture};
use handsign::pose::FeatureExtractor;
use handsign::recording::{RecordingController, TickOutcome};
use handsign::status::StatusSink;
use handsign::store::GestureStore;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let settings = match &options.config {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;
    let out = match options.out {
        Some(path) => path,
        None => snapshot_path(&settings.recording.dataset_name).map_err(|err| err.to_string())?,
    };

    let topology = settings.topology.topology();
    let saved = if options.fresh {
        None
    } else {
        load_snapshot(&out).map_err(|err| err.to_string())?
    };
    let dataset = match saved {
        Some(snapshot) => {
            snapshot.check_topology(&topology).map_err(|reason| {
                format!("Cannot extend {}: {reason} (use --fresh to start over)", out.display())
            })?;
            GestureDataset::from_snapshot(&snapshot)
        }
        None => GestureDataset::for_topology(topology.clone()),
    };
    let extractor = FeatureExtractor::new(topology, settings.topology.min_confidence);
    let store = Arc::new(GestureStore::with_dataset(extractor, dataset));
    let replay = ReplayDetector::from_path(&options.detections).map_err(|err| err.to_string())?;
    let frame_count = replay.frame_count();

    let recording = settings.recording.options(None);
    let interval = recording.sample_interval;
    let clock = Arc::new(ManualClock::new());
    let controller = RecordingController::new(
        Arc::clone(&store),
        SharedCapture::new(BlankFrames::new(640, 480), replay),
        clock.clone(),
        StatusSink::disabled(),
        recording,
    );

    controller.start_recording(&options.label);
    let mut recorded = 0usize;
    for _ in 0..frame_count {
        match controller.tick() {
            TickOutcome::Recorded { .. } => recorded += 1,
            TickOutcome::Expired | TickOutcome::Idle => break,
            _ => {}
        }
        clock.advance(interval);
    }
    controller.stop_recording();

    let snapshot = store.read_dataset(|dataset| dataset.snapshot());
    save_snapshot(&out, &snapshot).map_err(|err| err.to_string())?;
    println!(
        "Recorded {recorded} samples for '{}' from {frame_count} frames",
        options.label
    );
    for entry in &snapshot.labels {
        println!("  {:<16} {}", entry.label, entry.samples.len());
    }
    println!("Saved dataset to {}", out.display());
    Ok(())
}

#[derive(Debug, Clone)]
struct CliOptions {
    detections: PathBuf,
    label: String,
    out: Option<PathBuf>,
    config: Option<PathBuf>,
    fresh: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut detections: Option<PathBuf> = None;
    let mut label: Option<String> = None;
    let mut out: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut fresh = false;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--detections" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--detections requires a value".to_string())?;
                detections = Some(PathBuf::from(value));
            }
            "--label" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--label requires a value".to_string())?;
                if value.trim().is_empty() {
                    return Err("--label must not be empty".to_string());
                }
                label = Some(value.clone());
            }
            "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                out = Some(PathBuf::from(value));
            }
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            "--fresh" => fresh = true,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let detections = detections.ok_or_else(help_text)?;
    let label = label.ok_or_else(help_text)?;
    Ok(CliOptions {
        detections,
        label,
        out,
        config,
        fresh,
    })
}

fn help_text() -> String {
    [
        "handsign-record",
        "",
        "Records one gesture label from replayed detections into a dataset snapshot.",
        "",
        "Usage:",
        "  handsign-record --detections <frames.jsonl> --label <name> [--out <gestures.json>]",
        "",
        "Options:",
        "  --detections <file>  JSON lines, one array of detected hands per frame (required).",
        "  --label <name>       Gesture label to record (required).",
        "  --out <file>         Dataset snapshot to extend (default: the configured dataset).",
        "  --config <file>      Settings file (default: config.toml in the app directory).",
        "  --fresh              Start from an empty dataset instead of extending the snapshot.",
    ]
    .join("\n")
}
