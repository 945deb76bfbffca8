//! Replays recorded hand detections through the live gesture classifier.

use std::path::PathBuf;

use handsign::config::{self, AppSettings};
use handsign::detector::{BlankFrames, ReplayDetector, SharedCapture};
use handsign::inference::InferenceOutput;
use handsign::logging;
use handsign::model_store::ModelStore;
use handsign::session::Session;
use handsign::status::StatusSink;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let settings = load_settings(options.config.as_ref())?;

    let mut replay = ReplayDetector::from_path(&options.detections).map_err(|err| err.to_string())?;
    let frame_count = replay.frame_count();
    replay = replay.looping(options.looping);
    let capture = SharedCapture::new(BlankFrames::new(640, 480), replay);
    let models = ModelStore::open_default().map_err(|err| err.to_string())?;
    let (status, rx) = StatusSink::channel();
    let session = Session::new(&settings, capture, Some(models), status);
    if session.store().active_model().is_none() {
        println!("No compatible model found; train one with handsign-train first.");
    }

    let frames = options.max_frames.unwrap_or(frame_count);
    let mut inference = session.inference_loop();
    let mut detected = 0usize;
    for frame in 0..frames {
        if let InferenceOutput::Detected(predictions) = inference.step() {
            detected += 1;
            for prediction in &predictions {
                tracing::debug!(
                    "frame {frame}: {} ({:.2})",
                    prediction.label,
                    prediction.confidence
                );
            }
        }
        for event in rx.try_iter() {
            println!("frame {frame:>5}: {event}");
        }
    }
    println!("Classified {detected} of {frames} frames");
    Ok(())
}

fn load_settings(path: Option<&PathBuf>) -> Result<AppSettings, String> {
    match path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())
}

#[derive(Debug, Clone)]
struct CliOptions {
    detections: PathBuf,
    config: Option<PathBuf>,
    max_frames: Option<usize>,
    looping: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut detections: Option<PathBuf> = None;
    let mut config: Option<PathBuf> = None;
    let mut max_frames: Option<usize> = None;
    let mut looping = false;

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
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            "--frames" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--frames requires a value".to_string())?;
                max_frames = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --frames value: {value}"))?,
                );
            }
            "--loop" => looping = true,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    if looping && max_frames.is_none() {
        return Err("--loop needs --frames to know when to stop".to_string());
    }
    let detections = detections.ok_or_else(help_text)?;
    Ok(CliOptions {
        detections,
        config,
        max_frames,
        looping,
    })
}

fn help_text() -> String {
    [
        "handsign",
        "",
        "Classifies replayed hand detections with the saved gesture model.",
        "",
        "Usage:",
        "  handsign --detections <frames.jsonl> [--frames <n>] [--loop] [--config <config.toml>]",
        "",
        "Options:",
        "  --detections <file>  JSON lines, one array of detected hands per frame (required).",
        "  --frames <n>         Number of frames to process (default: every frame once).",
        "  --loop               Restart the replay when it runs out (requires --frames).",
        "  --config <file>      Settings file (default: config.toml in the app directory).",
    ]
    .join("\n")
}
