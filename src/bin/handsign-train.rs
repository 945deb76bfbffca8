//! Developer utility to train the gesture classifier from a saved dataset.

use std::path::PathBuf;

use handsign::config;
use handsign::dataset::{GestureDataset, load_snapshot, snapshot_path};
use handsign::ml::metrics::{ConfusionMatrix, accuracy, precision_recall_by_class};
use handsign::model_store::ModelStore;
use handsign::training::{ClassifierTrainer, build_train_set};

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

    let dataset_path = match options.dataset {
        Some(path) => path,
        None => snapshot_path(&settings.recording.dataset_name).map_err(|err| err.to_string())?,
    };
    let snapshot = load_snapshot(&dataset_path)
        .map_err(|err| err.to_string())?
        .ok_or_else(|| format!("No dataset at {}", dataset_path.display()))?;
    let topology = settings.topology.topology();
    snapshot
        .check_topology(&topology)
        .map_err(|reason| format!("Cannot train from {}: {reason}", dataset_path.display()))?;
    let dataset = GestureDataset::from_snapshot(&snapshot);
    println!(
        "Loaded {} samples across {} gestures from {}",
        dataset.sample_count(),
        dataset.len(),
        dataset_path.display()
    );

    let mut train_options = settings.training.options();
    if let Some(epochs) = options.epochs {
        train_options.epochs = epochs;
    }
    if let Some(seed) = options.seed {
        train_options.seed = seed;
    }
    let mut trainer = ClassifierTrainer::new(train_options);
    if !options.dry_run {
        let models = ModelStore::open_default().map_err(|err| err.to_string())?;
        let key = options.model_key.unwrap_or(settings.model.key);
        trainer = trainer.persist_to(models, key);
    }
    let (model, report) = trainer
        .train(&dataset, &topology)
        .map_err(|err| err.to_string())?;

    println!(
        "epochs: {} (best {}, stopped early: {})",
        report.epochs_run, report.best_epoch, report.stopped_early
    );
    println!(
        "train rows: {}  validation rows: {}",
        report.train_rows, report.validation_rows
    );
    if let Some(loss) = report.validation_loss {
        println!("validation loss: {loss:.4}");
    }

    let set = build_train_set(&dataset, &topology).map_err(|err| err.to_string())?;
    let cm = ConfusionMatrix::from_predictions(&model.classifier, &set.x, &set.y);
    println!("accuracy on recorded samples: {:.4}", accuracy(&cm));
    for (idx, stats) in precision_recall_by_class(&cm).iter().enumerate() {
        println!(
            "class {:>2} {:<16}  precision={:.3}  recall={:.3}  support={}",
            idx,
            model.descriptor.labels[idx],
            stats.precision,
            stats.recall,
            stats.support
        );
    }
    println!("confusion matrix (rows=true, cols=pred):");
    for truth in 0..cm.n_classes {
        let mut row = String::new();
        for pred in 0..cm.n_classes {
            row.push_str(&format!("{:6}", cm.get(truth, pred)));
        }
        println!("{row}");
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    dataset: Option<PathBuf>,
    config: Option<PathBuf>,
    model_key: Option<String>,
    epochs: Option<usize>,
    seed: Option<u64>,
    dry_run: bool,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--dataset" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--dataset requires a value".to_string())?;
                options.dataset = Some(PathBuf::from(value));
            }
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--model-key" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--model-key requires a value".to_string())?;
                options.model_key = Some(value.clone());
            }
            "--epochs" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--epochs requires a value".to_string())?;
                options.epochs = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --epochs value: {value}"))?,
                );
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                options.seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            "--dry-run" => options.dry_run = true,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "handsign-train",
        "",
        "Trains the gesture classifier from a recorded dataset snapshot and saves it.",
        "",
        "Usage:",
        "  handsign-train [--dataset <gestures.json>] [--model-key <key>] [--dry-run]",
        "",
        "Options:",
        "  --dataset <file>     Dataset snapshot (default: the configured dataset in the app directory).",
        "  --config <file>      Settings file (default: config.toml in the app directory).",
        "  --model-key <key>    Save under this key instead of the configured one.",
        "  --epochs <n>         Override the configured epoch limit.",
        "  --seed <n>           Override the configured RNG seed.",
        "  --dry-run            Train and report without saving the model.",
    ]
    .join("\n")
}
