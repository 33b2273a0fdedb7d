use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use imu_gesture::calibrate;
use imu_gesture::classifier::{
    check_shapes, load_classes, predict_checked, Classifier, FixedClassifier, OnnxClassifier,
};
use imu_gesture::clock::{Clock, ManualClock};
use imu_gesture::config::PipelineConfig;
use imu_gesture::csv_loader::ReplayLink;
use imu_gesture::decision::pick_with_floor;
use imu_gesture::types::{AxisOffsets, AXES};
use imu_gesture::window::WindowCollector;

const USAGE: &str = "Usage: replay_csv [--calibrate] [--dump-features] \
[--model <model.onnx>] [--classes <classes.json>] <capture.csv>";

struct ReplayOptions {
    calibrate: bool,
    dump_features: bool,
    model: Option<PathBuf>,
    classes: Option<PathBuf>,
}

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut opts = ReplayOptions {
        calibrate: false,
        dump_features: false,
        model: None,
        classes: None,
    };
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--calibrate" => opts.calibrate = true,
            "--dump-features" => opts.dump_features = true,
            "--model" => {
                let path = args.next().ok_or_else(|| anyhow!(USAGE))?;
                opts.model = Some(PathBuf::from(path));
            }
            "--classes" => {
                let path = args.next().ok_or_else(|| anyhow!(USAGE))?;
                opts.classes = Some(PathBuf::from(path));
            }
            _ => {
                if csv_path.is_some() {
                    bail!(USAGE);
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("A CSV capture is required\n{}", USAGE))?;
    Ok((csv_path, opts))
}

/// Loads the model, or a uniform stub, and checks it against the window
/// length and class count before any sample is read.
fn open_classifier(
    model: Option<&PathBuf>,
    config: &PipelineConfig,
) -> Result<Box<dyn Classifier>> {
    let classifier: Box<dyn Classifier> = match model {
        Some(path) => Box::new(OnnxClassifier::new(path)?),
        None => {
            println!("⚠️  No --model given, using uniform scores");
            let uniform = 1.0 / config.num_classes as f32;
            Box::new(FixedClassifier::new(
                config.feature_len(),
                vec![uniform; config.num_classes],
            ))
        }
    };
    check_shapes(&classifier, config)?;
    Ok(classifier)
}

fn main() -> Result<()> {
    let (csv_path, opts) = parse_args()?;
    println!("🎞️  Replaying capture {:?}", csv_path);

    let mut config = PipelineConfig::default();
    if let Some(path) = &opts.classes {
        config.labels = load_classes(path)?;
        config.num_classes = config.labels.len();
    }
    config.validate()?;

    let mut classifier = open_classifier(opts.model.as_ref(), &config)?;

    let mut link = ReplayLink::from_csv(&csv_path, false)?;
    let clock = ManualClock::new();

    // A capture taken at rest can calibrate itself; otherwise the readings
    // are taken as already bias-free.
    let offsets = if opts.calibrate {
        calibrate(&mut link, &config.calibration_params())?
    } else {
        AxisOffsets::zero()
    };
    println!("🧭 Offsets: {:?}", offsets.to_array());

    let mut collector = WindowCollector::new(config.window_params());
    let window = collector.collect(&mut link, &offsets, &clock)?;
    println!(
        "ℹ️  Window of {} samples ({} features) spans {:?}",
        config.samples_per_gesture,
        window.len(),
        clock.now()
    );

    if opts.dump_features {
        println!("\nFeatures (time-major, ax ay az gx gy gz):");
        for (t, sample) in window.chunks(AXES).enumerate() {
            let row: Vec<String> = sample.iter().map(|v| format!("{:+.5}", v)).collect();
            println!("  {:>3}: {}", t, row.join(" "));
        }
    }

    let probabilities = predict_checked(&mut classifier, &window, config.num_classes)?;
    let decision = pick_with_floor(&probabilities, config.decision_floor)
        .ok_or_else(|| anyhow!("The model returned no probabilities"))?;

    let mut scores: Vec<(String, f32)> = probabilities
        .iter()
        .enumerate()
        .map(|(idx, p)| (config.label(idx), *p))
        .collect();
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    println!(
        "\n🥇 Class: {} (Prob: {:.2})",
        config.label(decision.class_index),
        decision.probability
    );

    println!("\nProbabilities:");
    for (idx, (label, score)) in scores.iter().enumerate() {
        println!("  {:>2}. {:<12} {:>6.2}%", idx + 1, label, score * 100.0);
    }

    Ok(())
}
