/*
Real-time gesture recognition from a 6-axis IMU.

1. Calibrates the sensor bias while the device lies still
2. Samples fixed-length windows at a fixed rate
3. Classifies each window with an ONNX model (or a fixed stub)
4. Prints the winning class and its probability

Examples:
    imu-gesture run --simulate --stub-probs 0.9,0.05,0.05 --cycles 3
    imu-gesture run --replay capture.csv --model gesture_model.onnx --classes classes.json
    imu-gesture record --simulate --out IdleData.csv --samples 1000
    imu-gesture calibrate --replay capture.csv --out offsets.json
*/

use anyhow::{bail, ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use imu_gesture::calibrate;
use imu_gesture::classifier::{load_classes, Classifier, FixedClassifier, OnnxClassifier};
use imu_gesture::clock::{Clock, ManualClock, SystemClock};
use imu_gesture::config::PipelineConfig;
use imu_gesture::csv_loader::{ReplayLink, SampleRecorder};
use imu_gesture::pipeline::GesturePipeline;
use imu_gesture::sensor::{spawn_link, SensorLink};
use imu_gesture::simulate::{Burst, SimulatedLink};
use imu_gesture::types::AxisOffsets;
use imu_gesture::window::ReadFailurePolicy;

#[derive(Parser)]
#[command(name = "imu-gesture", about = "Calibrated IMU gesture classification")]
struct Cli {
    /// JSON pipeline configuration; missing fields take defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the sampling rate (Hz).
    #[arg(long, global = true)]
    rate: Option<u32>,

    /// Substitute the previous sample on a failed read instead of aborting the window.
    #[arg(long, global = true)]
    repeat_on_failure: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Calibrate, then classify windows continuously
    Run {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        model: ModelArgs,

        /// Stop after this many windows.
        #[arg(long)]
        cycles: Option<u64>,

        /// Skip calibration and load offsets from a JSON file.
        #[arg(long)]
        offsets: Option<PathBuf>,
    },
    /// Estimate axis offsets and print them as JSON
    Calibrate {
        #[command(flatten)]
        source: SourceArgs,

        /// Also write the offsets to this file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Record bias-corrected samples (g, deg/s) for training
    Record {
        #[command(flatten)]
        source: SourceArgs,

        /// Output CSV, one AccelX..GyroZ row per sample, no header.
        #[arg(long)]
        out: PathBuf,

        /// Samples to record.
        #[arg(long, default_value_t = 1000)]
        samples: usize,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Replay raw readings from a CSV capture.
    #[arg(long, conflicts_with = "simulate")]
    replay: Option<PathBuf>,

    /// Start over at the end of the replay file.
    #[arg(long = "loop", requires = "replay")]
    looping: bool,

    /// Use a simulated stationary sensor.
    #[arg(long)]
    simulate: bool,

    /// Seed for the simulated sensor.
    #[arg(long, requires = "simulate")]
    seed: Option<u64>,

    /// Add a periodic punch-like burst to the simulated sensor.
    #[arg(long, requires = "simulate")]
    punch: bool,

    /// Run on virtual time: no real waiting between samples.
    #[arg(long)]
    fast: bool,
}

#[derive(Args)]
struct ModelArgs {
    /// ONNX model taking [1, N * 6] and returning one score per class.
    #[arg(long, conflicts_with = "stub_probs")]
    model: Option<PathBuf>,

    /// Labels file: {"index_to_class": {"0": "IDLE", ...}}.
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Fixed probabilities instead of a model, e.g. 0.9,0.05,0.05.
    #[arg(long, value_delimiter = ',')]
    stub_probs: Option<Vec<f32>>,
}

type DynLink = Box<dyn SensorLink + Send>;
type DynClock = Box<dyn Clock>;

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json(path)
            .with_context(|| format!("Cannot load config {:?}", path))?,
        None => PipelineConfig::default(),
    };
    if let Some(rate) = cli.rate {
        config.sample_rate_hz = rate;
    }
    if cli.repeat_on_failure {
        config.read_failure_policy = ReadFailurePolicy::RepeatLastSample;
    }
    config.validate()?;
    Ok(config)
}

/// Builds the sensor link and the clock that paces it.
///
/// On real time the source runs on its own thread and is read through a
/// channel with the configured timeout, like a bus transport would be.
fn open_source(source: &SourceArgs, config: &PipelineConfig) -> Result<(DynLink, DynClock)> {
    let link: DynLink = if let Some(path) = &source.replay {
        let replay = ReplayLink::from_csv(path, source.looping)?;
        info!(path = %path.display(), readings = replay.remaining(), "replaying capture");
        Box::new(replay)
    } else if source.simulate {
        let mut sim = SimulatedLink::new(source.seed)
            .with_bias([220, -140, 310, -45, 18, 9])
            .with_noise(60)
            .with_vertical_axis(config.vertical_axis);
        if source.punch {
            sim = sim.with_burst(Burst {
                every: 150,
                len: 20,
                accel_amp: 14000,
                gyro_amp: 12000,
            });
        }
        Box::new(sim)
    } else {
        bail!("No sensor source: pass --replay <csv> or --simulate");
    };

    if source.fast {
        return Ok((link, Box::new(ManualClock::new())));
    }

    let (channel, _transport) = spawn_link(link, config.period(), config.read_timeout());
    Ok((Box::new(channel), Box::new(SystemClock::new())))
}

fn open_classifier(model: &ModelArgs, config: &mut PipelineConfig) -> Result<Box<dyn Classifier>> {
    if let Some(path) = &model.classes {
        let labels = load_classes(path).with_context(|| format!("Cannot load {:?}", path))?;
        ensure!(
            labels.len() == config.num_classes,
            "{:?} has {} labels, config expects {}",
            path,
            labels.len(),
            config.num_classes
        );
        config.labels = labels;
    }

    if let Some(path) = &model.model {
        println!("🔧 Loading ONNX classifier...");
        let onnx = OnnxClassifier::new(path)
            .with_context(|| format!("Cannot load model {:?}", path))?;
        println!("✅ Classifier loaded\n");
        return Ok(Box::new(onnx));
    }

    if let Some(probs) = &model.stub_probs {
        return Ok(Box::new(FixedClassifier::new(config.feature_len(), probs.clone())));
    }

    bail!("No classifier: pass --model <onnx> or --stub-probs");
}

fn read_offsets(path: &Path) -> Result<AxisOffsets> {
    let content = fs::read_to_string(path).with_context(|| format!("Cannot read {:?}", path))?;
    Ok(serde_json::from_str(&content)?)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match &cli.command {
        Command::Run {
            source,
            model,
            cycles,
            offsets,
        } => {
            println!("🎯 Gesture Recognition - IMU + ONNX\n");
            let classifier = open_classifier(model, &mut config)?;
            let (link, clock) = open_source(source, &config)?;

            let mut pipeline = GesturePipeline::new(config, link, classifier, clock)?;
            if let Some(path) = offsets {
                pipeline = pipeline.with_offsets(read_offsets(path)?);
            } else {
                println!("🧭 Calibrating, keep the sensor still...");
                pipeline.calibrate()?;
                println!("✅ Calibration done\n");
            }

            println!("🎬 Recording gestures...\n");
            let reported = pipeline.run(*cycles, |report| {
                println!("{}", report);
            })?;

            let stats = pipeline.stats();
            println!(
                "\n📊 {} reports, {} windows, {} aborted, {} overruns",
                reported, stats.windows, stats.aborted, stats.overruns
            );
        }
        Command::Calibrate { source, out } => {
            let (mut link, _clock) = open_source(source, &config)?;
            let offsets = calibrate(&mut link, &config.calibration_params())?;
            let json = serde_json::to_string_pretty(&offsets)?;
            println!("{}", json);
            if let Some(path) = out {
                fs::write(path, &json).with_context(|| format!("Cannot write {:?}", path))?;
            }
        }
        Command::Record {
            source,
            out,
            samples,
        } => {
            let (mut link, clock) = open_source(source, &config)?;
            let offsets = calibrate(&mut link, &config.calibration_params())?;

            let mut recorder = SampleRecorder::create(out)?;
            println!("⏺️  Recording {} samples to {:?}", samples, out);
            recorder.capture(
                &mut link,
                &offsets,
                &config.sensitivity(),
                config.period(),
                &clock,
                *samples,
            )?;
            let rows = recorder.finish()?;
            let seconds = rows as f64 * config.period().as_secs_f64();
            println!("✅ {} rows ({:.1}s)", rows, seconds);
        }
    }

    Ok(())
}
