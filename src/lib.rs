//! Calibrated 6-axis IMU gesture classification.
//!
//! An MPU-6050 style sensor is calibrated while stationary, then sampled at a
//! fixed rate into windows of normalized readings. Each window is flattened
//! time-major and handed to an opaque classifier; the most probable class is
//! reported.
//!
//! ```no_run
//! use imu_gesture::{
//!     classifier::FixedClassifier, clock::SystemClock, config::PipelineConfig,
//!     pipeline::GesturePipeline, simulate::SimulatedLink,
//! };
//!
//! let link = SimulatedLink::new(Some(7)).with_noise(30);
//! let model = FixedClassifier::new(300, vec![0.9, 0.05, 0.05]);
//! let mut pipeline =
//!     GesturePipeline::new(PipelineConfig::default(), link, model, SystemClock::new())?;
//! pipeline.run(Some(1), |report| println!("{}", report))?;
//! # Ok::<(), imu_gesture::error::PipelineError>(())
//! ```

pub mod calibration;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod csv_loader;
pub mod decision;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod sensor;
pub mod simulate;
pub mod types;
pub mod window;

pub use calibration::{calibrate, CalibrationParams};
pub use classifier::{Classifier, FixedClassifier, OnnxClassifier};
pub use config::PipelineConfig;
pub use decision::{pick, pick_with_floor, DecisionFloor};
pub use normalize::{normalize, ModelInputScale, Sensitivity};
pub use pipeline::{GesturePipeline, Report};
pub use sensor::SensorLink;
pub use types::{
    AxisOffsets, ClassProbabilities, Decision, FeatureWindow, NormalizedSample, RawReading,
};
pub use window::{collect_window, WindowCollector};
