//! Error types for each pipeline boundary.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::Axis;

/// Failures reported by a sensor link.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Sensor read timed out after {waited:?}")]
    Timeout { waited: Duration },

    #[error("Sensor link disconnected")]
    Disconnected,

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Replay source exhausted")]
    Exhausted,

    #[error("Short burst: need {needed} bytes, got {got}")]
    ShortBurst { needed: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration needs at least one sample")]
    ZeroSampleCount,

    #[error("Sensor failed during calibration: {0}")]
    Sensor(#[from] SensorError),

    /// Every reading was all-zero, the device is most likely asleep or absent.
    #[error("Dead sensor stream: {samples} all-zero readings")]
    DeadStream { samples: usize },

    #[error("Axis {axis} saturated for all {samples} readings")]
    Saturated { axis: Axis, samples: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Window length or class count disagrees with the classifier.
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to read config file {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path:?}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config JSON error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid feature size: expected {expected}, got {actual}")]
    InvalidFeatureSize { expected: usize, actual: usize },

    #[error("No output tensor found")]
    NoOutputTensor,

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },

    #[error("Invalid probability count: expected {expected}, got {actual}")]
    InvalidOutputSize { expected: usize, actual: usize },

    #[error("Classifier returned no probabilities")]
    EmptyProbabilities,
}

/// A window that could not be completed.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("Window aborted at sample {sample}: {source}")]
    Sensor {
        sample: usize,
        #[source]
        source: SensorError,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Window collection requested before calibration")]
    Uncalibrated,

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}
