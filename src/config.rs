//! Pipeline configuration.
//!
//! [`PipelineConfig`] gathers every constant the sampling, calibration and
//! classification stages depend on. The defaults reproduce the reference
//! device: an MPU-6050 at ±2g / ±250 deg/s, sampled at 50 Hz into 50-sample
//! windows, classified into IDLE / PUNCH / WAVE.
//!
//! The model-input range scalars must be the ones the classifier was trained
//! with. Nothing at runtime can detect a mismatch; accuracy simply drops.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::calibration::CalibrationParams;
use crate::decision::DecisionFloor;
use crate::error::ConfigError;
use crate::normalize::{ModelInputScale, Sensitivity};
use crate::types::{
    Axis, ACCEL_RANGE, ACCEL_SENSITIVITY, AXES, CALIBRATION_SAMPLES, DEFAULT_LABELS, GYRO_RANGE,
    GYRO_SENSITIVITY, NUM_CLASSES, REST_MAGNITUDE, SAMPLES_PER_GESTURE, SAMPLE_RATE_HZ,
};
use crate::window::{ReadFailurePolicy, WindowParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sampling rate in Hz. Default: **50**.
    pub sample_rate_hz: u32,
    /// Samples per gesture window. Default: **50**.
    pub samples_per_gesture: usize,
    /// Number of gesture classes the model outputs. Default: **3**.
    pub num_classes: usize,
    /// Stationary readings averaged during calibration. Default: **250**.
    pub calibration_samples: usize,

    /// Raw units per g. Default: **16384** (±2g).
    pub accel_sensitivity: f32,
    /// Raw units per deg/s. Default: **131** (±250 deg/s).
    pub gyro_sensitivity: f32,
    /// Divisor applied to g values before inference. Default: **4.0**.
    pub accel_range: f32,
    /// Divisor applied to deg/s values before inference. Default: **2000.0**.
    pub gyro_range: f32,

    /// Raw reading expected on the vertical axis at rest. Default: **16384**.
    pub rest_magnitude: i32,
    /// Accelerometer axis that carries gravity at rest. Default: **accel_z**.
    pub vertical_axis: Axis,

    /// Class labels in model output order.
    pub labels: Vec<String>,

    /// Longest wait for one sensor reading. Default: **100 ms**.
    pub read_timeout_ms: u64,
    pub read_failure_policy: ReadFailurePolicy,
    /// Aborted windows in a row before the pipeline recalibrates. Default: **3**.
    pub max_consecutive_failures: u32,

    pub decision_floor: DecisionFloor,
    /// Reports below this probability are logged but not emitted. Default: **0.0**.
    pub min_confidence: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            samples_per_gesture: SAMPLES_PER_GESTURE,
            num_classes: NUM_CLASSES,
            calibration_samples: CALIBRATION_SAMPLES,
            accel_sensitivity: ACCEL_SENSITIVITY,
            gyro_sensitivity: GYRO_SENSITIVITY,
            accel_range: ACCEL_RANGE,
            gyro_range: GYRO_RANGE,
            rest_magnitude: REST_MAGNITUDE,
            vertical_axis: Axis::AccelZ,
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            read_timeout_ms: 100,
            read_failure_policy: ReadFailurePolicy::AbortWindow,
            max_consecutive_failures: 3,
            decision_floor: DecisionFloor::Zero,
            min_confidence: 0.0,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a configuration from a JSON file.
    ///
    /// Missing fields take their default value.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: PipelineConfig = serde_json::from_str(&contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this configuration as pretty-printed JSON.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::invalid_value("sample_rate_hz", "must be > 0"));
        }
        if self.samples_per_gesture == 0 {
            return Err(ConfigError::invalid_value(
                "samples_per_gesture",
                "must be > 0",
            ));
        }
        if self.num_classes == 0 {
            return Err(ConfigError::invalid_value("num_classes", "must be > 0"));
        }
        if self.calibration_samples == 0 {
            return Err(ConfigError::invalid_value(
                "calibration_samples",
                "must be > 0",
            ));
        }

        for (field, value) in [
            ("accel_sensitivity", self.accel_sensitivity),
            ("gyro_sensitivity", self.gyro_sensitivity),
            ("accel_range", self.accel_range),
            ("gyro_range", self.gyro_range),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::invalid_value(
                    field,
                    format!("must be finite and > 0, got {}", value),
                ));
            }
        }

        if !self.vertical_axis.is_accel() {
            return Err(ConfigError::invalid_value(
                "vertical_axis",
                format!("{} is not an accelerometer axis", self.vertical_axis),
            ));
        }

        if self.labels.len() != self.num_classes {
            return Err(ConfigError::ShapeMismatch {
                what: "labels",
                expected: self.num_classes,
                actual: self.labels.len(),
            });
        }

        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::invalid_value(
                "max_consecutive_failures",
                "must be > 0",
            ));
        }

        if self.read_timeout_ms == 0 {
            return Err(ConfigError::invalid_value("read_timeout_ms", "must be > 0"));
        }

        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::invalid_value(
                "min_confidence",
                format!("must be in [0, 1], got {}", self.min_confidence),
            ));
        }

        Ok(())
    }

    /// Length of the flattened feature vector.
    pub fn feature_len(&self) -> usize {
        self.samples_per_gesture * AXES
    }

    /// Time budget of one sampling iteration.
    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.sample_rate_hz.max(1)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn sensitivity(&self) -> Sensitivity {
        Sensitivity {
            accel: self.accel_sensitivity,
            gyro: self.gyro_sensitivity,
        }
    }

    pub fn model_scale(&self) -> ModelInputScale {
        ModelInputScale {
            accel_range: self.accel_range,
            gyro_range: self.gyro_range,
        }
    }

    pub fn calibration_params(&self) -> CalibrationParams {
        CalibrationParams {
            sample_count: self.calibration_samples,
            vertical_axis: self.vertical_axis,
            rest_magnitude: self.rest_magnitude,
        }
    }

    pub fn window_params(&self) -> WindowParams {
        WindowParams {
            sample_rate_hz: self.sample_rate_hz,
            sample_count: self.samples_per_gesture,
            sensitivity: self.sensitivity(),
            scale: self.model_scale(),
            policy: self.read_failure_policy,
        }
    }

    /// Label for a class index, falling back to `class_<n>`.
    pub fn label(&self, class_index: usize) -> String {
        self.labels
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().expect("default config should be valid");
        assert_eq!(cfg.feature_len(), 300);
        assert_eq!(cfg.period(), Duration::from_millis(20));
    }

    #[test]
    fn json_round_trip() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.json");

        let original = PipelineConfig {
            sample_rate_hz: 100,
            read_failure_policy: ReadFailurePolicy::RepeatLastSample,
            ..PipelineConfig::default()
        };
        original.to_json(&path).expect("serialization should succeed");

        let loaded = PipelineConfig::from_json(&path).expect("load should succeed");
        assert_eq!(loaded, original);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("partial.json");
        std::fs::write(&path, r#"{ "sample_rate_hz": 25, "vertical_axis": "accel_y" }"#).unwrap();

        let cfg = PipelineConfig::from_json(&path).unwrap();
        assert_eq!(cfg.sample_rate_hz, 25);
        assert_eq!(cfg.vertical_axis, Axis::AccelY);
        assert_eq!(cfg.samples_per_gesture, SAMPLES_PER_GESTURE);
    }

    #[test]
    fn rejects_label_count_mismatch() {
        let cfg = PipelineConfig {
            labels: vec!["IDLE".into()],
            ..PipelineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ShapeMismatch { what: "labels", .. })
        ));
    }

    #[test]
    fn rejects_gyro_vertical_axis() {
        let cfg = PipelineConfig {
            vertical_axis: Axis::GyroZ,
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_scalars() {
        let cfg = PipelineConfig {
            gyro_range: 0.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "gyro_range", .. })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = PipelineConfig::from_json(Path::new("/nonexistent/imu.json")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
