use serde::{Deserialize, Serialize};
use std::fmt;

/// Axes per sample: [ax, ay, az, gx, gy, gz]
pub const AXES: usize = 6;

/// Reference system constants
pub const SAMPLE_RATE_HZ: u32 = 50;
pub const SAMPLES_PER_GESTURE: usize = 50;
pub const NUM_CLASSES: usize = 3; // IDLE, PUNCH, WAVE
pub const CALIBRATION_SAMPLES: usize = 250;
pub const ACCEL_SENSITIVITY: f32 = 16384.0; // raw units per g at ±2g
pub const GYRO_SENSITIVITY: f32 = 131.0; // raw units per deg/s at ±250 deg/s
pub const ACCEL_RANGE: f32 = 4.0;
pub const GYRO_RANGE: f32 = 2000.0;
pub const REST_MAGNITUDE: i32 = 16384; // raw reading of 1g on the vertical axis
pub const TOTAL_WINDOW_FEATURES: usize = SAMPLES_PER_GESTURE * AXES; // 300

pub const DEFAULT_LABELS: [&str; NUM_CLASSES] = ["IDLE", "PUNCH", "WAVE"];

/// Sensor axis, in wire and feature order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    AccelX,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
}

impl Axis {
    pub const ALL: [Axis; AXES] = [
        Axis::AccelX,
        Axis::AccelY,
        Axis::AccelZ,
        Axis::GyroX,
        Axis::GyroY,
        Axis::GyroZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_accel(self) -> bool {
        matches!(self, Axis::AccelX | Axis::AccelY | Axis::AccelZ)
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::AccelX => "accel_x",
            Axis::AccelY => "accel_y",
            Axis::AccelZ => "accel_z",
            Axis::GyroX => "gyro_x",
            Axis::GyroY => "gyro_y",
            Axis::GyroZ => "gyro_z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One burst read from the IMU, in native sensor units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReading {
    pub accel_x: i16,
    pub accel_y: i16,
    pub accel_z: i16,
    pub gyro_x: i16,
    pub gyro_y: i16,
    pub gyro_z: i16,
}

impl RawReading {
    pub fn new(accel: [i16; 3], gyro: [i16; 3]) -> Self {
        Self {
            accel_x: accel[0],
            accel_y: accel[1],
            accel_z: accel[2],
            gyro_x: gyro[0],
            gyro_y: gyro[1],
            gyro_z: gyro[2],
        }
    }

    /// Values in axis order [ax, ay, az, gx, gy, gz]
    pub fn to_array(&self) -> [i16; AXES] {
        [
            self.accel_x,
            self.accel_y,
            self.accel_z,
            self.gyro_x,
            self.gyro_y,
            self.gyro_z,
        ]
    }

    pub fn from_array(values: [i16; AXES]) -> Self {
        Self::new(
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
        )
    }

    pub fn axis(&self, axis: Axis) -> i16 {
        self.to_array()[axis.index()]
    }
}

/// Per-axis bias in raw sensor units.
///
/// Produced by calibration and then treated as immutable; pass it by
/// reference into normalization and window collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisOffsets {
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
}

impl AxisOffsets {
    /// Zero bias. Safe but biased; only meant for tests and replays of
    /// data that was already corrected.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_array(values: [f32; AXES]) -> Self {
        Self {
            accel_x: values[0],
            accel_y: values[1],
            accel_z: values[2],
            gyro_x: values[3],
            gyro_y: values[4],
            gyro_z: values[5],
        }
    }

    pub fn to_array(&self) -> [f32; AXES] {
        [
            self.accel_x,
            self.accel_y,
            self.accel_z,
            self.gyro_x,
            self.gyro_y,
            self.gyro_z,
        ]
    }

    pub fn axis(&self, axis: Axis) -> f32 {
        self.to_array()[axis.index()]
    }
}

/// A reading in physical units: accel in g, gyro in deg/s
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NormalizedSample {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
}

impl NormalizedSample {
    pub fn to_array(&self) -> [f32; AXES] {
        [
            self.accel[0],
            self.accel[1],
            self.accel[2],
            self.gyro[0],
            self.gyro[1],
            self.gyro[2],
        ]
    }

    /// Writes the six values into a flat buffer at `time_idx * AXES`.
    /// Layout: [t][axis]
    pub fn write_into(&self, output: &mut [f32], time_idx: usize) {
        let base_idx = time_idx * AXES;
        output[base_idx..base_idx + AXES].copy_from_slice(&self.to_array());
    }
}

/// One gesture window flattened time-major, axis-minor: [N * 6]
pub type FeatureWindow = Vec<f32>;

/// One score per gesture class, in model output order
pub type ClassProbabilities = Vec<f32>;

/// Winning class of one classification cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decision {
    pub class_index: usize,
    pub probability: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_order_matches_reading_layout() {
        let raw = RawReading::new([1, 2, 3], [4, 5, 6]);
        for (i, axis) in Axis::ALL.iter().enumerate() {
            assert_eq!(axis.index(), i);
            assert_eq!(raw.axis(*axis), i as i16 + 1);
        }
        assert_eq!(RawReading::from_array(raw.to_array()), raw);
    }

    #[test]
    fn write_into_uses_time_major_offset() {
        let sample = NormalizedSample {
            accel: [1.0, 2.0, 3.0],
            gyro: [4.0, 5.0, 6.0],
        };
        let mut flat = vec![0.0; 3 * AXES];
        sample.write_into(&mut flat, 1);

        assert!(flat[..AXES].iter().all(|v| *v == 0.0));
        assert_eq!(&flat[AXES..2 * AXES], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(flat[2 * AXES..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn only_accel_axes_report_accel() {
        assert!(Axis::AccelZ.is_accel());
        assert!(!Axis::GyroX.is_accel());
    }
}
