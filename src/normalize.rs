use serde::{Deserialize, Serialize};

use crate::types::{
    AxisOffsets, NormalizedSample, RawReading, ACCEL_RANGE, ACCEL_SENSITIVITY, GYRO_RANGE,
    GYRO_SENSITIVITY,
};

/// Raw units per physical unit, fixed by the sensor's full-scale setting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sensitivity {
    /// Raw units per g
    pub accel: f32,
    /// Raw units per deg/s
    pub gyro: f32,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            accel: ACCEL_SENSITIVITY,
            gyro: GYRO_SENSITIVITY,
        }
    }
}

/// Second-stage scaling into the value range the model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelInputScale {
    pub accel_range: f32,
    pub gyro_range: f32,
}

impl Default for ModelInputScale {
    fn default() -> Self {
        Self {
            accel_range: ACCEL_RANGE,
            gyro_range: GYRO_RANGE,
        }
    }
}

impl ModelInputScale {
    pub fn apply(&self, sample: &NormalizedSample) -> NormalizedSample {
        NormalizedSample {
            accel: sample.accel.map(|a| a / self.accel_range),
            gyro: sample.gyro.map(|g| g / self.gyro_range),
        }
    }
}

/// Removes the bias and converts to g and deg/s.
pub fn normalize(
    raw: &RawReading,
    offsets: &AxisOffsets,
    sensitivity: &Sensitivity,
) -> NormalizedSample {
    NormalizedSample {
        accel: [
            (raw.accel_x as f32 - offsets.accel_x) / sensitivity.accel,
            (raw.accel_y as f32 - offsets.accel_y) / sensitivity.accel,
            (raw.accel_z as f32 - offsets.accel_z) / sensitivity.accel,
        ],
        gyro: [
            (raw.gyro_x as f32 - offsets.gyro_x) / sensitivity.gyro,
            (raw.gyro_y as f32 - offsets.gyro_y) / sensitivity.gyro,
            (raw.gyro_z as f32 - offsets.gyro_z) / sensitivity.gyro,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AXES;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn at_rest_reads_one_g_on_vertical_axis() {
        let offsets = AxisOffsets::from_array([12.0, -8.0, -40.0, 3.0, -2.0, 1.0]);
        let raw = RawReading::new([12, -8, 16344], [3, -2, 1]);

        let sample = normalize(&raw, &offsets, &Sensitivity::default());

        assert_relative_eq!(sample.accel[0], 0.0);
        assert_relative_eq!(sample.accel[1], 0.0);
        assert_relative_eq!(sample.accel[2], 1.0);
        for g in sample.gyro {
            assert_relative_eq!(g, 0.0);
        }
    }

    #[test]
    fn full_scale_gyro_reads_250_dps() {
        let raw = RawReading::new([0, 0, 0], [32750, 0, -32750]);
        let sample = normalize(&raw, &AxisOffsets::zero(), &Sensitivity::default());
        assert_relative_eq!(sample.gyro[0], 250.0);
        assert_relative_eq!(sample.gyro[2], -250.0);
    }

    #[test]
    fn model_scale_divides_by_training_ranges() {
        let sample = NormalizedSample {
            accel: [2.0, -1.0, 1.0],
            gyro: [500.0, 0.0, -2000.0],
        };
        let scaled = ModelInputScale::default().apply(&sample);
        assert_eq!(scaled.accel, [0.5, -0.25, 0.25]);
        assert_eq!(scaled.gyro, [0.25, 0.0, -1.0]);
    }

    fn offsets_strategy() -> impl Strategy<Value = AxisOffsets> {
        prop::array::uniform6(-2000.0f32..2000.0).prop_map(AxisOffsets::from_array)
    }

    proptest! {
        #[test]
        fn normalize_is_linear_in_raw(
            base in prop::array::uniform6(-16000i16..16000),
            axis in 0usize..AXES,
            k in -8000i16..8000,
            offsets in offsets_strategy(),
        ) {
            let sensitivity = Sensitivity::default();
            let raw = RawReading::from_array(base);
            let mut shifted_values = base;
            shifted_values[axis] += k;
            let shifted = RawReading::from_array(shifted_values);

            let a = normalize(&raw, &offsets, &sensitivity).to_array();
            let b = normalize(&shifted, &offsets, &sensitivity).to_array();

            let scale = if axis < 3 { sensitivity.accel } else { sensitivity.gyro };
            for i in 0..AXES {
                let expected = if i == axis { k as f32 / scale } else { 0.0 };
                prop_assert!((b[i] - a[i] - expected).abs() < 1e-3,
                    "axis {} delta {} expected {}", i, b[i] - a[i], expected);
            }
        }
    }
}
