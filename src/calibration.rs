//! Stationary bias estimation.
//!
//! The device must lie still while [`calibrate`] runs. Each axis offset is the
//! mean raw reading; the vertical accelerometer axis additionally has the
//! at-rest gravity reading removed so its offset is the error only.

use tracing::{debug, info};

use crate::error::CalibrationError;
use crate::sensor::SensorLink;
use crate::types::{Axis, AxisOffsets, RawReading, AXES, CALIBRATION_SAMPLES, REST_MAGNITUDE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParams {
    /// Stationary readings to average
    pub sample_count: usize,
    /// Accelerometer axis carrying gravity at rest
    pub vertical_axis: Axis,
    /// Raw reading expected on `vertical_axis` at rest
    pub rest_magnitude: i32,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            sample_count: CALIBRATION_SAMPLES,
            vertical_axis: Axis::AccelZ,
            rest_magnitude: REST_MAGNITUDE,
        }
    }
}

/// Running per-axis sums plus the bookkeeping for the stream sanity checks.
#[derive(Debug, Default)]
struct MeanAccumulator {
    sums: [i64; AXES],
    count: usize,
    all_zero: usize,
    saturated: [usize; AXES],
}

impl MeanAccumulator {
    fn add(&mut self, raw: &RawReading) {
        let values = raw.to_array();
        for (axis, value) in values.iter().enumerate() {
            self.sums[axis] += *value as i64;
            if *value == i16::MAX || *value == i16::MIN {
                self.saturated[axis] += 1;
            }
        }
        if values.iter().all(|v| *v == 0) {
            self.all_zero += 1;
        }
        self.count += 1;
    }

    fn check(&self) -> Result<(), CalibrationError> {
        if self.all_zero == self.count {
            return Err(CalibrationError::DeadStream {
                samples: self.count,
            });
        }
        for axis in Axis::ALL {
            if self.saturated[axis.index()] == self.count {
                return Err(CalibrationError::Saturated {
                    axis,
                    samples: self.count,
                });
            }
        }
        Ok(())
    }

    fn means(&self) -> [f32; AXES] {
        let n = self.count as f64;
        self.sums.map(|sum| (sum as f64 / n) as f32)
    }
}

/// Reads `params.sample_count` readings back to back and returns the
/// per-axis bias.
///
/// Fails fast instead of publishing a corrupt offset when the stream is all
/// zeros (device asleep or missing) or an axis sits at full scale for the
/// whole run.
pub fn calibrate<L: SensorLink>(
    link: &mut L,
    params: &CalibrationParams,
) -> Result<AxisOffsets, CalibrationError> {
    if params.sample_count == 0 {
        return Err(CalibrationError::ZeroSampleCount);
    }

    info!(
        samples = params.sample_count,
        "calibrating, keep the sensor still"
    );

    let mut acc = MeanAccumulator::default();
    for _ in 0..params.sample_count {
        let raw = link.read_raw()?;
        acc.add(&raw);
    }
    acc.check()?;

    let mut means = acc.means();
    debug!(?means, "raw means");
    means[params.vertical_axis.index()] -= params.rest_magnitude as f32;

    let offsets = AxisOffsets::from_array(means);
    info!(
        accel_x = offsets.accel_x,
        accel_y = offsets.accel_y,
        accel_z = offsets.accel_z,
        gyro_x = offsets.gyro_x,
        gyro_y = offsets.gyro_y,
        gyro_z = offsets.gyro_z,
        "calibration complete"
    );
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_loader::ReplayLink;
    use crate::error::SensorError;
    use crate::simulate::SimulatedLink;
    use approx::assert_abs_diff_eq;

    fn params(sample_count: usize) -> CalibrationParams {
        CalibrationParams {
            sample_count,
            ..CalibrationParams::default()
        }
    }

    #[test]
    fn offsets_are_means_with_gravity_removed() {
        let readings = vec![
            RawReading::new([100, -50, 16400], [10, -3, 0]),
            RawReading::new([102, -52, 16410], [12, -5, 1]),
            RawReading::new([104, -54, 16420], [14, -7, 2]),
            RawReading::new([106, -56, 16430], [16, -9, 3]),
        ];
        let mut link = ReplayLink::new(readings, false);

        let offsets = calibrate(&mut link, &params(4)).unwrap();

        assert_abs_diff_eq!(offsets.accel_x, 103.0, epsilon = 1e-4);
        assert_abs_diff_eq!(offsets.accel_y, -53.0, epsilon = 1e-4);
        assert_abs_diff_eq!(offsets.accel_z, 16415.0 - 16384.0, epsilon = 1e-4);
        assert_abs_diff_eq!(offsets.gyro_x, 13.0, epsilon = 1e-4);
        assert_abs_diff_eq!(offsets.gyro_y, -6.0, epsilon = 1e-4);
        assert_abs_diff_eq!(offsets.gyro_z, 1.5, epsilon = 1e-4);
    }

    #[test]
    fn noisy_stationary_run_recovers_bias() {
        let bias = [120, -340, 95, -21, 14, 7];
        let mut link = SimulatedLink::new(Some(11)).with_bias(bias).with_noise(40);

        let offsets = calibrate(&mut link, &CalibrationParams::default()).unwrap();

        for (axis, expected) in bias.iter().enumerate() {
            assert_abs_diff_eq!(offsets.to_array()[axis], *expected as f32, epsilon = 8.0);
        }
        assert_eq!(link.reads(), CALIBRATION_SAMPLES as u64);
    }

    #[test]
    fn vertical_axis_is_configurable() {
        let mut link = SimulatedLink::new(Some(5)).with_vertical_axis(Axis::AccelY);
        let cfg = CalibrationParams {
            vertical_axis: Axis::AccelY,
            ..params(10)
        };
        let offsets = calibrate(&mut link, &cfg).unwrap();
        assert_abs_diff_eq!(offsets.axis(Axis::AccelY), 0.0);
        assert_abs_diff_eq!(offsets.axis(Axis::AccelZ), 0.0);
    }

    #[test]
    fn large_sums_do_not_overflow() {
        let readings = vec![RawReading::new([32000, 32000, 32000], [32000, 32000, 32000]); 10_000];
        let mut link = ReplayLink::new(readings, false);
        let offsets = calibrate(&mut link, &params(10_000)).unwrap();
        assert_abs_diff_eq!(offsets.accel_x, 32000.0);
        assert_abs_diff_eq!(offsets.accel_z, 32000.0 - 16384.0);
    }

    #[test]
    fn dead_stream_fails_fast() {
        let mut link = ReplayLink::new(vec![RawReading::default(); 8], false);
        let err = calibrate(&mut link, &params(8)).unwrap_err();
        assert!(matches!(err, CalibrationError::DeadStream { samples: 8 }));
    }

    #[test]
    fn saturated_axis_fails_fast() {
        let readings = vec![RawReading::new([0, 5, 16384], [0, i16::MAX, 0]); 6];
        let mut link = ReplayLink::new(readings, false);
        let err = calibrate(&mut link, &params(6)).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::Saturated {
                axis: Axis::GyroY,
                samples: 6
            }
        ));
    }

    #[test]
    fn sensor_failure_propagates() {
        let mut link = ReplayLink::new(vec![RawReading::new([1, 1, 1], [1, 1, 1]); 3], false);
        let err = calibrate(&mut link, &params(5)).unwrap_err();
        assert!(matches!(err, CalibrationError::Sensor(SensorError::Exhausted)));
    }

    #[test]
    fn zero_samples_rejected() {
        let mut link = SimulatedLink::new(Some(0));
        assert!(matches!(
            calibrate(&mut link, &params(0)),
            Err(CalibrationError::ZeroSampleCount)
        ));
    }
}
