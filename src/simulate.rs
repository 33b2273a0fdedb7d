//! Synthetic IMU for demos and bench runs without hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SensorError;
use crate::sensor::SensorLink;
use crate::types::{Axis, RawReading, AXES, REST_MAGNITUDE};

/// Periodic burst of motion laid over the stationary signal
#[derive(Debug, Clone, Copy)]
pub struct Burst {
    /// Reads between the start of two bursts
    pub every: u64,
    /// Reads a burst lasts
    pub len: u64,
    /// Raw amplitude added to accel_x during the burst
    pub accel_amp: i16,
    /// Raw amplitude added to gyro_z during the burst
    pub gyro_amp: i16,
}

/// A device lying still: fixed per-axis bias, gravity on one axis and
/// uniform noise of ±`noise` raw units.
pub struct SimulatedLink {
    rng: StdRng,
    bias: [i16; AXES],
    noise: i16,
    vertical_axis: Axis,
    burst: Option<Burst>,
    reads: u64,
}

impl SimulatedLink {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            bias: [0; AXES],
            noise: 0,
            vertical_axis: Axis::AccelZ,
            burst: None,
            reads: 0,
        }
    }

    pub fn with_bias(mut self, bias: [i16; AXES]) -> Self {
        self.bias = bias;
        self
    }

    pub fn with_noise(mut self, noise: i16) -> Self {
        self.noise = noise.saturating_abs();
        self
    }

    pub fn with_vertical_axis(mut self, axis: Axis) -> Self {
        self.vertical_axis = axis;
        self
    }

    pub fn with_burst(mut self, burst: Burst) -> Self {
        self.burst = Some(burst);
        self
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    fn in_burst(&self) -> bool {
        match self.burst {
            Some(b) if b.every > 0 => self.reads % b.every < b.len,
            _ => false,
        }
    }
}

impl SensorLink for SimulatedLink {
    fn read_raw(&mut self) -> Result<RawReading, SensorError> {
        let mut values = [0i16; AXES];
        for (i, value) in values.iter_mut().enumerate() {
            let jitter = if self.noise > 0 {
                self.rng.gen_range(-self.noise..=self.noise)
            } else {
                0
            };
            *value = self.bias[i].saturating_add(jitter);
        }

        let v = self.vertical_axis.index();
        values[v] = values[v].saturating_add(REST_MAGNITUDE as i16);

        if let Some(burst) = self.burst.filter(|_| self.in_burst()) {
            let ax = Axis::AccelX.index();
            let gz = Axis::GyroZ.index();
            values[ax] = values[ax].saturating_add(burst.accel_amp);
            values[gz] = values[gz].saturating_add(burst.gyro_amp);
        }

        self.reads += 1;
        Ok(RawReading::from_array(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noiseless_device_reads_bias_plus_gravity() {
        let mut link = SimulatedLink::new(Some(1)).with_bias([10, -20, 30, 5, -5, 0]);
        let raw = link.read_raw().unwrap();
        assert_eq!(raw, RawReading::new([10, -20, 16414], [5, -5, 0]));
    }

    #[test]
    fn noise_stays_within_bounds() {
        let mut link = SimulatedLink::new(Some(7)).with_noise(50);
        for _ in 0..500 {
            let raw = link.read_raw().unwrap();
            assert!(raw.accel_x.abs() <= 50);
            assert!((raw.accel_z as i32 - REST_MAGNITUDE).abs() <= 50);
            assert!(raw.gyro_y.abs() <= 50);
        }
    }

    #[test]
    fn most_negative_noise_is_clamped() {
        let mut link = SimulatedLink::new(Some(11)).with_noise(i16::MIN);
        for _ in 0..100 {
            let raw = link.read_raw().unwrap();
            assert!(raw.gyro_x >= -i16::MAX);
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = SimulatedLink::new(Some(42)).with_noise(100);
        let mut b = SimulatedLink::new(Some(42)).with_noise(100);
        for _ in 0..20 {
            assert_eq!(a.read_raw().unwrap(), b.read_raw().unwrap());
        }
    }

    #[test]
    fn burst_applies_periodically() {
        let mut link = SimulatedLink::new(Some(3)).with_burst(Burst {
            every: 10,
            len: 2,
            accel_amp: 8000,
            gyro_amp: 3000,
        });
        let xs: Vec<i16> = (0..12).map(|_| link.read_raw().unwrap().accel_x).collect();
        assert_eq!(xs[0], 8000);
        assert_eq!(xs[1], 8000);
        assert!(xs[2..10].iter().all(|x| *x == 0));
        assert_eq!(xs[10], 8000);
        assert_eq!(link.reads(), 12);
    }
}
