//! Fixed-rate window collection.
//!
//! Every iteration records its start time, reads and normalizes one sample,
//! scales it into model units, writes it at `i * AXES` and then waits out
//! whatever is left of the sampling period. An iteration that overruns its
//! budget is counted and not compensated: later samples simply drift by the
//! overrun.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::error::WindowError;
use crate::normalize::{normalize, ModelInputScale, Sensitivity};
use crate::sensor::SensorLink;
use crate::types::{
    AxisOffsets, FeatureWindow, NormalizedSample, AXES, SAMPLES_PER_GESTURE, SAMPLE_RATE_HZ,
};

/// What to do when a read fails mid-window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Drop the whole window
    #[default]
    AbortWindow,
    /// Reuse the last good sample of the same window. The first sample of a
    /// window has nothing to reuse and still aborts.
    RepeatLastSample,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowParams {
    pub sample_rate_hz: u32,
    pub sample_count: usize,
    pub sensitivity: Sensitivity,
    pub scale: ModelInputScale,
    pub policy: ReadFailurePolicy,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            sample_rate_hz: SAMPLE_RATE_HZ,
            sample_count: SAMPLES_PER_GESTURE,
            sensitivity: Sensitivity::default(),
            scale: ModelInputScale::default(),
            policy: ReadFailurePolicy::AbortWindow,
        }
    }
}

impl WindowParams {
    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.sample_rate_hz.max(1)
    }

    pub fn feature_len(&self) -> usize {
        self.sample_count * AXES
    }
}

/// Counters across all windows collected by one collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub windows: u64,
    pub aborted: u64,
    /// Iterations whose work exceeded the sampling period
    pub overruns: u64,
    /// Failed reads replaced by the previous sample
    pub substituted: u64,
}

pub struct WindowCollector {
    params: WindowParams,
    stats: WindowStats,
}

impl WindowCollector {
    pub fn new(params: WindowParams) -> Self {
        Self {
            params,
            stats: WindowStats::default(),
        }
    }

    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    /// Collects one disjoint window of `sample_count` samples.
    ///
    /// Nothing carries over from earlier windows.
    pub fn collect<L, K>(
        &mut self,
        link: &mut L,
        offsets: &AxisOffsets,
        clock: &K,
    ) -> Result<FeatureWindow, WindowError>
    where
        L: SensorLink + ?Sized,
        K: Clock + ?Sized,
    {
        let period = self.params.period();
        let mut window = vec![0.0f32; self.params.feature_len()];
        let mut last_good: Option<NormalizedSample> = None;
        let window_start = clock.now();

        for i in 0..self.params.sample_count {
            let start_time = clock.now();

            let sample = match link.read_raw() {
                Ok(raw) => {
                    let sample = normalize(&raw, offsets, &self.params.sensitivity);
                    last_good = Some(sample);
                    sample
                }
                Err(source) => match (self.params.policy, last_good) {
                    (ReadFailurePolicy::RepeatLastSample, Some(previous)) => {
                        warn!(sample = i, "read failed ({}), repeating last sample", source);
                        self.stats.substituted += 1;
                        previous
                    }
                    _ => {
                        self.stats.aborted += 1;
                        return Err(WindowError::Sensor { sample: i, source });
                    }
                },
            };

            self.params.scale.apply(&sample).write_into(&mut window, i);

            let deadline = start_time + period;
            let now = clock.now();
            if now > deadline {
                self.stats.overruns += 1;
                debug!(sample = i, overrun = ?(now - deadline), "sampling period overrun");
            }
            clock.sleep_until(deadline);
        }

        self.stats.windows += 1;
        trace!(elapsed = ?(clock.now() - window_start), "window collected");
        Ok(window)
    }
}

/// One-shot form of [`WindowCollector::collect`] with the reference
/// sensitivity and model scaling, aborting on read failure.
pub fn collect_window<L, K>(
    link: &mut L,
    offsets: &AxisOffsets,
    sample_rate_hz: u32,
    sample_count: usize,
    clock: &K,
) -> Result<FeatureWindow, WindowError>
where
    L: SensorLink + ?Sized,
    K: Clock + ?Sized,
{
    WindowCollector::new(WindowParams {
        sample_rate_hz,
        sample_count,
        ..WindowParams::default()
    })
    .collect(link, offsets, clock)
}
