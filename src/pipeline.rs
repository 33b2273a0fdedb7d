//! Calibrate once, then collect -> classify -> decide, one window at a time.

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::calibration::calibrate;
use crate::classifier::{check_shapes, predict_checked, Classifier};
use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::decision::pick_with_floor;
use crate::error::{ClassifierError, PipelineError};
use crate::sensor::SensorLink;
use crate::types::{AxisOffsets, ClassProbabilities, Decision};
use crate::window::{WindowCollector, WindowStats};

/// Outcome of one classification cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub decision: Decision,
    pub label: String,
    pub probabilities: ClassProbabilities,
    /// Wall-clock time spent collecting and classifying the window
    pub duration: Duration,
    /// Sampling overruns inside this window
    pub overruns: u64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Class: {} (Prob: {:.2})",
            self.label, self.decision.probability
        )
    }
}

pub struct GesturePipeline<L, C, K> {
    config: PipelineConfig,
    link: L,
    classifier: C,
    clock: K,
    collector: WindowCollector,
    offsets: Option<AxisOffsets>,
}

impl<L, C, K> GesturePipeline<L, C, K>
where
    L: SensorLink,
    C: Classifier,
    K: Clock,
{
    /// Validates the configuration against the classifier. Any mismatch is
    /// fatal here, before the sensor is touched.
    pub fn new(
        config: PipelineConfig,
        link: L,
        classifier: C,
        clock: K,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        check_shapes(&classifier, &config)?;

        let collector = WindowCollector::new(config.window_params());
        Ok(Self {
            config,
            link,
            classifier,
            clock,
            collector,
            offsets: None,
        })
    }

    /// Uses previously computed offsets instead of calibrating.
    pub fn with_offsets(mut self, offsets: AxisOffsets) -> Self {
        self.offsets = Some(offsets);
        self
    }

    pub fn offsets(&self) -> Option<&AxisOffsets> {
        self.offsets.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.offsets.is_some()
    }

    pub fn stats(&self) -> WindowStats {
        self.collector.stats()
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Runs the stationary calibration and keeps the result.
    pub fn calibrate(&mut self) -> Result<AxisOffsets, PipelineError> {
        let offsets = calibrate(&mut self.link, &self.config.calibration_params())?;
        self.offsets = Some(offsets);
        Ok(offsets)
    }

    /// Collects one window and classifies it.
    pub fn classify_once(&mut self) -> Result<Report, PipelineError> {
        let offsets = self.offsets.ok_or(PipelineError::Uncalibrated)?;

        let started = self.clock.now();
        let overruns_before = self.collector.stats().overruns;

        debug!("recording gesture");
        let window = self.collector.collect(&mut self.link, &offsets, &self.clock)?;
        let probabilities =
            predict_checked(&mut self.classifier, &window, self.config.num_classes)?;

        let decision = pick_with_floor(&probabilities, self.config.decision_floor)
            .ok_or(ClassifierError::EmptyProbabilities)?;

        let report = Report {
            label: self.config.label(decision.class_index),
            decision,
            probabilities,
            duration: self.clock.now().saturating_sub(started),
            overruns: self.collector.stats().overruns - overruns_before,
        };
        debug!(
            label = %report.label,
            probability = report.decision.probability,
            overruns = report.overruns,
            "window classified"
        );
        Ok(report)
    }

    /// Classifies windows until `max_cycles` windows have been classified, or
    /// forever when `None`. Returns how many reports reached `on_report`.
    ///
    /// An aborted window is retried; after `max_consecutive_failures` aborted
    /// windows in a row the sensor is recalibrated. Calibration, classifier
    /// and configuration errors end the run. Reports below `min_confidence`
    /// are dropped.
    pub fn run<F>(
        &mut self,
        max_cycles: Option<u64>,
        mut on_report: F,
    ) -> Result<u64, PipelineError>
    where
        F: FnMut(&Report),
    {
        if self.offsets.is_none() {
            self.calibrate()?;
        }

        let mut reported = 0u64;
        let mut cycles = 0u64;
        let mut consecutive_failures = 0u32;

        while max_cycles.map_or(true, |max| cycles < max) {
            match self.classify_once() {
                Ok(report) => {
                    cycles += 1;
                    consecutive_failures = 0;
                    if report.decision.probability < self.config.min_confidence {
                        debug!(%report, "below confidence threshold");
                        continue;
                    }
                    on_report(&report);
                    reported += 1;
                }
                Err(PipelineError::Window(e)) => {
                    consecutive_failures += 1;
                    warn!(failures = consecutive_failures, "window aborted: {}", e);
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        info!("too many aborted windows, recalibrating");
                        self.offsets = None;
                        self.calibrate()?;
                        consecutive_failures = 0;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let stats = self.collector.stats();
        info!(
            windows = stats.windows,
            aborted = stats.aborted,
            overruns = stats.overruns,
            substituted = stats.substituted,
            "run finished"
        );
        Ok(reported)
    }
}
