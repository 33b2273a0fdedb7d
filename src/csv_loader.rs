use std::fs::File;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, Writer, WriterBuilder};

use crate::clock::Clock;
use crate::error::SensorError;
use crate::normalize::{normalize, Sensitivity};
use crate::sensor::SensorLink;
use crate::types::{AxisOffsets, NormalizedSample, RawReading, AXES};

/// Header of raw capture files
pub const RAW_HEADER: [&str; AXES] = [
    "accel_x", "accel_y", "accel_z", "gyro_x", "gyro_y", "gyro_z",
];

/// Loads raw readings from a CSV with header
/// accel_x,accel_y,accel_z,gyro_x,gyro_y,gyro_z
pub fn load_readings_from_csv(path: impl AsRef<Path>) -> Result<Vec<RawReading>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Cannot open CSV {:?}", path))?;

    let mut readings = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Invalid row {} in {:?}", row_idx + 1, path))?;
        if record.len() < AXES {
            bail!(
                "Row {} has {} columns, expected {}",
                row_idx + 1,
                record.len(),
                AXES
            );
        }

        let mut values = [0i16; AXES];
        for (axis, value) in values.iter_mut().enumerate() {
            *value = record[axis].parse().with_context(|| {
                format!("Invalid {} in row {}", RAW_HEADER[axis], row_idx + 1)
            })?;
        }
        readings.push(RawReading::from_array(values));
    }

    if readings.is_empty() {
        return Err(anyhow!("CSV {:?} contains no readings", path));
    }

    Ok(readings)
}

/// Writes raw readings in the format `load_readings_from_csv` reads back.
pub fn write_readings_csv(path: impl AsRef<Path>, readings: &[RawReading]) -> Result<()> {
    let path = path.as_ref();
    let mut writer =
        Writer::from_path(path).with_context(|| format!("Cannot create CSV {:?}", path))?;
    writer.write_record(RAW_HEADER)?;
    for reading in readings {
        writer.write_record(reading.to_array().iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Replays recorded readings as a sensor link.
pub struct ReplayLink {
    readings: Vec<RawReading>,
    cursor: usize,
    looping: bool,
}

impl ReplayLink {
    pub fn new(readings: Vec<RawReading>, looping: bool) -> Self {
        Self {
            readings,
            cursor: 0,
            looping,
        }
    }

    pub fn from_csv(path: impl AsRef<Path>, looping: bool) -> Result<Self> {
        Ok(Self::new(load_readings_from_csv(path)?, looping))
    }

    pub fn remaining(&self) -> usize {
        self.readings.len().saturating_sub(self.cursor)
    }
}

impl SensorLink for ReplayLink {
    fn read_raw(&mut self) -> Result<RawReading, SensorError> {
        if self.cursor >= self.readings.len() {
            if !self.looping || self.readings.is_empty() {
                return Err(SensorError::Exhausted);
            }
            self.cursor = 0;
        }
        let reading = self.readings[self.cursor];
        self.cursor += 1;
        Ok(reading)
    }
}

/// Writes samples in g and deg/s as headerless rows
/// AccelX,AccelY,AccelZ,GyroX,GyroY,GyroZ, the layout training data is kept in.
pub struct SampleRecorder {
    writer: Writer<File>,
    rows: usize,
}

impl SampleRecorder {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let writer = WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_context(|| format!("Cannot create CSV {:?}", path))?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn record(&mut self, sample: &NormalizedSample) -> Result<()> {
        self.writer
            .write_record(sample.to_array().iter().map(|v| format!("{:.6}", v)))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Samples `count` readings at a fixed `period`, bias-corrected and in
    /// physical units, and appends them to the file.
    pub fn capture<L, K>(
        &mut self,
        link: &mut L,
        offsets: &AxisOffsets,
        sensitivity: &Sensitivity,
        period: Duration,
        clock: &K,
        count: usize,
    ) -> Result<usize>
    where
        L: SensorLink + ?Sized,
        K: Clock + ?Sized,
    {
        for i in 0..count {
            let start_time = clock.now();
            let raw = link
                .read_raw()
                .with_context(|| format!("Read {} of {} failed", i + 1, count))?;
            self.record(&normalize(&raw, offsets, sensitivity))?;
            clock.sleep_until(start_time + period);
        }
        Ok(count)
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}
