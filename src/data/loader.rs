// ============================================================
// Layer 4 — CSV Record Loaders
// ============================================================
// Reads the two raw exports the experiment starts from:
//
//   tasks.csv   subject,skill,correct,start_time,end_time
//   eeg.csv     subject,start_time,end_time,sigqual,rawwave
//
// Timestamps are either plain seconds ("1389300000.5") or text
// in the configured chrono format ("01/09/14 10:15 AM" with
// "%m/%d/%y %I:%M %p"). `rawwave` is a space-separated list of
// raw samples, reduced to band powers on load.

use std::{io, path::{Path, PathBuf}};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::data::spectral::{SpectralAnalyzer, SpectralConfig};
use crate::domain::records::{EegEpoch, TaskRecord};
use crate::domain::traits::{EegSource, TaskSource};

pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct TaskRow {
    subject:    String,
    skill:      String,
    correct:    String,
    start_time: String,
    end_time:   String,
}

#[derive(Debug, Deserialize)]
struct EegRow {
    subject:    String,
    start_time: String,
    end_time:   String,
    sigqual:    u32,
    rawwave:    String,
}

/// Loads task attempts from a CSV file.
pub struct CsvTaskLoader {
    path:        PathBuf,
    time_format: String,
}

impl CsvTaskLoader {
    pub fn new(path: impl AsRef<Path>, time_format: impl Into<String>) -> Self {
        Self { path: path.as_ref().to_path_buf(), time_format: time_format.into() }
    }
}

impl TaskSource for CsvTaskLoader {
    fn load_tasks(&self) -> Result<Vec<TaskRecord>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Cannot open task file '{}'", self.path.display()))?;
        let tasks = read_tasks(file, &self.time_format)
            .with_context(|| format!("Bad task file '{}'", self.path.display()))?;
        tracing::info!("Loaded {} task records from '{}'", tasks.len(), self.path.display());
        Ok(tasks)
    }
}

/// Loads EEG epochs from a CSV file, converting raw waves to band powers.
pub struct CsvEegLoader {
    path:        PathBuf,
    time_format: String,
    spectral:    SpectralConfig,
}

impl CsvEegLoader {
    pub fn new(
        path:        impl AsRef<Path>,
        time_format: impl Into<String>,
        spectral:    SpectralConfig,
    ) -> Self {
        Self {
            path:        path.as_ref().to_path_buf(),
            time_format: time_format.into(),
            spectral,
        }
    }
}

impl EegSource for CsvEegLoader {
    fn load_epochs(&self) -> Result<Vec<EegEpoch>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Cannot open EEG file '{}'", self.path.display()))?;
        let epochs = read_epochs(file, &self.time_format, &self.spectral)
            .with_context(|| format!("Bad EEG file '{}'", self.path.display()))?;
        tracing::info!("Loaded {} EEG epochs from '{}'", epochs.len(), self.path.display());
        Ok(epochs)
    }
}

pub fn read_tasks<R: io::Read>(reader: R, time_format: &str) -> Result<Vec<TaskRecord>> {
    let mut rdr   = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut tasks = Vec::new();

    for (i, row) in rdr.deserialize::<TaskRow>().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = i + 2;
        let row  = row.with_context(|| format!("line {line}"))?;
        let task = TaskRecord::new(
            row.subject,
            row.skill,
            parse_correct(&row.correct).with_context(|| format!("line {line}"))?,
            parse_timestamp(&row.start_time, time_format).with_context(|| format!("line {line}"))?,
            parse_timestamp(&row.end_time, time_format).with_context(|| format!("line {line}"))?,
        )
        .with_context(|| format!("line {line}"))?;
        tasks.push(task);
    }

    Ok(tasks)
}

pub fn read_epochs<R: io::Read>(
    reader:      R,
    time_format: &str,
    spectral:    &SpectralConfig,
) -> Result<Vec<EegEpoch>> {
    let mut analyzer = SpectralAnalyzer::new(spectral.clone());
    let mut rdr      = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut epochs   = Vec::new();

    for (i, row) in rdr.deserialize::<EegRow>().enumerate() {
        let line = i + 2;
        let row  = row.with_context(|| format!("line {line}"))?;
        let samples = parse_wave(&row.rawwave).with_context(|| format!("line {line}"))?;
        let epoch = EegEpoch::new(
            row.subject,
            parse_timestamp(&row.start_time, time_format).with_context(|| format!("line {line}"))?,
            parse_timestamp(&row.end_time, time_format).with_context(|| format!("line {line}"))?,
            row.sigqual,
            analyzer.band_powers(&samples),
        )
        .with_context(|| format!("line {line}"))?;
        epochs.push(epoch);
    }

    Ok(epochs)
}

/// Seconds since the Unix epoch, from either a number or `format`.
/// A non-default format is tried first, so all-digit formats such as
/// `%Y%m%d%H%M%S` aren't read as plain seconds.
pub fn parse_timestamp(s: &str, format: &str) -> Result<f64> {
    let from_format = || {
        NaiveDateTime::parse_from_str(s, format)
            .map(|dt| dt.and_utc().timestamp_millis() as f64 / 1000.0)
    };
    if format != DEFAULT_TIME_FORMAT {
        if let Ok(secs) = from_format() {
            return Ok(secs);
        }
    }
    if let Ok(secs) = s.parse::<f64>() {
        if !secs.is_finite() {
            bail!("'{s}' is not a finite timestamp");
        }
        return Ok(secs);
    }
    from_format().map_err(|e| anyhow!("cannot parse time '{s}' with format '{format}': {e}"))
}

fn parse_correct(s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes"  => Ok(true),
        "0" | "false" | "no"  => Ok(false),
        other => bail!("'{other}' is not a correctness label"),
    }
}

fn parse_wave(s: &str) -> Result<Vec<f64>> {
    s.split_whitespace()
        .map(|v| v.parse::<f64>().map_err(|e| anyhow!("bad sample '{v}': {e}")))
        .collect()
}
