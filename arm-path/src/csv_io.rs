//! Trajectory persistence as a flat CSV table
//!
//! # File Format
//!
//! ```text
//! t_ms,x,y
//! 0.000,137.000000,100.000000
//! 10.000,137.000000,100.260000
//! ...
//! ```
//!
//! - First line is always treated as the header and skipped on load
//! - `t_ms` is written with 3 decimals, `x`/`y` with 6 decimals
//! - Columns past the third are ignored on load
//!
//! Loading is row-tolerant: a row that does not parse is reported as a
//! [`MalformedRow`] and skipped, the rest of the file is still used. A file
//! without a single usable row is "no path", not an empty success, when
//! loaded through [`load_trajectory`].

use crate::error::{Error, Result};
use crate::types::{TimeSample, Trajectory};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

/// Header row written to every trajectory file
pub const HEADER: [&str; 3] = ["t_ms", "x", "y"];

/// File extension of trajectory files
pub const EXTENSION: &str = "csv";

/// A data row that was skipped during load
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRow {
    /// 1-based line number in the source (0 if unknown)
    pub line: u64,
    pub reason: String,
}

/// Result of reading a trajectory table
#[derive(Debug, Clone, Default)]
pub struct LoadedTrajectory {
    pub trajectory: Trajectory,
    pub malformed: Vec<MalformedRow>,
}

/// Read a trajectory table from any reader.
///
/// Malformed rows are collected rather than failing the whole read. Only
/// underlying I/O failures are returned as errors. The returned trajectory
/// may be empty.
pub fn read_trajectory<R: Read>(reader: R) -> Result<LoadedTrajectory> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut loaded = LoadedTrajectory::default();

    for record in csv_reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                loaded.malformed.push(MalformedRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let line = record.position().map_or(0, |p| p.line());
        match parse_row(&record) {
            Ok(sample) => loaded.trajectory.push(sample),
            Err(reason) => loaded.malformed.push(MalformedRow { line, reason }),
        }
    }

    Ok(loaded)
}

fn parse_row(record: &csv::StringRecord) -> std::result::Result<TimeSample, String> {
    if record.len() < 3 {
        return Err(format!("expected 3 fields, found {}", record.len()));
    }

    let field = |i: usize, name: &str| -> std::result::Result<f64, String> {
        let raw = &record[i];
        let value: f64 = raw
            .parse()
            .map_err(|_| format!("{} is not a number: {:?}", name, raw))?;
        if !value.is_finite() {
            return Err(format!("{} is not finite: {:?}", name, raw));
        }
        Ok(value)
    };

    let t_ms = field(0, "t_ms")?;
    if t_ms < 0.0 {
        return Err(format!("t_ms is negative: {}", t_ms));
    }

    Ok(TimeSample::new(t_ms, field(1, "x")?, field(2, "y")?))
}

/// Load a trajectory file.
///
/// Skipped rows are logged. Fails with [`Error::NoUsableSamples`] when the
/// file has no usable row at all.
pub fn load_trajectory(path: impl AsRef<Path>) -> Result<Trajectory> {
    let path = path.as_ref();
    let loaded = read_trajectory(File::open(path)?)?;

    for row in &loaded.malformed {
        log::warn!(
            "{}: skipping malformed row at line {}: {}",
            path.display(),
            row.line,
            row.reason
        );
    }

    if loaded.trajectory.is_empty() {
        return Err(Error::NoUsableSamples(path.to_path_buf()));
    }

    log::info!(
        "Loaded {} samples from {} ({} rows skipped)",
        loaded.trajectory.len(),
        path.display(),
        loaded.malformed.len()
    );

    Ok(loaded.trajectory)
}

/// Write a trajectory table to any writer
pub fn write_trajectory<W: Write>(writer: W, samples: &[TimeSample]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(HEADER)?;
    for s in samples {
        csv_writer.write_record([
            format!("{:.3}", s.t_ms),
            format!("{:.6}", s.x),
            format!("{:.6}", s.y),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Save a trajectory file, creating parent directories as needed
pub fn save_trajectory(path: impl AsRef<Path>, samples: &[TimeSample]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_trajectory(File::create(path)?, samples)?;
    log::info!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

/// Save a copy of the trajectory in `src` to `dst`, returning its sample count.
///
/// The copy goes through load and save, so malformed rows are dropped and
/// values are rewritten at file precision. An existing `dst` is only
/// replaced when `overwrite` is set.
pub fn copy_trajectory(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    overwrite: bool,
) -> Result<usize> {
    let dst = dst.as_ref();
    if dst.exists() && !overwrite {
        return Err(Error::AlreadyExists(dst.to_path_buf()));
    }
    let trajectory = load_trajectory(src)?;
    save_trajectory(dst, &trajectory)?;
    Ok(trajectory.len())
}

/// Sorted names of the trajectory files in `dir`.
///
/// A missing directory yields an empty list.
pub fn list_trajectory_files(dir: impl AsRef<Path>) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.push(name.to_string());
        }
    }
    files.sort();
    Ok(files)
}
