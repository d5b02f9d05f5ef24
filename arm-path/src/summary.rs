//! Trajectory statistics for previews

use crate::types::TimeSample;
use std::fmt;

/// Max per-axis distance between first and last sample for a path to count as closed
pub const CLOSED_TOLERANCE: f64 = 1e-4;

/// Overview of a trajectory: size, duration, extent and closure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySummary {
    pub sample_count: usize,
    pub duration_ms: f64,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub closed: bool,
}

impl TrajectorySummary {
    /// Summarize a sample sequence, `None` if it is empty
    pub fn of(samples: &[TimeSample]) -> Option<Self> {
        let first = samples.first()?;
        let last = samples.last()?;

        let mut x_range = (f64::INFINITY, f64::NEG_INFINITY);
        let mut y_range = (f64::INFINITY, f64::NEG_INFINITY);
        for s in samples {
            x_range = (x_range.0.min(s.x), x_range.1.max(s.x));
            y_range = (y_range.0.min(s.y), y_range.1.max(s.y));
        }

        let closed = (first.x - last.x).abs() < CLOSED_TOLERANCE
            && (first.y - last.y).abs() < CLOSED_TOLERANCE;

        Some(Self {
            sample_count: samples.len(),
            duration_ms: last.t_ms,
            x_range,
            y_range,
            closed,
        })
    }
}

impl fmt::Display for TrajectorySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Samples:     {}", self.sample_count)?;
        writeln!(
            f,
            "  Duration:    {:.1} ms ({:.2} s)",
            self.duration_ms,
            self.duration_ms / 1000.0
        )?;
        writeln!(f, "  X range:     [{:.6}, {:.6}]", self.x_range.0, self.x_range.1)?;
        writeln!(f, "  Y range:     [{:.6}, {:.6}]", self.y_range.0, self.y_range.1)?;
        write!(
            f,
            "  Closed path: {}",
            if self.closed { "yes" } else { "no" }
        )
    }
}

/// Write an indexed table of samples (`Idx  Time(ms)  X  Y`)
pub fn write_sample_table<W: fmt::Write>(
    out: &mut W,
    samples: &[TimeSample],
    first_index: usize,
) -> fmt::Result {
    writeln!(out, "  {:<5} {:<12} {:<12} {:<12}", "Idx", "Time(ms)", "X", "Y")?;
    for (i, s) in samples.iter().enumerate() {
        writeln!(
            out,
            "  {:<5} {:<12.1} {:<12.6} {:<12.6}",
            first_index + i,
            s.t_ms,
            s.x,
            s.y
        )?;
    }
    Ok(())
}
