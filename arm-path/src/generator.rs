//! Parametric path generation
//!
//! Converts waypoints into a time-indexed [`Trajectory`] sampled at a fixed
//! rate. Each sample is placed by segment-local linear interpolation: the
//! total duration is split evenly across segments, and a sample's time picks
//! its segment and the fraction travelled along it. Per-sample cost is O(1)
//! and rounding error never carries over from one segment to the next.
//!
//! # Sampling
//!
//! ```text
//! sample_count = max(1, floor(total_time_ms * rate_hz / 1000))
//! t[s]         = min(s * 1000 / rate_hz, total_time_ms)
//! ```
//!
//! # Endpoint guarantee
//!
//! `sample_count` steps of `1000 / rate_hz` do not in general land on
//! `total_time_ms`, so the last emitted sample is overwritten with
//! `(total_time_ms, terminal_point)`. Closed paths end exactly where they
//! started; open paths end exactly on the last waypoint.

use crate::error::{Error, Result};
use crate::types::{PathSpec, TimeSample, Trajectory, Waypoint};
use std::f64::consts::TAU;

/// Upper bound on samples in one generated trajectory
pub const MAX_SAMPLES: usize = 10_000_000;

/// Number of samples emitted for a duration and rate
///
/// Does not validate its inputs; use after [`validate`].
pub fn sample_count(total_time_ms: f64, rate_hz: u32) -> usize {
    let n = (total_time_ms * f64::from(rate_hz) / 1000.0).floor();
    (n as usize).max(1)
}

/// Check generation parameters
fn validate(total_time_ms: f64, rate_hz: u32) -> Result<()> {
    if rate_hz == 0 {
        return Err(Error::InvalidRate(rate_hz));
    }
    if !total_time_ms.is_finite() || total_time_ms < 0.0 {
        return Err(Error::InvalidDuration(total_time_ms));
    }
    let requested = (total_time_ms * f64::from(rate_hz) / 1000.0).floor();
    if requested > MAX_SAMPLES as f64 {
        return Err(Error::TooManySamples {
            requested,
            max: MAX_SAMPLES,
        });
    }
    Ok(())
}

/// Sample times, clamped to the total duration
fn sample_times(total_time_ms: f64, rate_hz: u32) -> impl Iterator<Item = f64> {
    let step_ms = 1000.0 / f64::from(rate_hz);
    (0..sample_count(total_time_ms, rate_hz)).map(move |s| (s as f64 * step_ms).min(total_time_ms))
}

/// Generate a trajectory through `spec.waypoints` lasting `total_time_ms`.
///
/// - No waypoints: empty trajectory
/// - One waypoint: the point held for the whole duration (no endpoint
///   correction, timestamps advance by `1000 / rate_hz`)
/// - Two or more: segment-local interpolation plus endpoint correction
///
/// # Errors
///
/// [`Error::InvalidRate`] if `rate_hz == 0`, [`Error::InvalidDuration`] if
/// `total_time_ms` is negative or not finite. No partial trajectory is
/// returned on error.
pub fn generate(spec: &PathSpec, total_time_ms: f64, rate_hz: u32) -> Result<Trajectory> {
    validate(total_time_ms, rate_hz)?;

    let pts = &spec.waypoints;
    let n = pts.len();

    match n {
        0 => return Ok(Trajectory::new()),
        1 => {
            let step_ms = 1000.0 / f64::from(rate_hz);
            let count = sample_count(total_time_ms, rate_hz);
            return Ok((0..count)
                .map(|s| TimeSample::at(s as f64 * step_ms, pts[0]))
                .collect());
        }
        _ => {}
    }

    let segment_count = spec.segment_count();
    let segment_duration = total_time_ms / segment_count as f64;

    let mut trajectory = Trajectory::with_capacity(sample_count(total_time_ms, rate_hz));
    for t in sample_times(total_time_ms, rate_hz) {
        let (segment, u) = locate(t, segment_duration, segment_count);
        let i0 = segment;
        let i1 = if spec.closed { (segment + 1) % n } else { segment + 1 };
        trajectory.push(TimeSample::at(t, pts[i0].lerp(&pts[i1], u)));
    }

    if let Some(terminal) = spec.terminal_point() {
        finalize(&mut trajectory, total_time_ms, terminal);
    }

    log::debug!(
        "Generated {} samples over {} segments ({:.1} ms, {} Hz, closed={})",
        trajectory.len(),
        segment_count,
        total_time_ms,
        rate_hz,
        spec.closed
    );

    Ok(trajectory)
}

/// Segment index and local parameter `u` in [0, 1] for time `t`
fn locate(t: f64, segment_duration: f64, segment_count: usize) -> (usize, f64) {
    if segment_duration <= 0.0 {
        return (0, 0.0);
    }
    let segment = ((t / segment_duration).floor() as usize).min(segment_count - 1);
    let u = (t - segment as f64 * segment_duration) / segment_duration;
    (segment, u)
}

/// Overwrite the last sample with the exact endpoint
fn finalize(trajectory: &mut Trajectory, total_time_ms: f64, terminal: Waypoint) {
    if let Some(last) = trajectory.last_mut() {
        *last = TimeSample::at(total_time_ms, terminal);
    }
}

/// Generate one full counter-clockwise revolution around `center`.
///
/// Progress is `p = min(1, t / total_time_ms)` and the angle is
/// `start_angle + p * 2π`. The last sample is forced to the start-angle point
/// at `total_time_ms`, so the circle closes exactly.
///
/// # Errors
///
/// Same parameter checks as [`generate`], plus [`Error::InvalidRadius`] for a
/// negative or non-finite radius.
pub fn generate_circle(
    center: Waypoint,
    radius: f64,
    total_time_ms: f64,
    rate_hz: u32,
    start_angle: f64,
) -> Result<Trajectory> {
    validate(total_time_ms, rate_hz)?;
    if !radius.is_finite() || radius < 0.0 {
        return Err(Error::InvalidRadius(radius));
    }

    let on_circle = |angle: f64| {
        Waypoint::new(
            center.x + radius * angle.cos(),
            center.y + radius * angle.sin(),
        )
    };

    let mut trajectory: Trajectory = sample_times(total_time_ms, rate_hz)
        .map(|t| {
            let p = if total_time_ms > 0.0 {
                (t / total_time_ms).min(1.0)
            } else {
                1.0
            };
            TimeSample::at(t, on_circle(start_angle + p * TAU))
        })
        .collect();

    finalize(&mut trajectory, total_time_ms, on_circle(start_angle));

    log::debug!(
        "Generated circle: {} samples, r={:.4}, {:.1} ms",
        trajectory.len(),
        radius,
        total_time_ms
    );

    Ok(trajectory)
}
