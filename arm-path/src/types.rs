//! Core data types for waypoints and trajectories.
//!
//! - [`Waypoint`]: A physical (x, y) anchor point
//! - [`PathSpec`]: Ordered waypoints plus an open/closed flag
//! - [`TimeSample`]: A single `(t_ms, x, y)` target
//! - [`Trajectory`]: An ordered sequence of samples

use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// A target position in physical units (same units the controller expects)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
}

impl Waypoint {
    /// Create a new waypoint
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `other`, `u` in [0, 1]
    #[inline]
    pub fn lerp(&self, other: &Waypoint, u: f64) -> Waypoint {
        Waypoint {
            x: self.x + u * (other.x - self.x),
            y: self.y + u * (other.y - self.y),
        }
    }

    /// Euclidean distance to another waypoint
    #[inline]
    pub fn distance(&self, other: &Waypoint) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl From<(f64, f64)> for Waypoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Waypoints to traverse, in order.
///
/// A closed path returns from the last waypoint to the first, which adds one
/// extra segment. Waypoints are not deduplicated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PathSpec {
    pub waypoints: Vec<Waypoint>,
    pub closed: bool,
}

impl PathSpec {
    /// Create an empty path
    pub fn new(closed: bool) -> Self {
        Self {
            waypoints: Vec::new(),
            closed,
        }
    }

    /// Create a path from a waypoint list
    pub fn with_waypoints(waypoints: impl IntoIterator<Item = Waypoint>, closed: bool) -> Self {
        Self {
            waypoints: waypoints.into_iter().collect(),
            closed,
        }
    }

    /// Replace all waypoints, optionally changing the closed flag
    pub fn set_waypoints(
        &mut self,
        waypoints: impl IntoIterator<Item = Waypoint>,
        closed: Option<bool>,
    ) {
        self.waypoints = waypoints.into_iter().collect();
        if let Some(closed) = closed {
            self.closed = closed;
        }
    }

    /// Append a waypoint at the end of the path
    pub fn push(&mut self, waypoint: Waypoint) {
        self.waypoints.push(waypoint);
    }

    /// Number of waypoints
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// True if the path has no waypoints
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Number of interpolated segments (0 for fewer than two waypoints)
    pub fn segment_count(&self) -> usize {
        match self.waypoints.len() {
            0 | 1 => 0,
            n if self.closed => n,
            n => n - 1,
        }
    }

    /// Where a traversal ends: the first waypoint if closed, else the last
    pub fn terminal_point(&self) -> Option<Waypoint> {
        if self.closed {
            self.waypoints.first().copied()
        } else {
            self.waypoints.last().copied()
        }
    }
}

/// One trajectory sample: a position to reach `t_ms` after the session start
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSample {
    pub t_ms: f64,
    pub x: f64,
    pub y: f64,
}

impl TimeSample {
    #[inline]
    pub const fn new(t_ms: f64, x: f64, y: f64) -> Self {
        Self { t_ms, x, y }
    }

    #[inline]
    pub fn at(t_ms: f64, point: Waypoint) -> Self {
        Self {
            t_ms,
            x: point.x,
            y: point.y,
        }
    }

    /// Position part of the sample
    #[inline]
    pub fn point(&self) -> Waypoint {
        Waypoint::new(self.x, self.y)
    }
}

/// Ordered sequence of samples.
///
/// Dereferences to `[TimeSample]`, so slice methods (`len`, `iter`, `first`,
/// `last`, indexing) are available directly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectory {
    samples: Vec<TimeSample>,
}

impl Trajectory {
    /// Create an empty trajectory
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: TimeSample) {
        self.samples.push(sample);
    }

    /// Timestamp of the last sample, 0 when empty
    pub fn duration_ms(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.t_ms)
    }

    /// True if `t_ms` never decreases along the sequence
    pub fn is_time_ordered(&self) -> bool {
        self.samples.windows(2).all(|w| w[0].t_ms <= w[1].t_ms)
    }

    pub fn as_slice(&self) -> &[TimeSample] {
        &self.samples
    }

    pub fn into_inner(self) -> Vec<TimeSample> {
        self.samples
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut TimeSample> {
        self.samples.last_mut()
    }
}

impl Deref for Trajectory {
    type Target = [TimeSample];

    fn deref(&self) -> &[TimeSample] {
        &self.samples
    }
}

impl From<Vec<TimeSample>> for Trajectory {
    fn from(samples: Vec<TimeSample>) -> Self {
        Self { samples }
    }
}

impl FromIterator<TimeSample> for Trajectory {
    fn from_iter<I: IntoIterator<Item = TimeSample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Trajectory {
    type Item = TimeSample;
    type IntoIter = std::vec::IntoIter<TimeSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a TimeSample;
    type IntoIter = std::slice::Iter<'a, TimeSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
