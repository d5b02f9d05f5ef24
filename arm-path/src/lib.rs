//! ArmPath - Parametric path generation for a two-link planar arm
//!
//! This library turns a handful of target waypoints into a time-indexed
//! trajectory that a motion controller can follow, and persists trajectories
//! to a flat CSV table.
//!
//! ## Modules
//!
//! - [`types`]: Waypoints, path specs and time-stamped samples
//! - [`generator`]: Segment-interpolated and circular trajectory generation
//! - [`shapes`]: Preset paths used for arm characterization
//! - [`csv_io`]: Loading and saving trajectories (`t_ms,x,y`)
//! - [`summary`]: Quick statistics for previewing a trajectory
//!
//! No I/O channel lives here; streaming to hardware is done by `arm-link`.

pub mod csv_io;
pub mod error;
pub mod generator;
pub mod shapes;
pub mod summary;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use generator::{generate, generate_circle, sample_count};
pub use summary::TrajectorySummary;
pub use types::{PathSpec, TimeSample, Trajectory, Waypoint};
