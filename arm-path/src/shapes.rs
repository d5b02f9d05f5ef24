//! Preset paths used for arm characterization

use crate::error::Result;
use crate::generator::generate;
use crate::types::{PathSpec, Trajectory, Waypoint};

/// Bottom-right corner of the calibration square
pub const SQUARE_BOTTOM_RIGHT: Waypoint = Waypoint::new(137.0, 100.0);
/// Top-right corner of the calibration square
pub const SQUARE_TOP_RIGHT: Waypoint = Waypoint::new(137.0, 126.0);
/// Top-left corner of the calibration square
pub const SQUARE_TOP_LEFT: Waypoint = Waypoint::new(111.0, 126.0);
/// Bottom-left corner of the calibration square
pub const SQUARE_BOTTOM_LEFT: Waypoint = Waypoint::new(111.0, 100.0);

/// The closed 26x26 square the controller firmware uses for characterization.
///
/// Traversal order: bottom-right → top-right → top-left → bottom-left → back.
pub fn calibration_square() -> PathSpec {
    PathSpec::with_waypoints(
        [
            SQUARE_BOTTOM_RIGHT,
            SQUARE_TOP_RIGHT,
            SQUARE_TOP_LEFT,
            SQUARE_BOTTOM_LEFT,
        ],
        true,
    )
}

/// Sample the calibration square over `total_time_ms`
pub fn calibration_square_trajectory(total_time_ms: f64, rate_hz: u32) -> Result<Trajectory> {
    generate(&calibration_square(), total_time_ms, rate_hz)
}
