//! Line protocol spoken by the arm controller firmware
//!
//! ```text
//! host → device   "<x>,<y>\n"              target position, plain decimals
//! device → host   "... Position reached!"  move finished (success)
//! device → host   "... ERROR ..."          target rejected (failure)
//! device → host   anything else            informational, logged only
//! ```
//!
//! Responses are matched by substring; the firmware prefixes them freely.

use crate::error::{Error, Result};
use arm_path::Waypoint;

/// Substring marking a completed move
pub const POSITION_REACHED: &str = "Position reached!";

/// Substring marking a rejected target
pub const ERROR_TOKEN: &str = "ERROR";

/// Classification of a line received from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceResponse {
    /// Move completed
    Reached,
    /// Device reported an error
    Error,
    /// Anything else (debug prints, echoes)
    Info,
}

impl DeviceResponse {
    /// Whether this response ends an acknowledgment wait
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeviceResponse::Info)
    }
}

/// Classify a received line
pub fn classify(line: &str) -> DeviceResponse {
    if line.contains(POSITION_REACHED) {
        DeviceResponse::Reached
    } else if line.contains(ERROR_TOKEN) {
        DeviceResponse::Error
    } else {
        DeviceResponse::Info
    }
}

/// Encode a target position as a command line (newline included)
pub fn format_point(x: f64, y: f64) -> String {
    format!("{},{}\n", x, y)
}

/// Parse a manually entered `x,y` pair
pub fn parse_point(input: &str) -> Result<Waypoint> {
    let parts: Vec<&str> = input.trim().split(',').collect();
    if parts.len() != 2 {
        return Err(Error::InvalidParameter(format!(
            "expected 'x,y', got {:?}",
            input
        )));
    }

    let coord = |raw: &str| -> Result<f64> {
        let raw = raw.trim();
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| Error::InvalidParameter(format!("not a number: {:?}", raw)))
    };

    Ok(Waypoint::new(coord(parts[0])?, coord(parts[1])?))
}
