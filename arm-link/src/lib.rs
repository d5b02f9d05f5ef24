//! ArmLink - Trajectory streaming for a two-link planar arm controller
//!
//! Delivers a time-indexed trajectory (from `arm-path`) to the arm's
//! microcontroller over a line-oriented serial protocol, pacing each sample
//! against wall-clock time.
//!
//! ## Modules
//!
//! - [`transport`]: `LineTransport` trait, serial and mock implementations
//! - [`protocol`]: Command encoding and response classification
//! - [`stream`]: Time-synchronized dispatcher and its event stream
//! - [`config`]: TOML configuration

pub mod config;
pub mod error;
pub mod protocol;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use config::ArmConfig;
pub use error::{Error, Result};
pub use stream::{StreamDispatcher, StreamEvent, StreamOptions, StreamReport};
pub use transport::{LineTransport, MockTransport, SerialTransport};
