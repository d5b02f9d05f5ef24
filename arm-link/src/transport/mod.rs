//! Transport layer for line-oriented device communication
//!
//! The dispatcher only needs three operations from a channel: send a line,
//! receive a line (or nothing within a timeout), and close. Anything that
//! provides them can carry a trajectory: a serial port to the controller, or
//! [`MockTransport`] in tests.

use crate::error::Result;
use std::time::Duration;

mod mock;
mod serial;

pub use mock::{MockTransport, SentLine};
pub use serial::SerialTransport;

/// Bidirectional line channel to the downstream controller
pub trait LineTransport: Send {
    /// Write one line. `line` must include its terminating newline.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Wait up to `timeout` for one complete line (without terminator).
    ///
    /// Returns `Ok(None)` if no complete line arrived in time.
    fn recv_line(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Release the channel. Further sends fail.
    fn close(&mut self) -> Result<()>;
}

impl<T: LineTransport + ?Sized> LineTransport for Box<T> {
    fn send_line(&mut self, line: &str) -> Result<()> {
        (**self).send_line(line)
    }

    fn recv_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        (**self).recv_line(timeout)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
