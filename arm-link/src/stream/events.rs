//! Structured progress events emitted during a streaming session
//!
//! The dispatcher never prints. Every observable step becomes a
//! [`StreamEvent`] handed to an [`EventSink`]; what happens next is up to
//! the observer:
//!
//! - [`LogSink`]: forwards to the `log` facade (default)
//! - `crossbeam_channel::Sender<StreamEvent>`: hands events to another thread
//! - `Vec<StreamEvent>`: collects everything (tests)
//! - [`FnSink`]: wraps a closure
//!
//! Sinks compose with tuples: `(LogSink, sender)` feeds both.

use arm_path::TimeSample;
use std::time::Duration;

/// One observable step of a streaming session
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Session clock started; first target is `start_delay` from now
    SessionStarted {
        samples: usize,
        ack_mode: bool,
        start_delay: Duration,
    },
    /// Sample written to the transport `lateness` after its target time
    SampleSent {
        index: usize,
        sample: TimeSample,
        lateness: Duration,
    },
    /// Device confirmed the move
    AckReceived {
        index: usize,
        line: String,
        waited: Duration,
    },
    /// Device answered with its error token
    DeviceError { index: usize, line: String },
    /// Non-terminal line received while waiting for an acknowledgment
    DeviceLine { index: usize, line: String },
    /// No terminal response within the wait bound
    AckTimeout { index: usize, timeout: Duration },
    /// Write failed; session aborts
    SendFailed { index: usize, error: String },
    /// Cancel flag observed; session aborts
    Cancelled { sent: usize, total: usize },
    /// All samples processed
    SessionFinished {
        sent: usize,
        elapsed: Duration,
        ack_timeouts: usize,
        device_errors: usize,
    },
}

/// Observer of streaming events
pub trait EventSink {
    fn emit(&mut self, event: &StreamEvent);
}

/// Forwards events to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::SessionStarted {
                samples,
                ack_mode,
                start_delay,
            } => log::info!(
                "Starting stream: {} samples in {:.2}s (ack={})",
                samples,
                start_delay.as_secs_f64(),
                ack_mode
            ),
            StreamEvent::SampleSent {
                index,
                sample,
                lateness,
            } => log::trace!(
                "Sent #{}: ({}, {}) t={:.1} ms late={:.3} ms",
                index,
                sample.x,
                sample.y,
                sample.t_ms,
                lateness.as_secs_f64() * 1000.0
            ),
            StreamEvent::AckReceived {
                index,
                line,
                waited,
            } => log::debug!(
                "Ack #{} after {:.1} ms: {}",
                index,
                waited.as_secs_f64() * 1000.0,
                line
            ),
            StreamEvent::DeviceError { index, line } => {
                log::warn!("Device error on sample #{}: {}", index, line)
            }
            StreamEvent::DeviceLine { index, line } => {
                log::debug!("Controller (#{}): {}", index, line)
            }
            StreamEvent::AckTimeout { index, timeout } => log::warn!(
                "No acknowledgment for sample #{} within {} ms",
                index,
                timeout.as_millis()
            ),
            StreamEvent::SendFailed { index, error } => {
                log::error!("Write failed on sample #{}: {}", index, error)
            }
            StreamEvent::Cancelled { sent, total } => {
                log::warn!("Stream cancelled after {}/{} samples", sent, total)
            }
            StreamEvent::SessionFinished {
                sent,
                elapsed,
                ack_timeouts,
                device_errors,
            } => log::info!(
                "Stream complete: {} samples in {:.2}s ({} ack timeouts, {} device errors)",
                sent,
                elapsed.as_secs_f64(),
                ack_timeouts,
                device_errors
            ),
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &StreamEvent) {}
}

/// Adapts a closure into a sink
pub struct FnSink<F>(pub F);

impl<F: FnMut(&StreamEvent)> EventSink for FnSink<F> {
    fn emit(&mut self, event: &StreamEvent) {
        (self.0)(event)
    }
}

impl EventSink for Vec<StreamEvent> {
    fn emit(&mut self, event: &StreamEvent) {
        self.push(event.clone());
    }
}

impl EventSink for crossbeam_channel::Sender<StreamEvent> {
    fn emit(&mut self, event: &StreamEvent) {
        // A gone receiver must not stop the arm mid-path
        let _ = self.send(event.clone());
    }
}

impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &StreamEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &StreamEvent) {
        (**self).emit(event);
    }
}
