//! Time-synchronized trajectory dispatcher
//!
//! # Pacing
//!
//! Every sample's send time is computed from one fixed session origin:
//!
//! ```text
//! session_start = now() + start_delay
//! target[i]     = session_start + t_ms[i] / 1000
//! ```
//!
//! The dispatcher sleeps until `target[i]`, or sends at once if that moment
//! has already passed. Because targets never depend on when the previous
//! sample actually went out, a slow write or a long acknowledgment delays
//! only the samples it overlaps; the schedule itself does not drift.
//!
//! # Flow control
//!
//! - **Ack mode**: after each send, wait up to `ack_timeout` for a terminal
//!   response (`Position reached!` or `ERROR`). Other lines are reported and
//!   the wait continues. A timeout is reported and, under
//!   [`AckTimeoutPolicy::Continue`], the session moves on.
//! - **Free-running**: a short fixed pause after each send keeps the
//!   device's receive buffer from overrunning.
//!
//! # Failure
//!
//! A failed write ends the session at once: no retry, nothing further is
//! sent. The transport is owned by the session and closed on every exit
//! path.

use super::events::{EventSink, LogSink, StreamEvent};
use super::pacer::{CancelFlag, Pacer, SLEEP_SLICE};
use crate::config::StreamingConfig;
use crate::error::{Error, Result};
use crate::protocol::{self, DeviceResponse};
use crate::transport::LineTransport;
use arm_path::{TimeSample, Waypoint};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// What to do when an acknowledgment does not arrive in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckTimeoutPolicy {
    /// Report the timeout and go on with the next sample
    #[default]
    Continue,
    /// Abort the session
    Abort,
}

/// Streaming parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    /// Wait for a device response after each sample
    pub ack_mode: bool,
    /// Bound on each acknowledgment wait
    pub ack_timeout: Duration,
    /// Delay between the call and the session origin
    pub start_delay: Duration,
    /// Pause after each send when not in ack mode
    pub pacing_delay: Duration,
    pub ack_timeout_policy: AckTimeoutPolicy,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            ack_mode: false,
            ack_timeout: Duration::from_secs(2),
            start_delay: Duration::ZERO,
            pacing_delay: Duration::from_millis(1),
            ack_timeout_policy: AckTimeoutPolicy::Continue,
        }
    }
}

impl From<&StreamingConfig> for StreamOptions {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            ack_mode: config.wait_ack,
            ack_timeout: Duration::from_millis(config.ack_timeout_ms),
            start_delay: Duration::from_millis(config.start_delay_ms),
            pacing_delay: Duration::from_millis(config.pacing_delay_ms),
            ack_timeout_policy: config.ack_timeout_policy,
        }
    }
}

/// Outcome of a completed session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamReport {
    /// Samples written to the transport
    pub sent: usize,
    /// Samples in the trajectory
    pub total: usize,
    pub acks: usize,
    pub device_errors: usize,
    pub ack_timeouts: usize,
    /// Samples sent after their target time
    pub late_samples: usize,
    pub max_lateness: Duration,
    /// Wall time from the call to the last processed sample
    pub elapsed: Duration,
}

impl StreamReport {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    fn record_lateness(&mut self, lateness: Duration) {
        if !lateness.is_zero() {
            self.late_samples += 1;
            self.max_lateness = self.max_lateness.max(lateness);
        }
    }
}

/// How an acknowledgment wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum AckOutcome {
    Reached { line: String, waited: Duration },
    DeviceError { line: String, waited: Duration },
    TimedOut,
}

/// Per-call session state: the samples and the fixed time origin
#[derive(Debug, Clone, Copy)]
pub struct StreamSession<'a> {
    pub samples: &'a [TimeSample],
    /// Instant the call was made
    pub created: Instant,
    /// Origin all sample targets are measured from
    pub session_start: Instant,
    pub ack_mode: bool,
}

impl<'a> StreamSession<'a> {
    /// Start a session whose origin is `start_delay` from now.
    ///
    /// Fails without side effects if any sample time is negative, not
    /// finite, or too far out to be scheduled on this clock.
    pub fn begin(samples: &'a [TimeSample], start_delay: Duration, ack_mode: bool) -> Result<Self> {
        let created = Instant::now();
        let session_start = created.checked_add(start_delay).ok_or_else(|| {
            Error::InvalidParameter(format!("start delay {:?} out of range", start_delay))
        })?;

        let unschedulable = samples.iter().enumerate().find(|(_, s)| {
            offset_of(s)
                .and_then(|offset| session_start.checked_add(offset))
                .is_none()
        });
        if let Some((index, bad)) = unschedulable {
            return Err(Error::InvalidParameter(format!(
                "sample #{} has unusable t_ms {}",
                index, bad.t_ms
            )));
        }

        Ok(Self {
            samples,
            created,
            session_start,
            ack_mode,
        })
    }

    /// Absolute send time of `sample`.
    ///
    /// Samples that `begin` would reject map to the session origin.
    pub fn target(&self, sample: &TimeSample) -> Instant {
        offset_of(sample)
            .and_then(|offset| self.session_start.checked_add(offset))
            .unwrap_or(self.session_start)
    }
}

fn offset_of(sample: &TimeSample) -> Option<Duration> {
    Duration::try_from_secs_f64(sample.t_ms / 1000.0).ok()
}

/// Internal session failure carrying the source of an abort
enum Abort {
    Cancelled,
    Failed(Error),
}

/// Streams trajectories to a transport at wall-clock pace
pub struct StreamDispatcher<S: EventSink = LogSink> {
    options: StreamOptions,
    sink: S,
    pacer: Pacer,
}

impl StreamDispatcher<LogSink> {
    /// Create a dispatcher that reports to the log
    pub fn new(options: StreamOptions) -> Self {
        Self::with_sink(options, LogSink)
    }
}

impl<S: EventSink> StreamDispatcher<S> {
    /// Create a dispatcher reporting to `sink`
    pub fn with_sink(options: StreamOptions, sink: S) -> Self {
        Self {
            options,
            sink,
            pacer: Pacer::default(),
        }
    }

    /// Abort sessions when `flag` becomes true
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.pacer = Pacer::new(flag);
        self
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Stream `samples` over `transport`, consuming it.
    ///
    /// Returns a report once every sample has been processed. On failure the
    /// error says how many samples were dispatched first
    /// ([`Error::StreamAborted`], [`Error::Cancelled`]). The transport is
    /// closed in all cases.
    pub fn stream<T: LineTransport>(
        &mut self,
        samples: &[TimeSample],
        mut transport: T,
    ) -> Result<StreamReport> {
        let result = self.run_session(samples, &mut transport);
        if let Err(e) = transport.close() {
            log::warn!("Failed to close transport: {}", e);
        }
        result
    }

    fn run_session<T: LineTransport>(
        &mut self,
        samples: &[TimeSample],
        transport: &mut T,
    ) -> Result<StreamReport> {
        let session = StreamSession::begin(samples, self.options.start_delay, self.options.ack_mode)?;
        let total = samples.len();
        let mut report = StreamReport::new(total);

        self.sink.emit(&StreamEvent::SessionStarted {
            samples: total,
            ack_mode: session.ack_mode,
            start_delay: self.options.start_delay,
        });

        for (index, sample) in samples.iter().enumerate() {
            match self.dispatch(&session, index, sample, transport, &mut report) {
                Ok(()) => {}
                Err(Abort::Cancelled) => {
                    self.sink.emit(&StreamEvent::Cancelled {
                        sent: report.sent,
                        total,
                    });
                    return Err(Error::Cancelled {
                        sent: report.sent,
                        total,
                    });
                }
                Err(Abort::Failed(source)) => {
                    return Err(Error::StreamAborted {
                        sent: report.sent,
                        total,
                        source: Box::new(source),
                    });
                }
            }
        }

        report.elapsed = session.created.elapsed();
        self.sink.emit(&StreamEvent::SessionFinished {
            sent: report.sent,
            elapsed: report.elapsed,
            ack_timeouts: report.ack_timeouts,
            device_errors: report.device_errors,
        });

        Ok(report)
    }

    /// Wait for, send and (optionally) confirm one sample
    fn dispatch<T: LineTransport>(
        &mut self,
        session: &StreamSession<'_>,
        index: usize,
        sample: &TimeSample,
        transport: &mut T,
        report: &mut StreamReport,
    ) -> std::result::Result<(), Abort> {
        let target = session.target(sample);
        if !self.pacer.sleep_until(target) {
            return Err(Abort::Cancelled);
        }

        let lateness = Instant::now().saturating_duration_since(target);
        self.send(index, sample.point(), transport)?;
        report.sent += 1;
        report.record_lateness(lateness);
        self.sink.emit(&StreamEvent::SampleSent {
            index,
            sample: *sample,
            lateness,
        });

        if session.ack_mode {
            let outcome = self.await_ack(index, transport)?;
            self.apply_ack(outcome, report)
        } else if self.pacer.sleep(self.options.pacing_delay) {
            Ok(())
        } else {
            Err(Abort::Cancelled)
        }
    }

    fn send<T: LineTransport>(
        &mut self,
        index: usize,
        point: Waypoint,
        transport: &mut T,
    ) -> std::result::Result<(), Abort> {
        let line = protocol::format_point(point.x, point.y);
        transport.send_line(&line).map_err(|e| {
            self.sink.emit(&StreamEvent::SendFailed {
                index,
                error: e.to_string(),
            });
            Abort::Failed(e)
        })
    }

    /// Count an acknowledgment outcome, aborting if policy says so
    fn apply_ack(
        &mut self,
        outcome: AckOutcome,
        report: &mut StreamReport,
    ) -> std::result::Result<(), Abort> {
        match outcome {
            AckOutcome::Reached { .. } => report.acks += 1,
            AckOutcome::DeviceError { .. } => report.device_errors += 1,
            AckOutcome::TimedOut => {
                report.ack_timeouts += 1;
                if self.options.ack_timeout_policy == AckTimeoutPolicy::Abort {
                    return Err(Abort::Failed(Error::AckTimeout {
                        timeout_ms: self.options.ack_timeout.as_millis() as u64,
                    }));
                }
            }
        }
        Ok(())
    }

    /// Block until a terminal response, the timeout, or cancellation
    fn await_ack<T: LineTransport>(
        &mut self,
        index: usize,
        transport: &mut T,
    ) -> std::result::Result<AckOutcome, Abort> {
        let started = Instant::now();
        let deadline = started + self.options.ack_timeout;

        loop {
            if self.pacer.is_cancelled() {
                return Err(Abort::Cancelled);
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                break;
            };
            if remaining.is_zero() {
                break;
            }

            let line = transport
                .recv_line(remaining.min(SLEEP_SLICE * 10))
                .map_err(Abort::Failed)?;
            let Some(line) = line else {
                continue;
            };

            let waited = started.elapsed();
            match protocol::classify(&line) {
                DeviceResponse::Reached => {
                    self.sink.emit(&StreamEvent::AckReceived {
                        index,
                        line: line.clone(),
                        waited,
                    });
                    return Ok(AckOutcome::Reached { line, waited });
                }
                DeviceResponse::Error => {
                    self.sink.emit(&StreamEvent::DeviceError {
                        index,
                        line: line.clone(),
                    });
                    return Ok(AckOutcome::DeviceError { line, waited });
                }
                DeviceResponse::Info => {
                    self.sink.emit(&StreamEvent::DeviceLine { index, line });
                }
            }
        }

        self.sink.emit(&StreamEvent::AckTimeout {
            index,
            timeout: self.options.ack_timeout,
        });
        Ok(AckOutcome::TimedOut)
    }

    /// Send a single target and wait for the device's answer.
    ///
    /// The transport stays open; the caller owns it. A timeout is returned
    /// as [`AckOutcome::TimedOut`], not as an error.
    pub fn send_point<T: LineTransport>(
        &mut self,
        point: Waypoint,
        transport: &mut T,
    ) -> Result<AckOutcome> {
        let lift = |abort: Abort, sent: usize| match abort {
            Abort::Cancelled => Error::Cancelled { sent, total: 1 },
            Abort::Failed(e) => e,
        };

        self.send(0, point, transport).map_err(|a| lift(a, 0))?;
        self.sink.emit(&StreamEvent::SampleSent {
            index: 0,
            sample: TimeSample::at(0.0, point),
            lateness: Duration::ZERO,
        });
        self.await_ack(0, transport).map_err(|a| lift(a, 1))
    }

    /// Send waypoints one after another, `delay` apart, each followed by an
    /// acknowledgment wait. Consumes and closes the transport.
    pub fn send_waypoints<T: LineTransport>(
        &mut self,
        points: &[Waypoint],
        delay: Duration,
        mut transport: T,
    ) -> Result<StreamReport> {
        let result = self.run_waypoints(points, delay, &mut transport);
        if let Err(e) = transport.close() {
            log::warn!("Failed to close transport: {}", e);
        }
        result
    }

    fn run_waypoints<T: LineTransport>(
        &mut self,
        points: &[Waypoint],
        delay: Duration,
        transport: &mut T,
    ) -> Result<StreamReport> {
        let started = Instant::now();
        let total = points.len();
        let mut report = StreamReport::new(total);

        for (index, point) in points.iter().enumerate() {
            let step = self.waypoint_step(started, index, *point, delay, transport, &mut report);

            match step {
                Ok(()) => {}
                Err(Abort::Cancelled) => {
                    self.sink.emit(&StreamEvent::Cancelled {
                        sent: report.sent,
                        total,
                    });
                    return Err(Error::Cancelled {
                        sent: report.sent,
                        total,
                    });
                }
                Err(Abort::Failed(source)) => {
                    return Err(Error::StreamAborted {
                        sent: report.sent,
                        total,
                        source: Box::new(source),
                    });
                }
            }
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }

    fn waypoint_step<T: LineTransport>(
        &mut self,
        started: Instant,
        index: usize,
        point: Waypoint,
        delay: Duration,
        transport: &mut T,
        report: &mut StreamReport,
    ) -> std::result::Result<(), Abort> {
        self.send(index, point, transport)?;
        report.sent += 1;
        self.sink.emit(&StreamEvent::SampleSent {
            index,
            sample: TimeSample::at(started.elapsed().as_secs_f64() * 1000.0, point),
            lateness: Duration::ZERO,
        });

        let outcome = self.await_ack(index, transport)?;
        self.apply_ack(outcome, report)?;

        if self.pacer.sleep(delay) {
            Ok(())
        } else {
            Err(Abort::Cancelled)
        }
    }
}

/// Stream `samples` with default options, reporting to the log.
///
/// Convenience for the common case: `ack_mode` and `start_delay` are the
/// only knobs.
pub fn stream<T: LineTransport>(
    samples: &[TimeSample],
    transport: T,
    ack_mode: bool,
    start_delay: Duration,
) -> Result<StreamReport> {
    let options = StreamOptions {
        ack_mode,
        start_delay,
        ..StreamOptions::default()
    };
    StreamDispatcher::new(options).stream(samples, transport)
}
