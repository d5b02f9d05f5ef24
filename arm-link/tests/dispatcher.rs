//! Integration tests for the streaming dispatcher
//!
//! Runs real sessions against `MockTransport` on the wall clock. Timing
//! assertions use lower bounds (never early) and generous upper bounds so
//! they hold on a loaded machine.

use arm_link::stream::{
    AckOutcome, AckTimeoutPolicy, CancelFlag, NullSink, StreamDispatcher, StreamEvent,
    StreamOptions,
};
use arm_link::transport::MockTransport;
use arm_link::Error;
use arm_path::{PathSpec, TimeSample, Waypoint};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn samples_at(times_ms: &[f64]) -> Vec<TimeSample> {
    times_ms
        .iter()
        .enumerate()
        .map(|(i, &t)| TimeSample::new(t, i as f64, 0.0))
        .collect()
}

fn free_running() -> StreamOptions {
    StreamOptions {
        pacing_delay: Duration::ZERO,
        ..StreamOptions::default()
    }
}

fn ack_mode(timeout_ms: u64) -> StreamOptions {
    StreamOptions {
        ack_mode: true,
        ack_timeout: Duration::from_millis(timeout_ms),
        ..StreamOptions::default()
    }
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_samples_sent_no_earlier_than_target() {
    let mock = MockTransport::new();
    let samples = samples_at(&[0.0, 100.0, 200.0]);

    let start = Instant::now();
    let mut dispatcher = StreamDispatcher::with_sink(free_running(), NullSink);
    let report = dispatcher.stream(&samples, mock.clone()).unwrap();

    let sent = mock.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(report.sent, 3);
    assert_eq!(report.total, 3);

    for (line, target_ms) in sent.iter().zip([0u64, 100, 200]) {
        let offset = line.at.duration_since(start);
        assert!(
            offset >= Duration::from_millis(target_ms),
            "sent at {:?}, target {} ms",
            offset,
            target_ms
        );
        assert!(offset < Duration::from_millis(target_ms + 80));
    }
}

#[test]
fn test_wire_format_and_order() {
    let mock = MockTransport::new();
    let samples = vec![
        TimeSample::new(0.0, 137.0, 100.0),
        TimeSample::new(1.0, 137.0, 100.5),
        TimeSample::new(2.0, 0.1, -2.0),
    ];

    StreamDispatcher::with_sink(free_running(), NullSink)
        .stream(&samples, mock.clone())
        .unwrap();

    assert_eq!(
        mock.sent_lines(),
        vec!["137,100\n", "137,100.5\n", "0.1,-2\n"]
    );
}

#[test]
fn test_slow_write_does_not_shift_schedule() {
    let mock = MockTransport::new();
    mock.delay_write(0, Duration::from_millis(150));
    let samples = samples_at(&[0.0, 100.0, 200.0]);

    let start = Instant::now();
    StreamDispatcher::with_sink(free_running(), NullSink)
        .stream(&samples, mock.clone())
        .unwrap();

    let sent = mock.sent();
    assert_eq!(sent.len(), 3);

    // Sample 1 is late, sent as soon as the slow write returns
    let second = sent[1].at.duration_since(start);
    assert!(second >= Duration::from_millis(150));

    // Sample 2 keeps its original target instead of 150 + 100 ms
    let third = sent[2].at.duration_since(start);
    assert!(third >= Duration::from_millis(200));
    assert!(third < Duration::from_millis(280), "drifted to {:?}", third);
}

#[test]
fn test_start_delay_shifts_origin() {
    let mock = MockTransport::new();
    let options = StreamOptions {
        start_delay: Duration::from_millis(120),
        ..free_running()
    };
    let samples = samples_at(&[0.0, 50.0]);

    let start = Instant::now();
    StreamDispatcher::with_sink(options, NullSink)
        .stream(&samples, mock.clone())
        .unwrap();

    let sent = mock.sent();
    assert!(sent[0].at.duration_since(start) >= Duration::from_millis(120));
    assert!(sent[1].at.duration_since(start) >= Duration::from_millis(170));
}

#[test]
fn test_empty_trajectory_closes_transport() {
    let mock = MockTransport::new();
    let report = StreamDispatcher::with_sink(free_running(), NullSink)
        .stream(&[], mock.clone())
        .unwrap();

    assert_eq!(report.sent, 0);
    assert!(mock.sent_lines().is_empty());
    assert!(mock.is_closed());
}

#[test]
fn test_generated_square_streams_every_sample() {
    let spec = PathSpec::with_waypoints(
        [
            Waypoint::new(0.0, 0.0),
            Waypoint::new(10.0, 0.0),
            Waypoint::new(10.0, 10.0),
            Waypoint::new(0.0, 10.0),
        ],
        true,
    );
    let trajectory = arm_path::generate(&spec, 100.0, 100).unwrap();
    let mock = MockTransport::new();

    let report = StreamDispatcher::with_sink(free_running(), NullSink)
        .stream(&trajectory, mock.clone())
        .unwrap();

    assert_eq!(report.sent, 10);
    assert_eq!(mock.sent_lines().first().map(String::as_str), Some("0,0\n"));
    assert_eq!(mock.sent_lines().last().map(String::as_str), Some("0,0\n"));
}

#[test]
fn test_bad_sample_time_rejected_before_sending() {
    let mock = MockTransport::new();
    let samples = vec![TimeSample::new(0.0, 0.0, 0.0), TimeSample::new(f64::NAN, 1.0, 1.0)];

    let result = StreamDispatcher::with_sink(free_running(), NullSink).stream(&samples, mock.clone());

    assert!(matches!(result, Err(Error::InvalidParameter(_))));
    assert!(mock.sent_lines().is_empty());
    assert!(mock.is_closed());
}

#[test]
fn test_far_future_time_from_file_is_rejected() {
    let input = "t_ms,x,y\n0.000,1,1\n15000000000000000000000.000,2,2\n";
    let loaded = arm_path::csv_io::read_trajectory(input.as_bytes()).unwrap();
    assert_eq!(loaded.trajectory.len(), 2);

    let mock = MockTransport::new();
    let result =
        StreamDispatcher::with_sink(free_running(), NullSink).stream(&loaded.trajectory, mock.clone());

    assert!(matches!(result, Err(Error::InvalidParameter(_))));
    assert!(mock.sent_lines().is_empty());
    assert!(mock.is_closed());
}

// ============================================================================
// Acknowledgment mode
// ============================================================================

#[test]
fn test_ack_mode_counts_acks() {
    let mock = MockTransport::acknowledging();
    let samples = samples_at(&[0.0, 10.0, 20.0]);

    let report = StreamDispatcher::with_sink(ack_mode(500), NullSink)
        .stream(&samples, mock.clone())
        .unwrap();

    assert_eq!(report.sent, 3);
    assert_eq!(report.acks, 3);
    assert_eq!(report.ack_timeouts, 0);
}

#[test]
fn test_ack_mode_skips_info_lines() {
    let mock = MockTransport::new();
    mock.reply_to_every_write(&["theta1=0.52", ">> Position reached!"]);
    let samples = samples_at(&[0.0, 10.0]);

    let mut dispatcher = StreamDispatcher::with_sink(ack_mode(500), Vec::new());
    let report = dispatcher.stream(&samples, mock).unwrap();
    assert_eq!(report.acks, 2);

    let events = dispatcher.into_sink();
    let info = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::DeviceLine { .. }))
        .count();
    assert_eq!(info, 2);
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::AckReceived { index: 1, line, .. } if line == ">> Position reached!"
    )));
}

#[test]
fn test_device_error_is_counted_not_fatal() {
    let mock = MockTransport::new();
    mock.reply_to_every_write(&["ERROR: unreachable"]);
    let samples = samples_at(&[0.0, 10.0]);

    let report = StreamDispatcher::with_sink(ack_mode(500), NullSink)
        .stream(&samples, mock.clone())
        .unwrap();

    assert_eq!(report.sent, 2);
    assert_eq!(report.device_errors, 2);
    assert_eq!(report.acks, 0);
}

#[test]
fn test_ack_timeout_continues_by_default() {
    let mock = MockTransport::new();
    let samples = samples_at(&[0.0, 10.0]);

    let start = Instant::now();
    let mut dispatcher = StreamDispatcher::with_sink(ack_mode(60), Vec::new());
    let report = dispatcher.stream(&samples, mock.clone()).unwrap();

    assert_eq!(report.sent, 2);
    assert_eq!(report.ack_timeouts, 2);
    assert!(start.elapsed() >= Duration::from_millis(120));

    let timeouts = dispatcher
        .sink()
        .iter()
        .filter(|e| matches!(e, StreamEvent::AckTimeout { .. }))
        .count();
    assert_eq!(timeouts, 2);
}

#[test]
fn test_ack_timeout_abort_policy() {
    let mock = MockTransport::new();
    let options = StreamOptions {
        ack_timeout_policy: AckTimeoutPolicy::Abort,
        ..ack_mode(50)
    };
    let samples = samples_at(&[0.0, 10.0, 20.0]);

    let err = StreamDispatcher::with_sink(options, NullSink)
        .stream(&samples, mock.clone())
        .unwrap_err();

    match err {
        Error::StreamAborted { sent, total, source } => {
            assert_eq!(sent, 1);
            assert_eq!(total, 3);
            assert!(matches!(*source, Error::AckTimeout { timeout_ms: 50 }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.sent_lines().len(), 1);
    assert!(mock.is_closed());
}

// ============================================================================
// Failure and cancellation
// ============================================================================

#[test]
fn test_write_failure_aborts_and_closes() {
    let mock = MockTransport::new();
    mock.fail_from_write(2);
    let samples = samples_at(&[0.0, 5.0, 10.0, 15.0, 20.0]);

    let mut dispatcher = StreamDispatcher::with_sink(free_running(), Vec::new());
    let err = dispatcher.stream(&samples, mock.clone()).unwrap_err();

    assert_eq!(err.samples_sent(), Some(2));
    assert!(matches!(err, Error::StreamAborted { total: 5, .. }));
    assert_eq!(mock.sent_lines().len(), 2);
    assert!(mock.is_closed());
    assert_eq!(mock.close_calls(), 1);

    let events = dispatcher.into_sink();
    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::SendFailed { index: 2, .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, StreamEvent::SessionFinished { .. })));
}

#[test]
fn test_cancel_stops_session() {
    let mock = MockTransport::new();
    let cancel = CancelFlag::default();
    let samples = samples_at(&[0.0, 50.0, 5000.0, 10000.0]);

    let flag = Arc::clone(&cancel);
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        flag.store(true, Ordering::Relaxed);
    });

    let start = Instant::now();
    let err = StreamDispatcher::with_sink(free_running(), NullSink)
        .with_cancel_flag(cancel)
        .stream(&samples, mock.clone())
        .unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, Error::Cancelled { sent: 2, total: 4 }));
    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(mock.sent_lines().len(), 2);
    assert!(mock.is_closed());
}

#[test]
fn test_cancel_interrupts_ack_wait() {
    let mock = MockTransport::new();
    let cancel = CancelFlag::default();
    cancel.store(true, Ordering::Relaxed);

    let err = StreamDispatcher::with_sink(ack_mode(10_000), NullSink)
        .with_cancel_flag(cancel)
        .stream(&samples_at(&[0.0]), mock.clone())
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled { sent: 0, .. }));
    assert!(mock.sent_lines().is_empty());
}

// ============================================================================
// Events
// ============================================================================

#[test]
fn test_event_sequence() {
    let mock = MockTransport::acknowledging();
    let samples = samples_at(&[0.0, 10.0]);

    let mut dispatcher = StreamDispatcher::with_sink(ack_mode(500), Vec::new());
    dispatcher.stream(&samples, mock).unwrap();
    let events = dispatcher.into_sink();

    assert!(matches!(
        events.first(),
        Some(StreamEvent::SessionStarted {
            samples: 2,
            ack_mode: true,
            ..
        })
    ));
    assert!(matches!(
        events.last(),
        Some(StreamEvent::SessionFinished {
            sent: 2,
            ack_timeouts: 0,
            device_errors: 0,
            ..
        })
    ));
    let kinds: Vec<_> = events[1..events.len() - 1]
        .iter()
        .map(|e| matches!(e, StreamEvent::SampleSent { .. }))
        .collect();
    assert_eq!(kinds, vec![true, false, true, false]);
}

#[test]
fn test_events_over_channel() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let observer = thread::spawn(move || {
        rx.iter()
            .filter(|e| matches!(e, StreamEvent::SampleSent { .. }))
            .count()
    });

    {
        let mut dispatcher = StreamDispatcher::with_sink(free_running(), tx);
        dispatcher
            .stream(&samples_at(&[0.0, 5.0, 10.0]), MockTransport::new())
            .unwrap();
    }

    assert_eq!(observer.join().unwrap(), 3);
}

// ============================================================================
// Single targets and waypoint sequences
// ============================================================================

#[test]
fn test_send_point_reached() {
    let mut mock = MockTransport::acknowledging();
    let mut dispatcher = StreamDispatcher::with_sink(ack_mode(500), NullSink);

    let outcome = dispatcher
        .send_point(Waypoint::new(124.0, 113.5), &mut mock)
        .unwrap();

    assert!(matches!(outcome, AckOutcome::Reached { .. }));
    assert_eq!(mock.sent_lines(), vec!["124,113.5\n"]);
    assert!(!mock.is_closed());
}

#[test]
fn test_send_point_timeout_is_outcome() {
    let mut mock = MockTransport::new();
    let mut dispatcher = StreamDispatcher::with_sink(ack_mode(30), NullSink);

    let outcome = dispatcher.send_point(Waypoint::new(1.0, 2.0), &mut mock).unwrap();
    assert_eq!(outcome, AckOutcome::TimedOut);
}

#[test]
fn test_send_waypoints() {
    let mock = MockTransport::acknowledging();
    let points = [
        Waypoint::new(137.0, 100.0),
        Waypoint::new(137.0, 126.0),
        Waypoint::new(111.0, 126.0),
    ];

    let start = Instant::now();
    let report = StreamDispatcher::with_sink(ack_mode(500), NullSink)
        .send_waypoints(&points, Duration::from_millis(40), mock.clone())
        .unwrap();

    assert_eq!(report.sent, 3);
    assert_eq!(report.acks, 3);
    assert!(start.elapsed() >= Duration::from_millis(120));
    assert_eq!(
        mock.sent_lines(),
        vec!["137,100\n", "137,126\n", "111,126\n"]
    );
    assert!(mock.is_closed());
}

#[test]
fn test_send_waypoints_write_failure() {
    let mock = MockTransport::acknowledging();
    mock.fail_from_write(1);
    let points = [Waypoint::new(0.0, 0.0), Waypoint::new(1.0, 1.0)];

    let err = StreamDispatcher::with_sink(ack_mode(500), NullSink)
        .send_waypoints(&points, Duration::ZERO, mock.clone())
        .unwrap_err();

    assert_eq!(err.samples_sent(), Some(1));
    assert!(mock.is_closed());
}

#[test]
fn test_free_function_stream() {
    let mock = MockTransport::new();
    let report =
        arm_link::stream::stream(&samples_at(&[0.0, 5.0]), mock.clone(), false, Duration::ZERO)
            .unwrap();
    assert_eq!(report.sent, 2);
    assert!(mock.is_closed());
}
