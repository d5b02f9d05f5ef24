//! Trajectory streaming: pacing, acknowledgment gating and progress events

pub mod dispatcher;
pub mod events;
pub mod pacer;

pub use dispatcher::{
    stream, AckOutcome, AckTimeoutPolicy, StreamDispatcher, StreamOptions, StreamReport,
    StreamSession,
};
pub use events::{EventSink, FnSink, LogSink, NullSink, StreamEvent};
pub use pacer::{CancelFlag, Pacer};
