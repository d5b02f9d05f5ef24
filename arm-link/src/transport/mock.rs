//! Mock transport for testing

use super::LineTransport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A line written through the mock, with the instant the write completed
#[derive(Debug, Clone)]
pub struct SentLine {
    pub line: String,
    pub at: Instant,
}

/// Mock transport for unit testing.
///
/// Cloning yields another handle to the same channel, so a test can keep one
/// handle for inspection while the dispatcher owns the other.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    /// Lines waiting to be received
    read_queue: VecDeque<String>,
    /// Everything written so far
    sent: Vec<SentLine>,
    /// Lines queued for reading after every successful write
    auto_reply: Vec<String>,
    /// Extra write duration, keyed by write index
    write_latency: HashMap<usize, Duration>,
    /// Writes at or past this index fail
    fail_from: Option<usize>,
    closed: bool,
    close_calls: usize,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner::default())),
        }
    }

    /// Mock that answers every write with `Position reached!`
    pub fn acknowledging() -> Self {
        let mock = Self::new();
        mock.reply_to_every_write(&["Position reached!"]);
        mock
    }

    /// Inject a line to be received
    pub fn inject_line(&self, line: &str) {
        self.inner.lock().read_queue.push_back(line.to_string());
    }

    /// Queue `lines` for reading after every successful write
    pub fn reply_to_every_write(&self, lines: &[&str]) {
        self.inner.lock().auto_reply = lines.iter().map(|l| l.to_string()).collect();
    }

    /// Make write number `index` (0-based) take `latency` longer
    pub fn delay_write(&self, index: usize, latency: Duration) {
        self.inner.lock().write_latency.insert(index, latency);
    }

    /// Make write number `index` (0-based) and every later write fail
    pub fn fail_from_write(&self, index: usize) {
        self.inner.lock().fail_from = Some(index);
    }

    /// Get all written lines
    pub fn sent(&self) -> Vec<SentLine> {
        self.inner.lock().sent.clone()
    }

    /// Get all written lines without timing
    pub fn sent_lines(&self) -> Vec<String> {
        self.inner.lock().sent.iter().map(|s| s.line.clone()).collect()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of `close` calls
    pub fn close_calls(&self) -> usize {
        self.inner.lock().close_calls
    }
}

impl LineTransport for MockTransport {
    fn send_line(&mut self, line: &str) -> Result<()> {
        let (index, latency) = {
            let inner = self.inner.lock();
            if inner.closed {
                return Err(Error::Transport("mock transport is closed".to_string()));
            }
            let index = inner.sent.len();
            if inner.fail_from.is_some_and(|n| index >= n) {
                return Err(Error::Transport(format!("injected write failure at {}", index)));
            }
            (index, inner.write_latency.get(&index).copied())
        };

        // Sleep without holding the lock so inspection handles stay usable
        if let Some(latency) = latency {
            thread::sleep(latency);
        }

        let mut inner = self.inner.lock();
        inner.sent.push(SentLine {
            line: line.to_string(),
            at: Instant::now(),
        });
        let replies = inner.auto_reply.clone();
        inner.read_queue.extend(replies);
        log::trace!("Mock write {}: {:?}", index, line);
        Ok(())
    }

    fn recv_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        if let Some(line) = self.inner.lock().read_queue.pop_front() {
            return Ok(Some(line));
        }
        thread::sleep(timeout);
        Ok(self.inner.lock().read_queue.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.close_calls += 1;
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
