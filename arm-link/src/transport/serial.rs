//! Serial transport implementation

use super::LineTransport;
use crate::error::{Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

/// Port read timeout; bounds how long one poll blocks inside `recv_line`
const READ_POLL: Duration = Duration::from_millis(10);

/// How long to collect startup banner lines after the settle period
const BANNER_DRAIN: Duration = Duration::from_millis(500);

/// Serial transport for the arm controller's USB UART
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    /// Bytes received but not yet terminated by a newline
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// The controller board resets when the port opens, so this waits
    /// `reset_settle` before draining and logging whatever the firmware
    /// prints on boot.
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyACM0", "COM12")
    /// * `baud_rate` - Baud rate (e.g., 9600)
    /// * `reset_settle` - Time to wait for the board to reboot
    pub fn open(path: &str, baud_rate: u32, reset_settle: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_POLL)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        let mut transport = SerialTransport {
            port: Some(port),
            name: path.to_string(),
            pending: Vec::new(),
        };

        if !reset_settle.is_zero() {
            log::debug!("Waiting {:?} for controller reset", reset_settle);
            thread::sleep(reset_settle);
        }
        transport.drain_banner()?;

        Ok(transport)
    }

    /// Port path this transport was opened on
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log everything the firmware printed after reset
    fn drain_banner(&mut self) -> Result<()> {
        let deadline = Instant::now() + BANNER_DRAIN;
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match self.recv_line(remaining)? {
                Some(line) => log::info!("Controller: {}", line),
                None => break,
            }
        }
        Ok(())
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| Error::Transport(format!("serial port {} is closed", self.name)))
    }

    /// Split the first complete line off the pending buffer
    fn take_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).trim().to_string())
    }
}

impl LineTransport for SerialTransport {
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.port()?.write_all(line.as_bytes())?;
        Ok(())
    }

    fn recv_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; 256];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }

            match self.port()?.read(&mut buffer) {
                Ok(n) => self.pending.extend_from_slice(&buffer[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            log::info!("Serial connection {} closed", self.name);
        }
        self.pending.clear();
        Ok(())
    }
}
