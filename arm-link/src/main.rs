//! ArmLink - command-line front end for the planar arm
//!
//! Generates trajectories, saves and previews them as CSV, and streams them
//! to the arm controller over a serial port.
//!
//! # Usage
//!
//! ```bash
//! arm-link square --output paths/square_path.csv
//! arm-link generate --point 0,0 --point 10,0 --point 10,10 --closed
//! arm-link circle --center 124,113 --radius 10
//! arm-link preview paths/square_path.csv --rows 5
//! arm-link --port /dev/ttyACM0 stream paths/square_path.csv --ack
//! arm-link --port /dev/ttyACM0 stream paths/square_path.csv --no-ack
//! arm-link copy paths/square_path.csv square_backup
//! arm-link send 124,113
//! ```
//!
//! Settings come from `arm-link.toml` (see [`arm_link::config`]); flags win.

use arm_link::config::ArmConfig;
use arm_link::error::{Error, Result};
use arm_link::protocol;
use arm_link::stream::{AckOutcome, CancelFlag, LogSink, StreamDispatcher, StreamEvent, StreamOptions};
use arm_link::transport::{LineTransport, SerialTransport};
use arm_path::csv_io;
use arm_path::shapes;
use arm_path::summary::write_sample_table;
use arm_path::{PathSpec, TimeSample, Trajectory, TrajectorySummary, Waypoint};
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::Receiver;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "arm-link")]
#[command(about = "Generate, preview and stream trajectories for a two-link planar arm")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "arm-link.toml", global = true)]
    config: PathBuf,

    /// Serial port (overrides config)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate (overrides config)
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sample a polyline through the given waypoints
    Generate {
        /// Waypoint as `x,y` (repeat in path order)
        #[arg(long = "point", value_parser = parse_waypoint, required = true)]
        points: Vec<Waypoint>,

        /// Return to the first waypoint at the end
        #[arg(long)]
        closed: bool,

        #[command(flatten)]
        timing: Timing,
    },

    /// Sample the calibration square
    Square {
        #[command(flatten)]
        timing: Timing,
    },

    /// Sample a full circle
    Circle {
        /// Center as `x,y`
        #[arg(long, value_parser = parse_waypoint)]
        center: Waypoint,

        #[arg(long)]
        radius: f64,

        /// Angle of the first sample (radians)
        #[arg(long, default_value = "0.0")]
        start_angle: f64,

        #[command(flatten)]
        timing: Timing,
    },

    /// Print a summary and the first and last rows of a trajectory file
    Preview {
        file: PathBuf,

        /// Rows shown at each end
        #[arg(long, default_value = "5")]
        rows: usize,
    },

    /// List trajectory files in a directory
    List {
        /// Directory to scan (defaults to `output.paths_dir`)
        dir: Option<PathBuf>,
    },

    /// Save a copy of a trajectory file under a new name
    Copy {
        file: PathBuf,

        /// New name (stored in `output.paths_dir`) or full path
        name: PathBuf,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Stream a trajectory file to the arm
    Stream {
        file: PathBuf,

        #[command(flatten)]
        flags: StreamFlags,
    },

    /// Send one target and wait for the answer
    Send {
        /// Target as `x,y`
        #[arg(value_parser = parse_waypoint)]
        point: Waypoint,
    },

    /// Send targets one by one, each waiting for the answer
    Waypoints {
        /// Targets as `x,y`
        #[arg(value_parser = parse_waypoint, required = true)]
        points: Vec<Waypoint>,

        /// Pause between targets (ms)
        #[arg(long, default_value = "500")]
        delay_ms: u64,
    },
}

/// Sampling and output options shared by the generator commands
#[derive(Args)]
struct Timing {
    /// Total duration (ms, overrides config)
    #[arg(long)]
    duration_ms: Option<f64>,

    /// Sampling rate (Hz, overrides config)
    #[arg(long)]
    rate: Option<u32>,

    /// Save to this CSV file (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stream the result to the arm right away
    #[arg(long)]
    stream: bool,
}

/// Per-run overrides of the `[streaming]` section
#[derive(Args)]
struct StreamFlags {
    /// Wait for `Position reached!` after each sample
    #[arg(long, overrides_with = "no_ack")]
    ack: bool,

    /// Send without waiting for acknowledgments
    #[arg(long, overrides_with = "ack")]
    no_ack: bool,

    /// Delay before the first sample (ms)
    #[arg(long)]
    start_delay_ms: Option<u64>,
}

impl StreamFlags {
    fn apply(&self, options: &mut StreamOptions) {
        if self.ack {
            options.ack_mode = true;
        } else if self.no_ack {
            options.ack_mode = false;
        }
        if let Some(ms) = self.start_delay_ms {
            options.start_delay = Duration::from_millis(ms);
        }
    }
}

fn parse_waypoint(raw: &str) -> std::result::Result<Waypoint, String> {
    protocol::parse_point(raw).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, source) = ArmConfig::load_or_default(&cli.config)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
        .init();
    log::info!("Using config: {}", source);

    if let Some(port) = &cli.port {
        config.connection.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.connection.baud_rate = baud;
    }

    match cli.command {
        Command::Generate {
            points,
            closed,
            timing,
        } => {
            let spec = PathSpec::with_waypoints(points, closed);
            let (duration_ms, rate_hz) = timing.resolve(&config);
            let trajectory = arm_path::generate(&spec, duration_ms, rate_hz)?;
            finish_generated(&config, &timing, &trajectory)
        }
        Command::Square { timing } => {
            let (duration_ms, rate_hz) = timing.resolve(&config);
            let trajectory = shapes::calibration_square_trajectory(duration_ms, rate_hz)?;
            finish_generated(&config, &timing, &trajectory)
        }
        Command::Circle {
            center,
            radius,
            start_angle,
            timing,
        } => {
            let (duration_ms, rate_hz) = timing.resolve(&config);
            let trajectory =
                arm_path::generate_circle(center, radius, duration_ms, rate_hz, start_angle)?;
            finish_generated(&config, &timing, &trajectory)
        }
        Command::Preview { file, rows } => preview(&file, rows),
        Command::List { dir } => {
            let dir = dir.unwrap_or_else(|| config.output.paths_dir.clone());
            let files = csv_io::list_trajectory_files(&dir)?;
            if files.is_empty() {
                println!("No trajectory files in {}", dir.display());
            }
            for name in files {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Copy { file, name, force } => {
            let target = copy_target(&config.output.paths_dir, &name);
            let count = csv_io::copy_trajectory(&file, &target, force)?;
            println!("Saved {} samples to {}", count, target.display());
            Ok(())
        }
        Command::Stream { file, flags } => {
            let trajectory = csv_io::load_trajectory(&file)?;
            let mut options = StreamOptions::from(&config.streaming);
            flags.apply(&mut options);
            stream_file(&config, options, &trajectory)
        }
        Command::Send { point } => send_one(&config, point),
        Command::Waypoints { points, delay_ms } => {
            let cancel = install_cancel_handler()?;
            let transport = open_transport(&config)?;
            let mut dispatcher =
                StreamDispatcher::new(StreamOptions::from(&config.streaming)).with_cancel_flag(cancel);
            let report =
                dispatcher.send_waypoints(&points, Duration::from_millis(delay_ms), transport)?;
            println!(
                "Sent {}/{} waypoints ({} reached, {} errors, {} timeouts)",
                report.sent, report.total, report.acks, report.device_errors, report.ack_timeouts
            );
            Ok(())
        }
    }
}

impl Timing {
    fn resolve(&self, config: &ArmConfig) -> (f64, u32) {
        (
            self.duration_ms.unwrap_or(config.trajectory.duration_ms),
            self.rate.unwrap_or(config.trajectory.rate_hz),
        )
    }
}

/// Print a summary, save if an output path is configured, stream if asked
fn finish_generated(config: &ArmConfig, timing: &Timing, trajectory: &Trajectory) -> Result<()> {
    if let Some(summary) = TrajectorySummary::of(trajectory) {
        println!("Generated trajectory:\n{}", summary);
    }

    let output = timing.output.as_ref().or(config.output.csv_path.as_ref());
    match output {
        Some(path) => {
            csv_io::save_trajectory(path, trajectory)?;
            println!("Saved {} samples to {}", trajectory.len(), path.display());
        }
        None => log::info!("No output path given; trajectory not saved"),
    }

    if timing.stream {
        stream_file(config, StreamOptions::from(&config.streaming), trajectory)?;
    }
    Ok(())
}

/// A bare name lands in `paths_dir`; a missing extension becomes `.csv`
fn copy_target(paths_dir: &Path, name: &Path) -> PathBuf {
    let bare = name.parent().map_or(true, |p| p.as_os_str().is_empty());
    let mut target = if bare {
        paths_dir.join(name)
    } else {
        name.to_path_buf()
    };
    if target.extension().is_none() {
        target.set_extension(csv_io::EXTENSION);
    }
    target
}

fn preview(file: &Path, rows: usize) -> Result<()> {
    let trajectory = csv_io::load_trajectory(file)?;
    let Some(summary) = TrajectorySummary::of(&trajectory) else {
        return Ok(());
    };
    println!("{}\n{}\n", file.display(), summary);

    let samples: &[TimeSample] = &trajectory;
    let table = sample_table(samples, rows).map_err(|e| Error::Other(e.to_string()))?;
    print!("{}", table);
    Ok(())
}

/// Whole table for short trajectories, head and tail otherwise
fn sample_table(samples: &[TimeSample], rows: usize) -> std::result::Result<String, fmt::Error> {
    let mut table = String::new();
    if samples.len() <= rows * 2 {
        write_sample_table(&mut table, samples, 0)?;
    } else {
        let tail_start = samples.len() - rows;
        write_sample_table(&mut table, &samples[..rows], 0)?;
        writeln!(table, "  ...")?;
        write_sample_table(&mut table, &samples[tail_start..], tail_start)?;
    }
    Ok(table)
}

fn open_transport(config: &ArmConfig) -> Result<SerialTransport> {
    SerialTransport::open(
        &config.connection.port,
        config.connection.baud_rate,
        Duration::from_millis(config.connection.reset_settle_ms),
    )
}

/// Cancel flag set by Ctrl-C
fn install_cancel_handler() -> Result<CancelFlag> {
    let cancel = CancelFlag::default();
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        log::info!("Received interrupt, stopping stream");
        flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;
    Ok(cancel)
}

fn stream_file(config: &ArmConfig, options: StreamOptions, trajectory: &Trajectory) -> Result<()> {
    let cancel = install_cancel_handler()?;
    let transport = open_transport(config)?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let progress = thread::Builder::new()
        .name("stream-progress".to_string())
        .spawn(move || report_progress(rx))?;

    let result = {
        let mut dispatcher =
            StreamDispatcher::with_sink(options, (LogSink, tx)).with_cancel_flag(cancel);
        dispatcher.stream(trajectory, transport)
    };
    // Dispatcher (and its sender) dropped above, so the observer drains and exits
    if progress.join().is_err() {
        log::warn!("Progress thread panicked");
    }

    let report = result?;
    println!(
        "Streamed {}/{} samples in {:.2}s ({} late, max {:.1} ms)",
        report.sent,
        report.total,
        report.elapsed.as_secs_f64(),
        report.late_samples,
        report.max_lateness.as_secs_f64() * 1000.0
    );
    Ok(())
}

/// Print a progress line every tenth of the trajectory
fn report_progress(rx: Receiver<StreamEvent>) {
    let mut total = 0;
    let mut next_mark = 1;
    for event in rx {
        match event {
            StreamEvent::SessionStarted { samples, .. } => total = samples,
            StreamEvent::SampleSent { index, .. } if total > 0 => {
                let done = index + 1;
                if done * 10 >= next_mark * total {
                    println!("  {:>3}% ({}/{})", done * 100 / total, done, total);
                    next_mark = done * 10 / total + 1;
                }
            }
            _ => {}
        }
    }
}

fn send_one(config: &ArmConfig, point: Waypoint) -> Result<()> {
    let mut transport = open_transport(config)?;
    let mut dispatcher = StreamDispatcher::new(StreamOptions::from(&config.streaming));
    let outcome = dispatcher.send_point(point, &mut transport);

    if let Err(e) = transport.close() {
        log::warn!("Failed to close transport: {}", e);
    }

    match outcome? {
        AckOutcome::Reached { line, waited } => {
            println!("{} ({:.0} ms)", line, waited.as_secs_f64() * 1000.0);
            Ok(())
        }
        AckOutcome::DeviceError { line, .. } => Err(Error::Device(line)),
        AckOutcome::TimedOut => Err(Error::AckTimeout {
            timeout_ms: config.streaming.ack_timeout_ms,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_flags(args: &[&str]) -> StreamFlags {
        let argv = ["arm-link", "stream", "path.csv"].iter().chain(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Stream { flags, .. } => flags,
            _ => panic!("expected stream command"),
        }
    }

    fn acking() -> StreamOptions {
        StreamOptions {
            ack_mode: true,
            ..StreamOptions::default()
        }
    }

    #[test]
    fn test_no_ack_overrides_config() {
        let mut options = acking();
        stream_flags(&["--no-ack"]).apply(&mut options);
        assert!(!options.ack_mode);
    }

    #[test]
    fn test_no_flag_keeps_config() {
        let mut options = acking();
        stream_flags(&[]).apply(&mut options);
        assert!(options.ack_mode);

        let mut options = StreamOptions::default();
        stream_flags(&[]).apply(&mut options);
        assert!(!options.ack_mode);
    }

    #[test]
    fn test_last_ack_flag_wins() {
        let mut options = StreamOptions::default();
        stream_flags(&["--no-ack", "--ack"]).apply(&mut options);
        assert!(options.ack_mode);

        let mut options = StreamOptions::default();
        stream_flags(&["--ack", "--no-ack", "--start-delay-ms", "250"]).apply(&mut options);
        assert!(!options.ack_mode);
        assert_eq!(options.start_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_copy_target() {
        let dir = Path::new("paths");
        assert_eq!(
            copy_target(dir, Path::new("square_v2")),
            PathBuf::from("paths/square_v2.csv")
        );
        assert_eq!(
            copy_target(dir, Path::new("square_v2.csv")),
            PathBuf::from("paths/square_v2.csv")
        );
        assert_eq!(
            copy_target(dir, Path::new("out/backup")),
            PathBuf::from("out/backup.csv")
        );
    }

    #[test]
    fn test_copy_command_parses() {
        let cli = Cli::try_parse_from(["arm-link", "copy", "a.csv", "b", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Copy { force: true, .. }
        ));
    }
}
