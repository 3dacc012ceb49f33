//! Core station abstraction and runner for the pipeline.

use crate::defaults;
use crate::pipeline::error::{ErrorReporter, StationError};
use crate::pipeline::stats::PipelineStats;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::warn;

/// A processing station in the pipeline.
///
/// Each station receives input, processes it, and produces output.
/// Stations run in their own threads and are connected by channels.
pub trait Station: Send + 'static {
    /// The input type this station receives.
    type Input: Send + 'static;
    /// The output type this station produces.
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but no output (e.g., filtered)
    /// - `Err(StationError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError>;

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called when the station is shutting down.
    ///
    /// Override this to perform cleanup operations.
    fn shutdown(&mut self) {}
}

/// Runs a station in a dedicated thread.
pub struct StationRunner {
    handle: Option<JoinHandle<()>>,
    station_name: &'static str,
}

impl StationRunner {
    /// Spawns a new station in a dedicated thread.
    ///
    /// The station drains queued input even after the stop flag is set; it
    /// exits once the flag is set and the input queue has gone quiet, or
    /// when every input sender is dropped.
    pub fn spawn<S: Station>(
        mut station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
        stats: Arc<PipelineStats>,
        should_stop: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        let station_name = station.name();

        let handle = thread::Builder::new()
            .name(station_name.to_string())
            .spawn(move || {
                run_station(
                    &mut station,
                    input_rx,
                    output_tx,
                    error_reporter,
                    stats,
                    should_stop,
                );
            })?;

        Ok(Self {
            handle: Some(handle),
            station_name,
        })
    }

    /// Returns the name of the station.
    pub fn name(&self) -> &'static str {
        self.station_name
    }

    /// Waits for the station thread to finish, detaching if the deadline
    /// passes first.
    pub fn join_deadline(&mut self, deadline: Duration) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let end = Instant::now() + deadline;
        while !handle.is_finished() && Instant::now() < end {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            if handle.join().is_err() {
                warn!(station = self.station_name, "station thread panicked");
            }
        } else {
            warn!(
                station = self.station_name,
                "station did not stop in time, detaching"
            );
        }
    }
}

fn run_station<S: Station>(
    station: &mut S,
    input_rx: Receiver<S::Input>,
    output_tx: Sender<S::Output>,
    error_reporter: Arc<dyn ErrorReporter>,
    stats: Arc<PipelineStats>,
    should_stop: Arc<AtomicBool>,
) {
    let station_name = station.name();

    loop {
        match input_rx.recv_timeout(defaults::STOP_POLL) {
            Ok(input) => match station.process(input) {
                Ok(Some(output)) => {
                    // Overloaded downstream drops the item; a vanished
                    // downstream ends the station.
                    match output_tx.try_send(output) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!(queue = station_name, "queue full, dropping newest item");
                            stats.overload_drops.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
                Ok(None) => {}
                Err(StationError::Recoverable(msg)) => {
                    error_reporter.report(station_name, &StationError::Recoverable(msg));
                }
                Err(StationError::Fatal(msg)) => {
                    error_reporter.report(station_name, &StationError::Fatal(msg));
                    break;
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                if should_stop.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Cleanup on shutdown
    station.shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::LogReporter;
    use crossbeam_channel::bounded;

    // Mock station that doubles integers
    struct DoublerStation {
        shutdown_called: Arc<AtomicBool>,
    }

    impl Station for DoublerStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: i32) -> Result<Option<i32>, StationError> {
            Ok(Some(input * 2))
        }

        fn name(&self) -> &'static str {
            "doubler"
        }

        fn shutdown(&mut self) {
            self.shutdown_called.store(true, Ordering::Relaxed);
        }
    }

    // Station that filters out odd numbers
    struct EvenFilterStation;

    impl Station for EvenFilterStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: i32) -> Result<Option<i32>, StationError> {
            if input % 2 == 0 {
                Ok(Some(input))
            } else {
                Ok(None)
            }
        }

        fn name(&self) -> &'static str {
            "even-filter"
        }
    }

    struct FailingStation {
        fatal: bool,
    }

    impl Station for FailingStation {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, _input: i32) -> Result<Option<i32>, StationError> {
            if self.fatal {
                Err(StationError::Fatal("boom".to_string()))
            } else {
                Err(StationError::Recoverable("hiccup".to_string()))
            }
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn spawn_station<S: Station>(
        station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
    ) -> (StationRunner, Arc<AtomicBool>) {
        let should_stop = Arc::new(AtomicBool::new(false));
        let runner = StationRunner::spawn(
            station,
            input_rx,
            output_tx,
            Arc::new(LogReporter),
            Arc::new(PipelineStats::default()),
            Arc::clone(&should_stop),
        )
        .unwrap();
        (runner, should_stop)
    }

    #[test]
    fn test_station_processes_and_forwards() {
        let (in_tx, in_rx) = bounded(4);
        let (out_tx, out_rx) = bounded(4);
        let shutdown_called = Arc::new(AtomicBool::new(false));
        let (mut runner, _stop) = spawn_station(
            DoublerStation {
                shutdown_called: Arc::clone(&shutdown_called),
            },
            in_rx,
            out_tx,
        );

        in_tx.send(21).unwrap();
        assert_eq!(out_rx.recv_timeout(Duration::from_secs(1)).unwrap(), 42);

        drop(in_tx);
        runner.join_deadline(Duration::from_secs(2));
        assert!(shutdown_called.load(Ordering::Relaxed));
    }

    #[test]
    fn test_filtered_input_produces_no_output() {
        let (in_tx, in_rx) = bounded(4);
        let (out_tx, out_rx) = bounded(4);
        let (mut runner, _stop) = spawn_station(EvenFilterStation, in_rx, out_tx);

        in_tx.send(1).unwrap();
        in_tx.send(2).unwrap();
        in_tx.send(3).unwrap();
        assert_eq!(out_rx.recv_timeout(Duration::from_secs(1)).unwrap(), 2);
        assert!(out_rx.try_recv().is_err());

        drop(in_tx);
        runner.join_deadline(Duration::from_secs(2));
    }

    #[test]
    fn test_recoverable_error_keeps_station_alive() {
        let (in_tx, in_rx) = bounded(4);
        let (out_tx, _out_rx) = bounded::<i32>(4);
        let (mut runner, _stop) = spawn_station(FailingStation { fatal: false }, in_rx, out_tx);

        in_tx.send(1).unwrap();
        in_tx.send(2).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        // Channel still open means the station is still consuming.
        assert!(in_tx.send(3).is_ok());

        drop(in_tx);
        runner.join_deadline(Duration::from_secs(2));
    }

    #[test]
    fn test_fatal_error_stops_station() {
        let (in_tx, in_rx) = bounded(4);
        let (out_tx, _out_rx) = bounded::<i32>(4);
        let (mut runner, _stop) = spawn_station(FailingStation { fatal: true }, in_rx, out_tx);

        in_tx.send(1).unwrap();
        runner.join_deadline(Duration::from_secs(2));
    }

    #[test]
    fn test_stop_flag_ends_idle_station() {
        let (in_tx, in_rx) = bounded::<i32>(4);
        let (out_tx, _out_rx) = bounded::<i32>(4);
        let (mut runner, stop) = spawn_station(EvenFilterStation, in_rx, out_tx);

        stop.store(true, Ordering::Relaxed);
        runner.join_deadline(Duration::from_secs(2));
        drop(in_tx);
    }
}
