//! Connection lifecycle management.
//!
//! Two threads share the work. The worker thread owns the link: it performs
//! the initial scan/connect/subscribe handshake, then serves write, probe and
//! reconnect requests from the request channel. The monitor thread drives a
//! periodic heartbeat probe through that same channel and, when the probe
//! fails, runs the bounded reconnect loop.

use crate::config::LinkConfig;
use crate::defaults;
use crate::error::{BridgeError, Result};
use crate::link::transport::{find_device, Link, NotificationCallback};
use crate::link::writer::{LinkRequest, LinkWriterHandle};
use crate::protocol::message::CommandCode;
use crate::protocol::Transmitter;
use crossbeam_channel::Receiver;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Scanning,
    Connecting,
    Connected,
    Monitoring,
    Reconnecting,
    /// Reconnection gave up; the session is over.
    Failed,
    /// Deliberate shutdown.
    Disconnected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Idle => "idle",
            LinkState::Scanning => "scanning",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Monitoring => "monitoring",
            LinkState::Reconnecting => "reconnecting",
            LinkState::Failed => "failed",
            LinkState::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// State shared between the worker, the monitor and the session.
pub struct ConnectionShared {
    state: Mutex<LinkState>,
    connected: AtomicBool,
    reconnect_attempts: AtomicU32,
    last_heartbeat: Mutex<Option<Instant>>,
}

impl ConnectionShared {
    fn new() -> Self {
        Self {
            state: Mutex::new(LinkState::Idle),
            connected: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            last_heartbeat: Mutex::new(None),
        }
    }

    fn set_state(&self, new: LinkState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != new {
            info!(from = %*state, to = %new, "link state changed");
            *state = new;
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        *self.last_heartbeat.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct ConnectionManager;

impl ConnectionManager {
    /// Establish the connection and spawn the worker and monitor threads.
    ///
    /// Blocks until the initial scan/connect/subscribe handshake finishes;
    /// handshake failures are returned to the caller rather than retried.
    pub fn start(
        mut link: Box<dyn Link>,
        config: LinkConfig,
        callback: NotificationCallback,
        writer: LinkWriterHandle,
        request_rx: Receiver<LinkRequest>,
        should_stop: Arc<AtomicBool>,
    ) -> Result<ConnectionHandle> {
        let shared = Arc::new(ConnectionShared::new());
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let worker_shared = Arc::clone(&shared);
        let worker_stop = Arc::clone(&should_stop);
        let worker_config = config.clone();
        let worker = std::thread::Builder::new()
            .name("link-worker".to_string())
            .spawn(move || {
                let handshake = handshake(link.as_mut(), &worker_config, callback, &worker_shared);
                let ok = handshake.is_ok();
                // The channel only drops if start() already gave up waiting.
                let _: std::result::Result<_, _> = ready_tx.send(handshake);
                if ok {
                    serve_requests(
                        link.as_mut(),
                        &worker_config,
                        &worker_shared,
                        &request_rx,
                        &worker_stop,
                    );
                }
                link.disconnect();
                if worker_shared.state() != LinkState::Failed {
                    worker_shared.set_state(LinkState::Disconnected);
                }
                worker_shared.connected.store(false, Ordering::Relaxed);
            })?;

        let handshake_deadline = Duration::from_millis(
            config.scan_timeout_ms + config.write_timeout_ms + 1000,
        );
        match ready_rx.recv_timeout(handshake_deadline) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _: std::result::Result<_, _> = worker.join();
                return Err(e);
            }
            Err(_) => {
                should_stop.store(true, Ordering::Relaxed);
                return Err(BridgeError::LinkTimeout {
                    operation: "handshake".to_string(),
                });
            }
        }

        let monitor_shared = Arc::clone(&shared);
        let monitor_stop = Arc::clone(&should_stop);
        let monitor_writer = writer.clone();
        let monitor_config = config;
        let monitor = std::thread::Builder::new()
            .name("link-monitor".to_string())
            .spawn(move || {
                run_monitor(&monitor_config, &monitor_shared, &monitor_writer, &monitor_stop);
            })?;

        Ok(ConnectionHandle {
            shared,
            writer,
            should_stop,
            worker: Some(worker),
            monitor: Some(monitor),
        })
    }
}

fn handshake(
    link: &mut dyn Link,
    config: &LinkConfig,
    callback: NotificationCallback,
    shared: &ConnectionShared,
) -> Result<()> {
    shared.set_state(LinkState::Scanning);
    let peer = find_device(
        link,
        &config.device_name,
        Duration::from_millis(config.scan_timeout_ms),
    )?;
    info!(name = %peer.name, id = %peer.id, "peripheral found");

    shared.set_state(LinkState::Connecting);
    link.connect(&peer.id)?;
    link.subscribe(callback)?;

    shared.set_state(LinkState::Connected);
    shared.connected.store(true, Ordering::Relaxed);
    Ok(())
}

fn serve_requests(
    link: &mut dyn Link,
    config: &LinkConfig,
    shared: &ConnectionShared,
    request_rx: &Receiver<LinkRequest>,
    should_stop: &AtomicBool,
) {
    shared.set_state(LinkState::Monitoring);
    let transmitter = Transmitter::new(Duration::from_millis(config.inter_chunk_delay_ms));

    loop {
        match request_rx.recv_timeout(defaults::STOP_POLL) {
            Ok(LinkRequest::Send { message, reply }) => {
                let result = transmitter.transmit(link, &message);
                if let Err(e) = &result {
                    warn!(error = %e, "link write failed");
                    shared.connected.store(false, Ordering::Relaxed);
                }
                let _: std::result::Result<_, _> = reply.send(result);
            }
            Ok(LinkRequest::Probe { reply }) => {
                let result = link.write_command(&[CommandCode::Status.tag()]);
                match &result {
                    Ok(()) => {
                        *shared.last_heartbeat.lock().unwrap_or_else(|e| e.into_inner()) =
                            Some(Instant::now());
                    }
                    Err(e) => {
                        debug!(error = %e, "heartbeat probe failed");
                        shared.connected.store(false, Ordering::Relaxed);
                    }
                }
                let _: std::result::Result<_, _> = reply.send(result);
            }
            Ok(LinkRequest::Reconnect { reply }) => {
                let result = link.reconnect();
                if result.is_ok() {
                    shared.connected.store(true, Ordering::Relaxed);
                }
                let _: std::result::Result<_, _> = reply.send(result);
            }
            Ok(LinkRequest::Shutdown) => break,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if should_stop.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn run_monitor(
    config: &LinkConfig,
    shared: &ConnectionShared,
    writer: &LinkWriterHandle,
    should_stop: &AtomicBool,
) {
    let interval = Duration::from_millis(config.heartbeat_interval_ms);
    let backoff = Duration::from_millis(config.reconnect_backoff_ms);

    loop {
        if !sleep_unless_stopped(interval, should_stop) {
            return;
        }
        match writer.probe() {
            Ok(()) => {}
            Err(e) => {
                warn!(error = %e, "heartbeat lost, starting reconnection");
                if !reconnect_until_recovered(config, shared, writer, should_stop, backoff) {
                    shared.set_state(LinkState::Failed);
                    shared.connected.store(false, Ordering::Relaxed);
                    error!(
                        attempts = config.max_reconnect_attempts,
                        "reconnection exhausted, giving up"
                    );
                    return;
                }
            }
        }
    }
}

/// Run the bounded reconnect loop. Returns true once the link is back, false
/// when the attempt budget is spent. An external stop also returns true so
/// the caller exits without marking the session failed.
fn reconnect_until_recovered(
    config: &LinkConfig,
    shared: &ConnectionShared,
    writer: &LinkWriterHandle,
    should_stop: &AtomicBool,
    backoff: Duration,
) -> bool {
    shared.set_state(LinkState::Reconnecting);
    shared.connected.store(false, Ordering::Relaxed);

    let mut attempts = 0;
    loop {
        if should_stop.load(Ordering::Relaxed) {
            return true;
        }
        attempts += 1;
        shared.reconnect_attempts.store(attempts, Ordering::Relaxed);
        info!(
            attempt = attempts,
            max = config.max_reconnect_attempts,
            "reconnect attempt"
        );
        match writer.reconnect() {
            Ok(()) => {
                shared.reconnect_attempts.store(0, Ordering::Relaxed);
                shared.connected.store(true, Ordering::Relaxed);
                shared.set_state(LinkState::Monitoring);
                info!("link recovered");
                return true;
            }
            Err(e) => {
                warn!(attempt = attempts, error = %e, "reconnect failed");
                if attempts >= config.max_reconnect_attempts {
                    return false;
                }
                if !sleep_unless_stopped(backoff, should_stop) {
                    return true;
                }
            }
        }
    }
}

/// Sleep for `duration` in stop-poll steps. Returns false if stopped.
fn sleep_unless_stopped(duration: Duration, should_stop: &AtomicBool) -> bool {
    let mut waited = Duration::ZERO;
    while waited < duration {
        if should_stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = defaults::STOP_POLL.min(duration - waited);
        std::thread::sleep(step);
        waited += step;
    }
    !should_stop.load(Ordering::Relaxed)
}

/// Handle to a running connection.
pub struct ConnectionHandle {
    shared: Arc<ConnectionShared>,
    writer: LinkWriterHandle,
    should_stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle").finish_non_exhaustive()
    }
}

impl ConnectionHandle {
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts()
    }

    pub fn shared(&self) -> Arc<ConnectionShared> {
        Arc::clone(&self.shared)
    }

    /// Stop both threads, waiting up to the deadline for each before
    /// detaching.
    pub fn stop(mut self, deadline: Duration) {
        self.should_stop.store(true, Ordering::Relaxed);
        self.writer.shutdown();
        join_with_deadline(self.monitor.take(), "link-monitor", deadline);
        join_with_deadline(self.worker.take(), "link-worker", deadline);
    }
}

fn join_with_deadline(handle: Option<JoinHandle<()>>, name: &str, deadline: Duration) {
    let Some(handle) = handle else { return };
    let end = Instant::now() + deadline;
    while !handle.is_finished() && Instant::now() < end {
        std::thread::sleep(Duration::from_millis(10));
    }
    if handle.is_finished() {
        if handle.join().is_err() {
            warn!(thread = name, "thread panicked");
        }
    } else {
        // Detach rather than hang shutdown on a stuck thread.
        warn!(thread = name, "thread did not stop in time, detaching");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::transport::MockLink;
    use crate::link::writer::writer_channel;

    fn fast_config() -> LinkConfig {
        LinkConfig {
            device_name: "ESP32-VoiceMic".to_string(),
            scan_timeout_ms: 100,
            heartbeat_interval_ms: 50,
            reconnect_backoff_ms: 10,
            max_reconnect_attempts: 5,
            write_timeout_ms: 1000,
            inter_chunk_delay_ms: 0,
        }
    }

    fn start(
        link: MockLink,
        config: LinkConfig,
    ) -> (Result<ConnectionHandle>, Arc<AtomicBool>) {
        let should_stop = Arc::new(AtomicBool::new(false));
        let (writer, request_rx) = writer_channel(8, Duration::from_millis(config.write_timeout_ms));
        let handle = ConnectionManager::start(
            Box::new(link),
            config,
            Box::new(|_| {}),
            writer,
            request_rx,
            Arc::clone(&should_stop),
        );
        (handle, should_stop)
    }

    #[test]
    fn test_handshake_connects_and_subscribes() {
        let link = MockLink::new();
        let mock = link.handle();
        let (handle, _stop) = start(link, fast_config());
        let handle = handle.unwrap();

        assert!(handle.is_connected());
        assert_eq!(handle.state(), LinkState::Monitoring);
        assert!(mock.is_subscribed());
        assert_eq!(mock.connect_attempts(), 1);
        handle.stop(Duration::from_secs(2));
    }

    #[test]
    fn test_handshake_failure_surfaces_to_caller() {
        let link = MockLink::new().with_peers(vec![]);
        let (handle, _stop) = start(link, fast_config());
        assert!(matches!(
            handle.unwrap_err(),
            BridgeError::NoDeviceFound { .. }
        ));
    }

    #[test]
    fn test_heartbeat_failure_triggers_recovery() {
        let link = MockLink::new();
        let mock = link.handle();
        let (handle, _stop) = start(link, fast_config());
        let handle = handle.unwrap();

        // Sever the link; the next heartbeat fails and one reconnect wins.
        mock.drop_connection();
        let deadline = Instant::now() + Duration::from_secs(3);
        while mock.connect_attempts() < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        // Give the monitor a moment to publish the recovered state.
        let deadline = Instant::now() + Duration::from_secs(1);
        while !handle.is_connected() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_connected());
        assert_eq!(handle.state(), LinkState::Monitoring);
        assert_eq!(handle.reconnect_attempts(), 0);
        // Initial connect plus exactly one reconnect.
        assert_eq!(mock.connect_attempts(), 2);
        handle.stop(Duration::from_secs(2));
    }

    #[test]
    fn test_reconnect_exhaustion_fails_session() {
        let link = MockLink::new();
        let mock = link.handle();
        let (handle, _stop) = start(link, fast_config());
        let handle = handle.unwrap();

        mock.drop_connection();
        mock.fail_next_connects(u32::MAX);
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.state() != LinkState::Failed && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(handle.state(), LinkState::Failed);
        assert!(!handle.is_connected());
        assert_eq!(handle.reconnect_attempts(), 5);
        // Initial connect plus exactly max_reconnect_attempts reconnects.
        assert_eq!(mock.connect_attempts(), 6);
        handle.stop(Duration::from_secs(2));
    }

    #[test]
    fn test_stop_is_clean_and_idempotent_on_state() {
        let link = MockLink::new();
        let (handle, stop) = start(link, fast_config());
        let handle = handle.unwrap();
        let shared = handle.shared();
        handle.stop(Duration::from_secs(2));
        assert!(stop.load(Ordering::Relaxed));
        assert_eq!(shared.state(), LinkState::Disconnected);
        assert!(!shared.is_connected());
    }
}
