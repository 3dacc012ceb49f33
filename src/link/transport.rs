//! Transport abstraction over the wireless link.
//!
//! The real radio is owned by a collaborator process; this crate talks to it
//! through the [`Link`] trait so every layer above can be exercised against
//! in-process implementations.

use crate::defaults;
use crate::error::{BridgeError, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Callback invoked with each inbound notification payload.
pub type NotificationCallback = Box<dyn FnMut(&[u8]) + Send>;

/// A peripheral observed during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub id: String,
    pub name: String,
}

/// Transport over the wireless link to the voice peripheral.
///
/// A `Link` is owned by exactly one thread; nothing here is `Sync`. After a
/// successful [`reconnect`](Link::reconnect), implementations re-arm inbound
/// notifications with the callback stored by the last
/// [`subscribe`](Link::subscribe) call.
pub trait Link: Send {
    /// Discover nearby peripherals, returning whatever advertised within the
    /// timeout.
    fn scan(&mut self, timeout: Duration) -> Result<Vec<PeerInfo>>;

    /// Connect to a previously discovered peripheral.
    fn connect(&mut self, peer_id: &str) -> Result<()>;

    /// Register the inbound notification callback and start delivery.
    fn subscribe(&mut self, callback: NotificationCallback) -> Result<()>;

    /// Stop inbound notification delivery.
    fn unsubscribe(&mut self) -> Result<()>;

    /// Write one chunk to the audio characteristic.
    fn write_audio(&mut self, chunk: &[u8]) -> Result<()>;

    /// Write one chunk to the command characteristic.
    fn write_command(&mut self, chunk: &[u8]) -> Result<()>;

    /// Tear down and re-establish the connection to the same peripheral.
    fn reconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn disconnect(&mut self);

    /// Largest payload a single write may carry.
    fn max_write_size(&self) -> usize {
        defaults::LINK_CHUNK_SIZE
    }
}

/// Scan for a peripheral by advertised name.
pub fn find_device(link: &mut dyn Link, name: &str, timeout: Duration) -> Result<PeerInfo> {
    let peers = link.scan(timeout)?;
    debug!(count = peers.len(), "scan finished");
    peers
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| BridgeError::NoDeviceFound {
            name: name.to_string(),
        })
}

#[derive(Default)]
struct MockLinkInner {
    peers: Vec<PeerInfo>,
    connected: bool,
    connect_attempts: u32,
    remaining_connect_failures: u32,
    subscribed: bool,
    audio_writes: Vec<Vec<u8>>,
    command_writes: Vec<Vec<u8>>,
    fail_writes: bool,
    max_write_size: usize,
}

/// In-process [`Link`] for tests: records every write and lets the test drive
/// connection failures and inbound notifications.
pub struct MockLink {
    inner: Arc<Mutex<MockLinkInner>>,
    callback: Option<NotificationCallback>,
    callback_slot: Arc<Mutex<Option<NotificationCallback>>>,
}

/// Test-side handle to a [`MockLink`] that has been handed to the code under
/// test.
#[derive(Clone)]
pub struct MockLinkHandle {
    inner: Arc<Mutex<MockLinkInner>>,
    callback_slot: Arc<Mutex<Option<NotificationCallback>>>,
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLink {
    pub fn new() -> Self {
        let inner = MockLinkInner {
            peers: vec![PeerInfo {
                id: "00:11:22:33:44:55".to_string(),
                name: defaults::DEVICE_NAME.to_string(),
            }],
            max_write_size: defaults::LINK_CHUNK_SIZE,
            ..Default::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            callback: None,
            callback_slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_peers(self, peers: Vec<PeerInfo>) -> Self {
        self.inner.lock().unwrap().peers = peers;
        self
    }

    pub fn with_max_write_size(self, size: usize) -> Self {
        self.inner.lock().unwrap().max_write_size = size;
        self
    }

    /// Handle for inspecting and steering this link from the test thread.
    pub fn handle(&self) -> MockLinkHandle {
        MockLinkHandle {
            inner: Arc::clone(&self.inner),
            callback_slot: Arc::clone(&self.callback_slot),
        }
    }
}

impl Link for MockLink {
    fn scan(&mut self, _timeout: Duration) -> Result<Vec<PeerInfo>> {
        Ok(self.inner.lock().unwrap().peers.clone())
    }

    fn connect(&mut self, peer_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_attempts += 1;
        if inner.remaining_connect_failures > 0 {
            inner.remaining_connect_failures -= 1;
            return Err(BridgeError::LinkConnect {
                message: format!("simulated failure connecting to {peer_id}"),
            });
        }
        inner.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, callback: NotificationCallback) -> Result<()> {
        self.inner.lock().unwrap().subscribed = true;
        self.callback = Some(callback);
        // Mirror into the handle so tests can inject notifications after the
        // link has moved into the worker thread.
        *self.callback_slot.lock().unwrap() = self.callback.take();
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<()> {
        self.inner.lock().unwrap().subscribed = false;
        *self.callback_slot.lock().unwrap() = None;
        Ok(())
    }

    fn write_audio(&mut self, chunk: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes || !inner.connected {
            return Err(BridgeError::LinkWrite {
                message: "mock link not writable".to_string(),
            });
        }
        inner.audio_writes.push(chunk.to_vec());
        Ok(())
    }

    fn write_command(&mut self, chunk: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes || !inner.connected {
            return Err(BridgeError::LinkWrite {
                message: "mock link not writable".to_string(),
            });
        }
        inner.command_writes.push(chunk.to_vec());
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_attempts += 1;
        if inner.remaining_connect_failures > 0 {
            inner.remaining_connect_failures -= 1;
            return Err(BridgeError::LinkConnect {
                message: "simulated reconnect failure".to_string(),
            });
        }
        inner.connected = true;
        inner.fail_writes = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    fn disconnect(&mut self) {
        self.inner.lock().unwrap().connected = false;
    }

    fn max_write_size(&self) -> usize {
        self.inner.lock().unwrap().max_write_size
    }
}

impl MockLinkHandle {
    /// Deliver inbound bytes through the subscribed callback.
    pub fn notify(&self, payload: &[u8]) {
        let mut slot = self.callback_slot.lock().unwrap();
        if let Some(callback) = slot.as_mut() {
            callback(payload);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().unwrap().subscribed
    }

    pub fn connect_attempts(&self) -> u32 {
        self.inner.lock().unwrap().connect_attempts
    }

    /// Make the next `n` connect/reconnect calls fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.lock().unwrap().remaining_connect_failures = n;
    }

    /// Sever the link: writes fail until the next successful reconnect.
    pub fn drop_connection(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        inner.fail_writes = true;
    }

    pub fn audio_writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().audio_writes.clone()
    }

    pub fn command_writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().command_writes.clone()
    }
}
