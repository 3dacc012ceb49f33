//! In-process peripheral simulation.
//!
//! `LoopbackLink` plays a scripted set of inbound messages through the
//! notification callback, chunked the way the radio would deliver them, and
//! swallows outbound writes while keeping counters. It backs the `simulate`
//! subcommand so the whole relay can run with no hardware present.

use crate::defaults;
use crate::error::Result;
use crate::link::transport::{Link, NotificationCallback, PeerInfo};
use crate::protocol::Message;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Default)]
struct Counters {
    audio_bytes: AtomicU64,
    command_writes: AtomicU64,
}

/// Observer side of a [`LoopbackLink`], usable after the link has moved into
/// the worker thread.
#[derive(Clone)]
pub struct LoopbackHandle {
    counters: Arc<Counters>,
}

impl LoopbackHandle {
    pub fn audio_bytes_written(&self) -> u64 {
        self.counters.audio_bytes.load(Ordering::Relaxed)
    }

    pub fn command_writes(&self) -> u64 {
        self.counters.command_writes.load(Ordering::Relaxed)
    }
}

pub struct LoopbackLink {
    script: Vec<Message>,
    repeat_interval: Duration,
    chunk_delay: Duration,
    connected: bool,
    counters: Arc<Counters>,
    feeder_stop: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
}

impl Default for LoopbackLink {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackLink {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            repeat_interval: Duration::from_secs(1),
            chunk_delay: Duration::from_millis(1),
            connected: false,
            counters: Arc::new(Counters::default()),
            feeder_stop: Arc::new(AtomicBool::new(false)),
            feeder: None,
        }
    }

    /// Inbound messages to replay, in order, once per repeat interval.
    pub fn with_script(mut self, script: Vec<Message>) -> Self {
        self.script = script;
        self
    }

    pub fn with_repeat_interval(mut self, interval: Duration) -> Self {
        self.repeat_interval = interval;
        self
    }

    pub fn handle(&self) -> LoopbackHandle {
        LoopbackHandle {
            counters: Arc::clone(&self.counters),
        }
    }

    fn stop_feeder(&mut self) {
        self.feeder_stop.store(true, Ordering::Relaxed);
        if let Some(feeder) = self.feeder.take() {
            let _: std::result::Result<_, _> = feeder.join();
        }
    }
}

impl Link for LoopbackLink {
    fn scan(&mut self, _timeout: Duration) -> Result<Vec<PeerInfo>> {
        Ok(vec![PeerInfo {
            id: "loopback".to_string(),
            name: defaults::DEVICE_NAME.to_string(),
        }])
    }

    fn connect(&mut self, peer_id: &str) -> Result<()> {
        debug!(peer_id, "loopback connected");
        self.connected = true;
        Ok(())
    }

    fn subscribe(&mut self, mut callback: NotificationCallback) -> Result<()> {
        self.stop_feeder();
        self.feeder_stop = Arc::new(AtomicBool::new(false));

        let stop = Arc::clone(&self.feeder_stop);
        let frames: Vec<Vec<u8>> = self.script.iter().map(Message::serialize).collect();
        let chunk_delay = self.chunk_delay;
        let repeat_interval = self.repeat_interval;

        let feeder = std::thread::Builder::new()
            .name("loopback-feeder".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    for frame in &frames {
                        for chunk in frame.chunks(defaults::LINK_CHUNK_SIZE) {
                            if stop.load(Ordering::Relaxed) {
                                return;
                            }
                            callback(chunk);
                            std::thread::sleep(chunk_delay);
                        }
                    }
                    // Pause before replaying, checking for shutdown often.
                    let mut waited = Duration::ZERO;
                    while waited < repeat_interval && !stop.load(Ordering::Relaxed) {
                        let step = defaults::STOP_POLL.min(repeat_interval - waited);
                        std::thread::sleep(step);
                        waited += step;
                    }
                }
            })?;
        self.feeder = Some(feeder);
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<()> {
        self.stop_feeder();
        Ok(())
    }

    fn write_audio(&mut self, chunk: &[u8]) -> Result<()> {
        trace!(len = chunk.len(), "loopback audio write");
        self.counters
            .audio_bytes
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn write_command(&mut self, chunk: &[u8]) -> Result<()> {
        trace!(len = chunk.len(), "loopback command write");
        self.counters.command_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.stop_feeder();
        self.connected = false;
    }
}

impl Drop for LoopbackLink {
    fn drop(&mut self) {
        self.stop_feeder();
    }
}

/// Build the default simulation script: a short tone utterance.
pub fn default_script() -> Vec<Message> {
    let samples: Vec<i16> = (0..8000)
        .map(|i| {
            let t = i as f32 / defaults::SAMPLE_RATE as f32;
            ((t * 220.0 * 2.0 * std::f32::consts::PI).sin() * 6000.0) as i16
        })
        .collect();
    let mut with_tail = samples;
    with_tail.extend(std::iter::repeat_n(0i16, 6400));
    vec![Message::Audio {
        sample_rate: defaults::SAMPLE_RATE,
        samples: with_tail,
    }]
}
