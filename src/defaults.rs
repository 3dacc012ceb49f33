//! Default configuration constants for voicebridge.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// 16kHz matches the peripheral's I2S microphone configuration and is the
/// standard rate for speech recognition.
pub const SAMPLE_RATE: u32 = 16000;

/// Default silence threshold for the segmenter (normalized RMS, 0.0 to 1.0).
///
/// The peripheral firmware uses a raw threshold of ~200 on 16-bit samples;
/// 200 / 32767 ≈ 0.006 on the normalized scale used here.
pub const SILENCE_THRESHOLD: f32 = 0.006;

/// Trailing silence in milliseconds before an utterance is considered ended.
///
/// Short by design: the relay favors low latency over perfectly natural
/// utterance boundaries.
pub const SILENCE_DURATION_MS: u32 = 200;

/// Minimum utterance duration in milliseconds.
///
/// Accumulated audio shorter than this is discarded as noise.
pub const MIN_SPEECH_MS: u32 = 300;

/// Maximum utterance duration in milliseconds before a forced cut.
///
/// Bounds worst-case latency for continuous speech with no pauses.
pub const MAX_SEGMENT_MS: u32 = 2000;

/// Fixed block size (in samples) over which the segmenter computes RMS.
pub const SEGMENT_BLOCK_SIZE: usize = 256;

/// Hard cap on the inbound reassembly buffer in bytes.
///
/// Exceeding it forces a clear-and-resync so garbage on the link can never
/// grow host memory without bound.
pub const INBOUND_BUFFER_CAP: usize = 1024 * 1024;

/// Sanity bound on a declared audio sample count.
///
/// A header declaring more than this is treated as corruption.
pub const MAX_SAMPLE_COUNT: u32 = 1_000_000;

/// Sanity bound on a declared sample rate in Hz.
pub const MAX_SAMPLE_RATE_HZ: u32 = 100_000;

/// Maximum bytes per link write.
///
/// BLE characteristic writes without a negotiated MTU carry at most 20
/// payload bytes.
pub const LINK_CHUNK_SIZE: usize = 20;

/// Pause between consecutive chunk writes.
///
/// The peripheral drains its receive buffer between notifications; writing
/// faster than this overruns it.
pub const INTER_CHUNK_DELAY_MS: u64 = 10;

/// Peripheral advertised name to look for during discovery.
pub const DEVICE_NAME: &str = "ESP32-VoiceMic";

/// Scan timeout in milliseconds.
pub const SCAN_TIMEOUT_MS: u64 = 10_000;

/// Heartbeat probe interval in milliseconds.
pub const HEARTBEAT_INTERVAL_MS: u64 = 10_000;

/// Fixed backoff between reconnect attempts in milliseconds.
pub const RECONNECT_BACKOFF_MS: u64 = 5_000;

/// Maximum reconnect attempts before the session is declared failed.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Timeout for a single cross-thread link request (write or probe).
pub const WRITE_TIMEOUT_MS: u64 = 5_000;

/// Polling interval at which blocking waits observe the stop flag.
///
/// Bounds shutdown latency: every worker notices `should_stop` within one
/// interval.
pub const STOP_POLL: Duration = Duration::from_millis(200);

/// Default capacity of the inter-stage pipeline queues.
pub const STAGE_BUFFER: usize = 4;

/// Default capacity of the inbound audio-frame queue feeding the segmenter.
pub const AUDIO_BUFFER: usize = 64;

/// Default source language code.
pub const SOURCE_LANGUAGE: &str = "zh";

/// Default target language code.
pub const TARGET_LANGUAGE: &str = "en";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_poll_bounds_shutdown_latency() {
        // Every blocking wait must notice the stop flag within a second.
        assert!(STOP_POLL <= Duration::from_secs(1));
    }

    #[test]
    fn max_segment_exceeds_min_speech() {
        assert!(MAX_SEGMENT_MS > MIN_SPEECH_MS);
    }
}
