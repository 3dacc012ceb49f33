//! Voice activity segmentation.
//!
//! Incoming audio frames are scored block by block with an RMS energy
//! measure. Runs of voiced blocks become utterance segments, cut either by a
//! trailing silence or by the maximum segment duration. All timing is counted
//! in samples, so the segmentation of a given stream is deterministic no
//! matter how it arrives.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, trace};

/// One captured utterance, trimmed of trailing silence.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub captured_at: Instant,
}

impl AudioSegment {
    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Normalized RMS below which a block counts as silence.
    pub silence_threshold: f32,
    /// Trailing silence that ends an utterance.
    pub silence_duration_ms: u32,
    /// Utterances shorter than this are dropped as noise.
    pub min_speech_ms: u32,
    /// Forced cut point for continuous speech.
    pub max_segment_ms: u32,
    /// Samples per RMS block.
    pub block_size: usize,
    pub sample_rate: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            silence_threshold: defaults::SILENCE_THRESHOLD,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            max_segment_ms: defaults::MAX_SEGMENT_MS,
            block_size: defaults::SEGMENT_BLOCK_SIZE,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl SegmenterConfig {
    fn ms_to_samples(&self, ms: u32) -> usize {
        (ms as u64 * self.sample_rate as u64 / 1000) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Silence,
    Speech,
}

/// Streaming utterance segmenter.
pub struct Segmenter {
    config: SegmenterConfig,
    state: State,
    /// Partial block carried between pushes.
    pending: Vec<i16>,
    /// Accumulated utterance, including any not-yet-confirmed silence tail.
    current: Vec<i16>,
    /// Length of `current` up to the end of the last voiced block.
    voiced_len: usize,
    silent_samples: usize,
    silence_samples_needed: usize,
    min_speech_samples: usize,
    max_segment_samples: usize,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        let silence_samples_needed = config.ms_to_samples(config.silence_duration_ms);
        let min_speech_samples = config.ms_to_samples(config.min_speech_ms);
        let max_segment_samples = config.ms_to_samples(config.max_segment_ms);
        Self {
            config,
            state: State::Silence,
            pending: Vec::new(),
            current: Vec::new(),
            voiced_len: 0,
            silent_samples: 0,
            silence_samples_needed,
            min_speech_samples,
            max_segment_samples,
        }
    }

    /// Feed a frame of samples, returning any segments completed by it.
    pub fn push(&mut self, samples: &[i16]) -> Vec<AudioSegment> {
        self.pending.extend_from_slice(samples);
        let block_size = self.config.block_size;
        let mut segments = Vec::new();

        let mut offset = 0;
        while self.pending.len() - offset >= block_size {
            let block: Vec<i16> = self.pending[offset..offset + block_size].to_vec();
            offset += block_size;
            if let Some(segment) = self.process_block(&block) {
                segments.push(segment);
            }
        }
        self.pending.drain(..offset);
        segments
    }

    /// Emit whatever voiced audio is buffered, ending the current utterance.
    pub fn flush(&mut self) -> Option<AudioSegment> {
        if self.state != State::Speech {
            return None;
        }
        let segment = self.take_segment(self.voiced_len);
        self.reset();
        segment
    }

    fn process_block(&mut self, block: &[i16]) -> Option<AudioSegment> {
        let rms = calculate_rms(block);
        let voiced = rms >= self.config.silence_threshold;
        trace!(rms, voiced, state = ?self.state, "block scored");

        match self.state {
            State::Silence => {
                if voiced {
                    self.state = State::Speech;
                    self.current.extend_from_slice(block);
                    self.voiced_len = self.current.len();
                    self.silent_samples = 0;
                }
                None
            }
            State::Speech => {
                self.current.extend_from_slice(block);
                if voiced {
                    self.voiced_len = self.current.len();
                    self.silent_samples = 0;
                } else {
                    self.silent_samples += block.len();
                }

                if self.silent_samples >= self.silence_samples_needed {
                    // Utterance ended: emit the voiced part, drop the tail.
                    let segment = self.take_segment(self.voiced_len);
                    self.reset();
                    return segment;
                }
                if self.current.len() >= self.max_segment_samples {
                    // Forced cut: emit everything so no audio is lost.
                    debug!(samples = self.current.len(), "max segment length reached");
                    let segment = self.take_segment(self.current.len());
                    self.reset();
                    return segment;
                }
                None
            }
        }
    }

    fn take_segment(&mut self, len: usize) -> Option<AudioSegment> {
        if len < self.min_speech_samples {
            debug!(samples = len, "discarding segment below minimum duration");
            return None;
        }
        let mut samples = std::mem::take(&mut self.current);
        samples.truncate(len);
        Some(AudioSegment {
            samples,
            sample_rate: self.config.sample_rate,
            captured_at: Instant::now(),
        })
    }

    fn reset(&mut self) {
        self.state = State::Silence;
        self.current.clear();
        self.voiced_len = 0;
        self.silent_samples = 0;
    }
}

/// Root-mean-square of a block, normalized to the 0.0–1.0 range.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples
        .iter()
        .map(|&s| {
            let normalized = s as f64 / 32768.0;
            normalized * normalized
        })
        .sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: usize = 256;

    fn config() -> SegmenterConfig {
        SegmenterConfig::default()
    }

    /// Square wave well above the silence threshold.
    fn voiced(blocks: usize) -> Vec<i16> {
        (0..blocks * BLOCK)
            .map(|i| if i % 2 == 0 { 3000 } else { -3000 })
            .collect()
    }

    fn silence(blocks: usize) -> Vec<i16> {
        vec![0; blocks * BLOCK]
    }

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(calculate_rms(&[0; 256]), 0.0);
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_tone_is_normalized() {
        let rms = calculate_rms(&voiced(1));
        assert!((rms - 3000.0 / 32768.0).abs() < 0.001);
    }

    #[test]
    fn test_pure_silence_yields_no_segments() {
        let mut s = Segmenter::new(config());
        // 3 seconds of silence.
        assert!(s.push(&silence(188)).is_empty());
        assert!(s.flush().is_none());
    }

    #[test]
    fn test_single_utterance_trimmed_of_trailing_silence() {
        let mut s = Segmenter::new(config());
        // ~0.5s voiced, then enough silence to end the utterance.
        let voiced_blocks = 31;
        let mut input = voiced(voiced_blocks);
        input.extend(silence(20));

        let segments = s.push(&input);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].samples.len(), voiced_blocks * BLOCK);
        assert_eq!(segments[0].sample_rate, 16000);
    }

    #[test]
    fn test_short_blip_is_discarded() {
        let mut s = Segmenter::new(config());
        // One voiced block (~16ms) is far below min_speech_ms.
        let mut input = voiced(1);
        input.extend(silence(20));
        assert!(s.push(&input).is_empty());
        assert!(s.flush().is_none());
    }

    #[test]
    fn test_continuous_speech_forced_into_five_segments() {
        let mut s = Segmenter::new(config());
        // 10s continuous speech with a 2s cap: exactly five full segments.
        let segments = s.push(&voiced(625));
        assert_eq!(segments.len(), 5);
        for segment in &segments {
            assert_eq!(segment.samples.len(), 32000);
        }
        assert!(s.flush().is_none());
    }

    #[test]
    fn test_segmentation_invariant_to_frame_sizes() {
        let mut input = voiced(31);
        input.extend(silence(20));
        input.extend(voiced(40));
        input.extend(silence(20));

        let mut reference = Segmenter::new(config());
        let expected: Vec<Vec<i16>> = reference
            .push(&input)
            .into_iter()
            .map(|seg| seg.samples)
            .collect();
        assert_eq!(expected.len(), 2);

        for frame_size in [37, 160, 256, 1000, 4096] {
            let mut s = Segmenter::new(config());
            let mut got = Vec::new();
            for frame in input.chunks(frame_size) {
                got.extend(s.push(frame).into_iter().map(|seg| seg.samples));
            }
            assert_eq!(got, expected, "frame size {frame_size}");
        }
    }

    #[test]
    fn test_flush_emits_in_progress_utterance() {
        let mut s = Segmenter::new(config());
        assert!(s.push(&voiced(40)).is_empty());
        let segment = s.flush().unwrap();
        assert_eq!(segment.samples.len(), 40 * BLOCK);
        // A second flush has nothing to emit.
        assert!(s.flush().is_none());
    }

    #[test]
    fn test_partial_blocks_carried_between_pushes() {
        let mut s = Segmenter::new(config());
        let input = voiced(31);
        // Push in fragments smaller than one block.
        for frame in input.chunks(100) {
            assert!(s.push(frame).is_empty());
        }
        let mut tail = Segmenter::new(config());
        assert!(tail.push(&input).is_empty());
        // Both reach the same accumulated state: flush emits the same length.
        assert_eq!(
            s.flush().map(|seg| seg.samples.len()),
            tail.flush().map(|seg| seg.samples.len())
        );
    }

    #[test]
    fn test_duration_ms() {
        let segment = AudioSegment {
            samples: vec![0; 16000],
            sample_rate: 16000,
            captured_at: Instant::now(),
        };
        assert_eq!(segment.duration_ms(), 1000);
    }
}
