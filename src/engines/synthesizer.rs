use crate::defaults;
use crate::error::{BridgeError, Result};
use std::path::Path;
use std::sync::Arc;

/// Synthesized speech audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Trait for text-to-speech synthesis.
pub trait Synthesizer: Send + Sync {
    /// Synthesize speech for `text`.
    ///
    /// # Arguments
    /// * `text` - Text to speak, in the target language
    /// * `voice` - Optional voice fingerprint sample for cloned synthesis
    fn synthesize(&self, text: &str, voice: Option<&Path>) -> Result<Waveform>;

    /// Check if the synthesizer is ready
    fn is_ready(&self) -> bool;

    /// Get the name of the backend
    fn name(&self) -> &str;
}

/// Implement Synthesizer for Arc<T> to allow sharing across sessions.
impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    fn synthesize(&self, text: &str, voice: Option<&Path>) -> Result<Waveform> {
        (**self).synthesize(text, voice)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock synthesizer for testing
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    waveform: Waveform,
    should_fail: bool,
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            waveform: Waveform {
                samples: vec![0; 160],
                sample_rate: defaults::SAMPLE_RATE,
            },
            should_fail: false,
        }
    }

    /// Configure the mock to return a specific waveform
    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    /// Configure the mock to fail on synthesize
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Synthesizer for MockSynthesizer {
    fn synthesize(&self, _text: &str, _voice: Option<&Path>) -> Result<Waveform> {
        if self.should_fail {
            Err(BridgeError::Synthesis {
                message: "mock synthesis failure".to_string(),
            })
        } else {
            Ok(self.waveform.clone())
        }
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Synthesizer that renders a short sine tone per character.
///
/// Used by the simulate subcommand, where audible-but-meaningless output is
/// enough to exercise the full outbound path.
pub struct ToneSynthesizer {
    sample_rate: u32,
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new(defaults::SAMPLE_RATE)
    }
}

impl ToneSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Synthesizer for ToneSynthesizer {
    fn synthesize(&self, text: &str, _voice: Option<&Path>) -> Result<Waveform> {
        // 40ms of 440Hz per character, capped at two seconds.
        let per_char = self.sample_rate as usize * 40 / 1000;
        let total = (per_char * text.chars().count().max(1)).min(self.sample_rate as usize * 2);
        let samples = (0..total)
            .map(|i| {
                let t = i as f32 / self.sample_rate as f32;
                ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0) as i16
            })
            .collect();
        Ok(Waveform {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "tone"
    }
}
