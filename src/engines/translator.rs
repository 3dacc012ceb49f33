use crate::error::{BridgeError, Result};
use std::sync::Arc;

/// Result of recognizing and translating one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Transcription in the source language.
    pub original: String,
    /// Translation in the target language.
    pub translated: String,
}

/// Trait for combined speech recognition and translation.
///
/// This trait allows swapping implementations (a real recognition backend vs
/// mock).
pub trait Translator: Send + Sync {
    /// Recognize an utterance and translate it.
    ///
    /// # Arguments
    /// * `samples` - Audio samples as 16-bit PCM mono
    /// * `sample_rate` - Sample rate of `samples` in Hz
    /// * `source` - Source language code (e.g. "zh")
    /// * `target` - Target language code (e.g. "en")
    fn translate(
        &self,
        samples: &[i16],
        sample_rate: u32,
        source: &str,
        target: &str,
    ) -> Result<Translation>;

    /// Check if the translator is ready
    fn is_ready(&self) -> bool;

    /// Get the name of the backend
    fn name(&self) -> &str;
}

/// Implement Translator for Arc<T> to allow sharing across sessions.
impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(
        &self,
        samples: &[i16],
        sample_rate: u32,
        source: &str,
        target: &str,
    ) -> Result<Translation> {
        (**self).translate(samples, sample_rate, source, target)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Mock translator for testing
#[derive(Debug, Clone)]
pub struct MockTranslator {
    original: String,
    translated: String,
    should_fail: bool,
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranslator {
    pub fn new() -> Self {
        Self {
            original: "mock original".to_string(),
            translated: "mock translation".to_string(),
            should_fail: false,
        }
    }

    /// Configure the mock to return a specific text pair
    pub fn with_result(mut self, original: &str, translated: &str) -> Self {
        self.original = original.to_string();
        self.translated = translated.to_string();
        self
    }

    /// Configure the mock to fail on translate
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Translator for MockTranslator {
    fn translate(
        &self,
        _samples: &[i16],
        _sample_rate: u32,
        _source: &str,
        _target: &str,
    ) -> Result<Translation> {
        if self.should_fail {
            Err(BridgeError::Translation {
                message: "mock translation failure".to_string(),
            })
        } else {
            Ok(Translation {
                original: self.original.clone(),
                translated: self.translated.clone(),
            })
        }
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }

    fn name(&self) -> &str {
        "mock"
    }
}
