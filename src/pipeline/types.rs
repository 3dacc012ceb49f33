//! Items flowing between pipeline stages.

use crate::audio::segmenter::AudioSegment;
use crate::engines::synthesizer::Waveform;

/// Raw audio received from the peripheral, pre-segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// A segment with its recognition and translation attached.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedItem {
    pub segment: AudioSegment,
    pub original_text: String,
    pub translated_text: String,
}

/// A fully processed utterance ready for transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedItem {
    pub original_text: String,
    pub translated_text: String,
    pub waveform: Waveform,
}
