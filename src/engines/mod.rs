//! Speech processing collaborators: recognition/translation and synthesis.

pub mod synthesizer;
pub mod translator;

pub use synthesizer::{MockSynthesizer, Synthesizer, ToneSynthesizer, Waveform};
pub use translator::{MockTranslator, Translation, Translator};
