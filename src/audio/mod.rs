//! Audio handling: utterance segmentation and debug WAV dumps.

pub mod segmenter;
pub mod wav;

pub use segmenter::{AudioSegment, Segmenter, SegmenterConfig};
