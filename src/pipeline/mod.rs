//! The processing pipeline: audio frames in, link writes out.
//!
//! Stages run as stations in dedicated threads connected by bounded
//! channels. A full queue drops the newest item rather than blocking the
//! producer, so a slow collaborator can never stall audio capture.

pub mod error;
pub mod orchestrator;
pub mod segment_station;
pub mod station;
pub mod stats;
pub mod synthesize_station;
pub mod transmit_station;
pub mod translate_station;
pub mod types;

pub use error::{ErrorReporter, LogReporter, StationError};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use station::{Station, StationRunner};
pub use stats::{PipelineStats, StatsSnapshot};
pub use types::{AudioFrame, SynthesizedItem, TranslatedItem};
