//! voicebridge - real-time speech translation relay
//!
//! Connects to a BLE voice peripheral, segments its microphone stream into
//! utterances, runs recognition/translation/synthesis through pluggable
//! collaborators, and streams the result back for playback.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod engines;
pub mod error;
pub mod link;
pub mod pipeline;
pub mod protocol;
pub mod session;

// Core traits (link → segment → translate → synthesize → transmit)
pub use engines::synthesizer::Synthesizer;
pub use engines::translator::Translator;
pub use link::transport::Link;

// Pipeline
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};

// Error handling
pub use error::{BridgeError, Result};

// Config
pub use config::Config;

// Session
pub use session::{SessionController, SessionHandle, SessionStatus};

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
