use crate::audio::segmenter::SegmenterConfig;
use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub link: LinkConfig,
    pub segmenter: SegmenterConfig,
    pub translation: TranslationConfig,
    pub pipeline: PipelineSettings,
}

/// Wireless link configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Advertised name of the peripheral to connect to.
    pub device_name: String,
    pub scan_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub max_reconnect_attempts: u32,
    pub write_timeout_ms: u64,
    pub inter_chunk_delay_ms: u64,
}

/// Recognition/translation collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslationConfig {
    pub source_language: String,
    pub target_language: String,
    /// Voice fingerprint sample for cloned synthesis, if any.
    pub voice_path: Option<PathBuf>,
}

/// Pipeline queue sizes and optional debug output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub audio_buffer: usize,
    pub segment_buffer: usize,
    pub translate_buffer: usize,
    pub synthesize_buffer: usize,
    /// When set, every captured segment is also written here as a WAV file.
    pub dump_dir: Option<PathBuf>,
    /// Send a ready acknowledgment after each processed utterance.
    pub send_ready: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device_name: defaults::DEVICE_NAME.to_string(),
            scan_timeout_ms: defaults::SCAN_TIMEOUT_MS,
            heartbeat_interval_ms: defaults::HEARTBEAT_INTERVAL_MS,
            reconnect_backoff_ms: defaults::RECONNECT_BACKOFF_MS,
            max_reconnect_attempts: defaults::MAX_RECONNECT_ATTEMPTS,
            write_timeout_ms: defaults::WRITE_TIMEOUT_MS,
            inter_chunk_delay_ms: defaults::INTER_CHUNK_DELAY_MS,
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_language: defaults::SOURCE_LANGUAGE.to_string(),
            target_language: defaults::TARGET_LANGUAGE.to_string(),
            voice_path: None,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            audio_buffer: defaults::AUDIO_BUFFER,
            segment_buffer: defaults::STAGE_BUFFER,
            translate_buffer: defaults::STAGE_BUFFER,
            synthesize_buffer: defaults::STAGE_BUFFER,
            dump_dir: None,
            send_ready: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if the file is
    /// missing. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOICEBRIDGE_DEVICE → link.device_name
    /// - VOICEBRIDGE_SOURCE_LANG → translation.source_language
    /// - VOICEBRIDGE_TARGET_LANG → translation.target_language
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("VOICEBRIDGE_DEVICE")
            && !device.is_empty()
        {
            self.link.device_name = device;
        }
        if let Ok(lang) = std::env::var("VOICEBRIDGE_SOURCE_LANG")
            && !lang.is_empty()
        {
            self.translation.source_language = lang;
        }
        if let Ok(lang) = std::env::var("VOICEBRIDGE_TARGET_LANG")
            && !lang.is_empty()
        {
            self.translation.target_language = lang;
        }
        self
    }

    /// Default configuration file path: `~/.config/voicebridge/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voicebridge")
            .join("config.toml")
    }
}
