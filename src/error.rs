//! Error types for voicebridge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Link errors — these escalate to session-level reconnection
    #[error("No peripheral named '{name}' found during scan")]
    NoDeviceFound { name: String },

    #[error("Link scan failed: {message}")]
    LinkScan { message: String },

    #[error("Link connect failed: {message}")]
    LinkConnect { message: String },

    #[error("Notification subscription failed: {message}")]
    LinkSubscribe { message: String },

    #[error("Link write failed: {message}")]
    LinkWrite { message: String },

    #[error("Link {operation} timed out")]
    LinkTimeout { operation: String },

    // Collaborator errors — contained at the pipeline stage
    #[error("Recognition/translation failed: {message}")]
    Translation { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Session errors
    #[error("Session failed after {attempts} reconnect attempts")]
    SessionFailed { attempts: u32 },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_no_device_found_display() {
        let error = BridgeError::NoDeviceFound {
            name: "ESP32-VoiceMic".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "No peripheral named 'ESP32-VoiceMic' found during scan"
        );
    }

    #[test]
    fn test_link_write_display() {
        let error = BridgeError::LinkWrite {
            message: "characteristic busy".to_string(),
        };
        assert_eq!(error.to_string(), "Link write failed: characteristic busy");
    }

    #[test]
    fn test_link_timeout_display() {
        let error = BridgeError::LinkTimeout {
            operation: "write".to_string(),
        };
        assert_eq!(error.to_string(), "Link write timed out");
    }

    #[test]
    fn test_translation_display() {
        let error = BridgeError::Translation {
            message: "backend unreachable".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Recognition/translation failed: backend unreachable"
        );
    }

    #[test]
    fn test_session_failed_display() {
        let error = BridgeError::SessionFailed { attempts: 5 };
        assert_eq!(
            error.to_string(),
            "Session failed after 5 reconnect attempts"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: BridgeError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: BridgeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<BridgeError>();
        assert_sync::<BridgeError>();
    }
}
