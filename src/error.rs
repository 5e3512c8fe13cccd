use thiserror::Error;

/// Library-level errors using thiserror for structured error handling.
///
/// Almost everything in this crate degrades instead of failing: a missing
/// config falls back to built-in defaults, an unresolvable event is dropped,
/// a track that will not start is skipped. The variants below cover the few
/// places where an operation is abandoned and the caller may want to know
/// why, and the single hard failure (sink initialization).

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output stream")]
    SinkInitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to load audio asset: {path}")]
    AssetLoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to decode audio asset: {path}")]
    DecodeFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Audio playback failed")]
    PlaybackFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Playback rejected by sink")]
    PlaybackRejected,

    #[error("Unknown asset handle")]
    UnknownAsset,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read sound configuration from {path}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse sound configuration from {path}")]
    ParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = AudioError::PlaybackRejected;
        assert_eq!(err.to_string(), "Playback rejected by sink");

        let err = AudioError::AssetLoadFailed {
            path: "sound/launch.wav".to_string(),
            source: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to load audio asset: sound/launch.wav"
        );
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let config_err = ConfigError::ReadFailed {
            path: "/test/sounds.json".to_string(),
            source: io_err,
        };

        assert!(config_err.source().is_some());
        assert_eq!(
            config_err.to_string(),
            "Failed to read sound configuration from /test/sounds.json"
        );
    }
}
