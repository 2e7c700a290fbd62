use std::path::PathBuf;

/// Result alias that carries the custom [`EventSoundError`] type.
pub type Result<T> = std::result::Result<T, EventSoundError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum EventSoundError {
    /// A frame range whose start lies after its end.
    #[error("invalid frame range {start}..={end}")]
    InvalidRange { start: i64, end: i64 },
    /// Sound selection had nothing to choose from.
    #[error("no sound assets available for selection")]
    NoAssetsAvailable,
    /// A path that does not resolve to a readable file.
    #[error("sound asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),
    /// The destination timeline collaborator cannot be reached.
    #[error("external timeline unavailable: {0}")]
    ExternalSystemUnavailable(String),
    /// An asset could not be matched in the destination catalog.
    #[error("could not identify `{0}` in the destination catalog")]
    IdentityResolutionFailed(String),
    /// A caller supplied a parameter outside its declared domain.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Catch-all for collaborator failures that carry only a message.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// WAV header could not be read.
    #[error("{0}")]
    Wav(#[from] hound::Error),
}

impl EventSoundError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<&str> for EventSoundError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for EventSoundError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
