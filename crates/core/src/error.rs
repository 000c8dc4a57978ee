/// Result alias that carries the custom [`MidiMotionError`] type.
pub type Result<T> = std::result::Result<T, MidiMotionError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MidiMotionError {
    /// Free-form error used where no dedicated variant applies.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration files that fail to parse.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// Device, surface or hardware-access acquisition rejected by the
    /// environment. Surfaced exactly once to the caller and never retried
    /// internally.
    #[error("acquisition failed: {0}")]
    Acquisition(String),
}

impl MidiMotionError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for MidiMotionError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MidiMotionError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
