/// Result alias that carries the custom [`MatrixClockError`] type.
pub type Result<T> = std::result::Result<T, MatrixClockError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MatrixClockError {
    /// A caller handed over data that cannot be processed.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Free-form error message.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around FFT processing errors.
    #[error("fft: {0}")]
    Fft(#[from] realfft::FftError),
    /// Wrapper around JSON (de)serialization errors.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl MatrixClockError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for MatrixClockError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MatrixClockError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
