use thiserror::Error;

/// Failures raised by a browser-driver implementation. These are the only
/// errors allowed to escape a reveal pass.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Evaluation error in {call}: {message}")]
    Evaluation { call: String, message: String },

    #[error("Stale handle: {0}")]
    StaleHandle(String),

    #[error("Driver timeout: {0}")]
    Timeout(String),

    #[error("Driver transport error: {0}")]
    Transport(String),

    #[error("Browser session closed")]
    SessionClosed,
}

impl DriverError {
    /// Whether retrying the whole target later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, DriverError::SessionClosed)
    }
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("No count signal for target {0}")]
    EstimationFailure(String),

    #[error("Locator error: {0}")]
    Locator(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Malformed result from page function {call}: {message}")]
    MalformedPage { call: String, message: String },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
