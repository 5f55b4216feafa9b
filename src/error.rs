use thiserror::Error;

/// Top-level error surfaced to the owner of a watcher
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Ledger API error: {0}")]
    Api(#[from] ApiError),

    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Watcher cancelled")]
    Cancelled,

    #[error("Giving up after {attempts} consecutive failures, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<WatcherError> },

    #[error("Watcher task failed: {0}")]
    Task(String),
}

/// Ledger API errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Rate limit exceeded, retry after {seconds} seconds")]
    RateLimit { seconds: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Request cancelled")]
    Cancelled,
}

/// Address/value codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid base58: {0}")]
    InvalidBase58(String),

    #[error("Checksum mismatch for address {0}")]
    ChecksumMismatch(String),

    #[error("Empty value")]
    Empty,

    #[error("Value does not fit in 128 bits: {0}")]
    Overflow(String),
}

/// Cursor errors
#[derive(Error, Debug)]
pub enum CursorError {
    #[error("Cursor storage failed: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("Cursor overflow at height {0}")]
    Overflow(u64),

    #[error("Invalid cursor value: {0}")]
    Invalid(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl ApiError {
    /// Whether this is the cancellation / deadline condition rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    /// Check if the error is transient and worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Timeout { .. } => true,
            ApiError::RateLimit { .. } => true,
            ApiError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Suggested delay before the next attempt, for recoverable errors
    pub fn retry_delay_seconds(&self) -> Option<u64> {
        if !self.is_recoverable() {
            return None;
        }

        match self {
            ApiError::RateLimit { seconds } => Some(*seconds),
            _ => Some(1),
        }
    }
}

impl WatcherError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            WatcherError::Config(_) => ErrorSeverity::Critical,
            WatcherError::Cursor(_) => ErrorSeverity::Critical,
            WatcherError::Task(_) => ErrorSeverity::Critical,
            WatcherError::RetriesExhausted { .. } => ErrorSeverity::High,

            WatcherError::Api(e) if e.is_recoverable() => ErrorSeverity::Medium,
            WatcherError::Api(_) => ErrorSeverity::High,

            WatcherError::Codec(_) => ErrorSeverity::Low,
            WatcherError::Cancelled => ErrorSeverity::Low,
        }
    }

    /// Cancellation is a clean stop, everything else is a failure
    pub fn is_cancelled(&self) -> bool {
        match self {
            WatcherError::Cancelled => true,
            WatcherError::Api(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
