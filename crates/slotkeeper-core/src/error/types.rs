//! Core error types for Slotkeeper

use thiserror::Error;

/// Result type alias for Slotkeeper operations
pub type SlotkeeperResult<T> = Result<T, SlotkeeperError>;

/// Failure classes surfaced to callers.
///
/// Every [`SlotkeeperError`] maps onto exactly one kind; callers branch on the
/// kind to decide between retrying later, skipping, or aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    NotFound,
    Invalid,
    BackendUnavailable,
    UserCancelled,
    NoEvictableSlot,
    Configuration,
    Internal,
}

/// Main error type for Slotkeeper
#[derive(Error, Debug, Clone)]
pub enum SlotkeeperError {
    /// Operation exceeded its time budget
    #[error("{operation} timed out after {seconds} seconds")]
    Timeout {
        operation: String,
        seconds: u64,
        context: Option<String>,
    },

    /// Blob or slot missing on the backend
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        resource: Option<String>,
        context: Option<String>,
    },

    /// Saved blob failed validation
    #[error("Invalid cache: {message}")]
    Invalid {
        message: String,
        size_bytes: Option<u64>,
        context: Option<String>,
    },

    /// Generic network or server error
    #[error("Backend unavailable: {message}")]
    BackendUnavailable {
        message: String,
        status_code: Option<u16>,
        context: Option<String>,
    },

    /// Operator cancelled the running job
    #[error("Operation was cancelled")]
    Cancelled,

    /// Every occupied slot is protected and none is free
    #[error("No evictable slot available for {participant}")]
    NoEvictableSlot { participant: String },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// Invalid input errors
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// Generic error with context
    #[error("Error: {message}")]
    Other {
        message: String,
        context: Option<String>,
    },
}

impl SlotkeeperError {
    /// Taxonomy class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Invalid { .. } => ErrorKind::Invalid,
            Self::BackendUnavailable { .. } | Self::Json { .. } => ErrorKind::BackendUnavailable,
            Self::Cancelled => ErrorKind::UserCancelled,
            Self::NoEvictableSlot { .. } => ErrorKind::NoEvictableSlot,
            Self::Config { .. } | Self::InvalidInput { .. } => ErrorKind::Configuration,
            Self::Io { .. } | Self::Other { .. } => ErrorKind::Internal,
        }
    }

    /// Get the error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "SLOT_TIMEOUT",
            Self::NotFound { .. } => "SLOT_NOT_FOUND",
            Self::Invalid { .. } => "SLOT_INVALID_CACHE",
            Self::BackendUnavailable { .. } => "SLOT_BACKEND_UNAVAILABLE",
            Self::Cancelled => "SLOT_CANCELLED",
            Self::NoEvictableSlot { .. } => "SLOT_NO_EVICTABLE",
            Self::Config { .. } => "SLOT_CONFIG",
            Self::InvalidInput { .. } => "SLOT_INVALID_INPUT",
            Self::Io { .. } => "SLOT_IO",
            Self::Json { .. } => "SLOT_JSON",
            Self::Other { .. } => "SLOT_OTHER",
        }
    }

    /// Optional context recorded alongside the error
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Timeout { context, .. }
            | Self::NotFound { context, .. }
            | Self::Invalid { context, .. }
            | Self::BackendUnavailable { context, .. }
            | Self::Config { context, .. }
            | Self::Other { context, .. } => context.as_deref(),
            _ => None,
        }
    }

    /// Whether trying the same operation again later can succeed.
    ///
    /// Nothing retries automatically; the autosave path relies on this by
    /// leaving the usage counter untouched after a retryable failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::BackendUnavailable | ErrorKind::Invalid
        )
    }

    /// Attach context to the error, replacing any previous context
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        let ctx = Some(ctx.into());
        match &mut self {
            Self::Timeout { context, .. }
            | Self::NotFound { context, .. }
            | Self::Invalid { context, .. }
            | Self::BackendUnavailable { context, .. }
            | Self::Config { context, .. }
            | Self::Other { context, .. } => *context = ctx,
            _ => {}
        }
        self
    }
}
