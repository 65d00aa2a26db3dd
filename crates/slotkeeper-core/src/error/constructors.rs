//! Constructor methods for SlotkeeperError

use super::types::SlotkeeperError;

impl SlotkeeperError {
    /// Create a new timeout error
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
            context: None,
        }
    }

    /// Create a new not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource: None,
            context: None,
        }
    }

    /// Create a not-found error naming the missing resource
    pub fn not_found_resource(message: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            resource: Some(resource.into()),
            context: None,
        }
    }

    /// Create an invalid-cache error for an undersized or corrupt blob
    pub fn invalid(message: impl Into<String>, size_bytes: Option<u64>) -> Self {
        Self::Invalid {
            message: message.into(),
            size_bytes,
            context: None,
        }
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
            status_code: None,
            context: None,
        }
    }

    /// Create a backend error with the HTTP status that caused it
    pub fn backend_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
            status_code: Some(status_code),
            context: None,
        }
    }

    pub fn no_evictable_slot(participant: impl Into<String>) -> Self {
        Self::NoEvictableSlot {
            participant: participant.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error with context
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: None,
        }
    }

    /// Create an IO error with path
    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a new JSON error
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json {
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            context: None,
        }
    }
}
