//! User-facing error descriptions
//!
//! Notifications show `title: message`, with suggestions in the CLI.

use super::types::SlotkeeperError;

/// Error category for user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    UserInput,
    Internal,
    ResourceUnavailable,
    Cancellation,
    CorruptData,
    Capacity,
}

impl ErrorCategory {
    /// Get a user-friendly category name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration Error",
            Self::Network => "Network Error",
            Self::UserInput => "Invalid Input",
            Self::Internal => "Internal Error",
            Self::ResourceUnavailable => "Resource Unavailable",
            Self::Cancellation => "Cancelled",
            Self::CorruptData => "Corrupt Cache",
            Self::Capacity => "No Free Slot",
        }
    }
}

/// User-friendly error information
#[derive(Debug, Clone)]
pub struct UserFriendlyError {
    pub category: ErrorCategory,
    pub title: String,
    pub message: String,
    pub suggestions: Vec<String>,
    pub error_code: String,
}

impl UserFriendlyError {
    pub fn new(
        category: ErrorCategory,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            title: title.into(),
            message: message.into(),
            suggestions: Vec::new(),
            error_code: String::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = code.into();
        self
    }

    /// Format the error for display
    pub fn format_display(&self) -> String {
        let mut output = format!(
            "{}: {}\n\n{}",
            self.category.display_name(),
            self.title,
            self.message
        );

        if !self.suggestions.is_empty() {
            output.push_str("\n\nSuggested actions:");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("\n  {}. {}", i + 1, suggestion));
            }
        }

        output
    }
}

impl From<&SlotkeeperError> for UserFriendlyError {
    fn from(error: &SlotkeeperError) -> Self {
        let friendly = match error {
            SlotkeeperError::Timeout {
                operation, seconds, ..
            } => UserFriendlyError::new(
                ErrorCategory::Network,
                format!("{} timed out", operation),
                format!(
                    "The inference server did not answer within {} seconds",
                    seconds
                ),
            )
            .with_suggestion("Large caches take longer; raise the backend timeout if this repeats")
            .with_suggestion("Check whether the server is busy generating"),

            SlotkeeperError::NotFound {
                message, resource, ..
            } => {
                let title = match resource {
                    Some(r) => format!("{} not found", r),
                    None => "Cache file not found".to_string(),
                };
                UserFriendlyError::new(ErrorCategory::ResourceUnavailable, title, message.clone())
                    .with_suggestion("The save may have been rotated away; list saves and pick another")
            }

            SlotkeeperError::Invalid {
                message,
                size_bytes,
                ..
            } => {
                let detail = match size_bytes {
                    Some(size) => format!("{} ({} bytes)", message, size),
                    None => message.clone(),
                };
                UserFriendlyError::new(ErrorCategory::CorruptData, "Saved cache was invalid", detail)
                    .with_suggestion("The blob was removed; the next autosave will try again")
            }

            SlotkeeperError::BackendUnavailable {
                message,
                status_code,
                ..
            } => {
                let title = match status_code {
                    Some(code) => format!("Backend returned HTTP {}", code),
                    None => "Cannot reach backend".to_string(),
                };
                UserFriendlyError::new(ErrorCategory::Network, title, message.clone())
                    .with_suggestion("Verify the server URLs in the configuration")
                    .with_suggestion("Make sure the server was started with a slot save path")
            }

            SlotkeeperError::Cancelled => UserFriendlyError::new(
                ErrorCategory::Cancellation,
                "Operation cancelled",
                "The operation was cancelled by user request",
            ),

            SlotkeeperError::NoEvictableSlot { participant } => UserFriendlyError::new(
                ErrorCategory::Capacity,
                "All slots are protected",
                format!("No slot could be freed for {}", participant),
            )
            .with_suggestion("Start the server with more parallel slots"),

            SlotkeeperError::Config { message, .. } => {
                UserFriendlyError::new(ErrorCategory::Configuration, "Configuration error", message.clone())
                    .with_suggestion("Run 'slotkeeper config validate' to see every problem")
            }

            SlotkeeperError::InvalidInput { message, field } => {
                let title = match field {
                    Some(f) => format!("Invalid value for '{}'", f),
                    None => "Invalid input".to_string(),
                };
                UserFriendlyError::new(ErrorCategory::UserInput, title, message.clone())
            }

            SlotkeeperError::Io { message, .. } => {
                UserFriendlyError::new(ErrorCategory::Internal, "I/O error", message.clone())
            }

            SlotkeeperError::Json { message } => UserFriendlyError::new(
                ErrorCategory::Network,
                "Unexpected response format",
                message.clone(),
            ),

            SlotkeeperError::Other { message, .. } => {
                UserFriendlyError::new(ErrorCategory::Internal, "Unexpected error", message.clone())
            }
        };
        friendly.with_error_code(error.error_code())
    }
}

impl SlotkeeperError {
    /// One-line reason suitable for a notification
    pub fn user_message(&self) -> String {
        let friendly = UserFriendlyError::from(self);
        format!("{}: {}", friendly.title, friendly.message)
    }
}
