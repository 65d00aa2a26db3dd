//! From trait implementations for SlotkeeperError conversions

use super::types::SlotkeeperError;

impl From<anyhow::Error> for SlotkeeperError {
    fn from(error: anyhow::Error) -> Self {
        Self::other(error.to_string())
    }
}

impl From<std::io::Error> for SlotkeeperError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for SlotkeeperError {
    fn from(error: serde_json::Error) -> Self {
        Self::json(error.to_string())
    }
}

/// Transport failures without a per-call budget in scope.
///
/// Gateways that know the operation and its budget classify timeouts
/// themselves; this conversion only covers the generic path.
impl From<reqwest::Error> for SlotkeeperError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::timeout("HTTP request", 0);
        }
        let status_code = error.status().map(|s| s.as_u16());
        if status_code == Some(404) {
            return Self::not_found(error.to_string());
        }
        Self::BackendUnavailable {
            message: error.to_string(),
            status_code,
            context: error.url().map(|u| u.to_string()),
        }
    }
}
