//! Error types for Slotkeeper
//!
//! Gateways raise raw failures; the cache lifecycle classifies them into the
//! taxonomy exposed by [`ErrorKind`] and attaches a human-readable reason:
//! - `Timeout`: an operation exceeded its budget
//! - `NotFound`: a blob or slot is missing
//! - `Invalid`: a saved blob failed validation and was removed
//! - `BackendUnavailable`: generic network or server failure
//! - `Cancelled`: operator cancellation (preload only)

mod constructors;
mod conversions;
mod types;
mod user_messages;

pub use types::{ErrorKind, SlotkeeperError, SlotkeeperResult};
pub use user_messages::{ErrorCategory, UserFriendlyError};
