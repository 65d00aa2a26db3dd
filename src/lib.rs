//! Slotkeeper keeps per-character KV-cache slots warm on a llama.cpp-style
//! inference server.
//!
//! This crate re-exports [`slotkeeper_core`]; the `slotkeeper` binary lives in
//! the `slotkeeper-cli` workspace member.

pub use slotkeeper_core::*;
