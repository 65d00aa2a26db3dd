//! Cache blob naming
//!
//! Wire format: `{chat}_{YYYYMMDDhhmmss}[_tag_{tag}]_character_{participant}.bin`.
//! Components are sanitized to `[A-Za-z0-9_-]`; anything else becomes `_`.
//! Names that do not decode are ignored by lookup and rotation.

use chrono::{Local, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

pub const BLOB_EXTENSION: &str = ".bin";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const TAG_MARKER: &str = "_tag_";
const PARTICIPANT_MARKER: &str = "_character_";
const UNNAMED: &str = "unknown";

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("valid regex"));

static BLOB_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<chat>.+)_(?P<ts>\d{14})(?:_tag_(?P<tag>.+?))?_character_(?P<participant>.+)\.bin$")
        .expect("valid regex")
});

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
pub fn sanitize(raw: &str) -> String {
    UNSAFE_CHARS.replace_all(raw, "_").into_owned()
}

/// Decoded form of a cache blob file name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheBlobName {
    chat_id: String,
    timestamp: NaiveDateTime,
    tag: Option<String>,
    participant: String,
}

impl CacheBlobName {
    /// Build a name from raw components, sanitizing each.
    ///
    /// Sub-second precision is dropped. An empty tag means "no tag".
    pub fn new(
        chat_id: &str,
        timestamp: NaiveDateTime,
        tag: Option<&str>,
        participant: &str,
    ) -> Self {
        Self {
            chat_id: non_empty(sanitize(chat_id)),
            timestamp: truncate_to_seconds(timestamp),
            tag: tag
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(sanitize),
            participant: non_empty(sanitize(participant)),
        }
    }

    /// Name for a save taken right now
    pub fn now(chat_id: &str, tag: Option<&str>, participant: &str) -> Self {
        Self::new(chat_id, Local::now().naive_local(), tag, participant)
    }

    /// Parse a file name; `None` when it is not a cache blob name
    pub fn decode(name: &str) -> Option<Self> {
        let caps = BLOB_NAME.captures(name)?;
        let timestamp = NaiveDateTime::parse_from_str(&caps["ts"], TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            chat_id: caps["chat"].to_string(),
            timestamp,
            tag: caps.name("tag").map(|m| m.as_str().to_string()),
            participant: caps["participant"].to_string(),
        })
    }

    pub fn encode(&self) -> String {
        let mut name = format!(
            "{}_{}",
            self.chat_id,
            self.timestamp.format(TIMESTAMP_FORMAT)
        );
        if let Some(tag) = &self.tag {
            name.push_str(TAG_MARKER);
            name.push_str(tag);
        }
        name.push_str(PARTICIPANT_MARKER);
        name.push_str(&self.participant);
        name.push_str(BLOB_EXTENSION);
        name
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    /// Tagged blobs are manual saves and never rotated
    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }

    /// Whether this blob belongs to the given (chat, participant) pair.
    ///
    /// Raw identifiers are sanitized before comparison.
    pub fn belongs_to(&self, chat_id: &str, participant: &str) -> bool {
        self.chat_id == non_empty(sanitize(chat_id))
            && self.participant == non_empty(sanitize(participant))
    }
}

impl fmt::Display for CacheBlobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn non_empty(value: String) -> String {
    if value.is_empty() {
        UNNAMED.to_string()
    } else {
        value
    }
}

fn truncate_to_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}
