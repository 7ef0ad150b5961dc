//! Row snapshots read from the chat database.
//!
//! All rows are immutable snapshots for the duration of one poll cycle.
//! Timestamps are converted to `DateTime<Utc>` by the store so they compare
//! directly against the listener watermark.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Globally unique identifier of a message row (`message.guid`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageGuid(pub String);

impl fmt::Display for MessageGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for MessageGuid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageGuid {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of a chat (`chat.guid`), e.g. `iMessage;-;+15550001111`.
///
/// Callers frequently hold only the bare address, so comparisons against a
/// full guid are done by suffix ([`ChatGuid::ends_with`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatGuid(pub String);

impl ChatGuid {
    /// `true` when `suffix` is a suffix of this guid.
    pub fn ends_with(&self, suffix: &ChatGuid) -> bool {
        self.0.ends_with(&suffix.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ChatGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ChatGuid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChatGuid {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Item kinds
// ---------------------------------------------------------------------------

/// `message.item_type` values written by the Messages app.
pub mod item_type {
    /// A regular text/attachment message.
    pub const MESSAGE: i64 = 0;
    /// Participant added (`group_action_type` 0) or removed (1).
    pub const PARTICIPANT_CHANGE: i64 = 1;
    /// Group renamed; the new name is in `group_title`.
    pub const NAME_CHANGE: i64 = 2;
    /// Participant left (0), group icon changed (1) or removed (2).
    pub const GROUP_ACTION: i64 = 3;
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// The remote party of a message (`handle` table).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handle {
    pub rowid: i64,
    /// Phone number or email address.
    pub address: String,
    pub service: String,
}

/// A chat the message belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRef {
    pub rowid: i64,
    pub guid: ChatGuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// An attachment joined to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub rowid: i64,
    pub guid: String,
    /// Original file name as sent, e.g. `IMG_0001.HEIC`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub total_bytes: i64,
}

/// A message row with its chats, handle and attachments denormalised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub rowid: i64,
    pub guid: MessageGuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<Handle>,
    pub is_from_me: bool,
    pub item_type: i64,
    pub group_action_type: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_title: Option<String>,
    /// Non-zero when the Messages app failed to deliver the message.
    pub error: i64,
    pub date_created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_delivered: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_read: Option<DateTime<Utc>>,
    #[serde(default)]
    pub chats: Vec<ChatRef>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// `true` for regular messages, `false` for group bookkeeping rows.
    pub fn is_plain(&self) -> bool {
        self.item_type == item_type::MESSAGE
    }

    pub fn has_error(&self) -> bool {
        self.error != 0
    }

    /// `true` when the message belongs to a chat whose guid ends with `chat`.
    pub fn in_chat(&self, chat: &ChatGuid) -> bool {
        self.chats.iter().any(|c| c.guid.ends_with(chat))
    }

    /// Identity of the row's current delivery state: `guid:delivered:read`,
    /// with timestamps as Unix milliseconds (0 when unset).
    pub fn state_key(&self) -> String {
        let delivered = self.date_delivered.map(|d| d.timestamp_millis()).unwrap_or(0);
        let read = self.date_read.map(|d| d.timestamp_millis()).unwrap_or(0);
        format!("{}:{delivered}:{read}", self.guid)
    }

    /// Short human label for log lines.
    pub fn preview(&self, max_chars: usize) -> String {
        if !self.attachments.is_empty() && self.text.as_deref().map_or(true, is_placeholder) {
            return format!("<{} attachment(s)>", self.attachments.len());
        }
        let text = self.text.as_deref().unwrap_or("<no text>");
        text.chars().take(max_chars).collect()
    }
}

/// Attachment-only bodies are stored as U+FFFC object replacement characters.
fn is_placeholder(text: &str) -> bool {
    text.chars().all(|c| c == '\u{fffc}' || c.is_whitespace())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
