//! Typed domain events produced by the pollers.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Category of a domain event. The serialized name is the wire event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    /// Inbound message from another participant.
    NewMessage,
    /// Message authored on this machine or another of the user's devices.
    SelfMessage,
    /// A self-authored message the Messages app failed to send.
    MessageSendError,
    /// Delivered or read timestamp changed.
    #[serde(rename = "updated-message")]
    MessageUpdated,
    #[serde(rename = "group-name-change")]
    GroupNameChanged,
    ParticipantAdded,
    ParticipantRemoved,
    ParticipantLeft,
    GroupIconChanged,
    GroupIconRemoved,
}

impl EventCategory {
    pub const ALL: [EventCategory; 10] = [
        EventCategory::NewMessage,
        EventCategory::SelfMessage,
        EventCategory::MessageSendError,
        EventCategory::MessageUpdated,
        EventCategory::GroupNameChanged,
        EventCategory::ParticipantAdded,
        EventCategory::ParticipantRemoved,
        EventCategory::ParticipantLeft,
        EventCategory::GroupIconChanged,
        EventCategory::GroupIconRemoved,
    ];

    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::NewMessage => "new-message",
            EventCategory::SelfMessage => "self-message",
            EventCategory::MessageSendError => "message-send-error",
            EventCategory::MessageUpdated => "updated-message",
            EventCategory::GroupNameChanged => "group-name-change",
            EventCategory::ParticipantAdded => "participant-added",
            EventCategory::ParticipantRemoved => "participant-removed",
            EventCategory::ParticipantLeft => "participant-left",
            EventCategory::GroupIconChanged => "group-icon-changed",
            EventCategory::GroupIconRemoved => "group-icon-removed",
        }
    }

    /// Categories whose rows are candidates for outgoing-send correlation.
    pub fn is_outgoing_candidate(self) -> bool {
        matches!(
            self,
            EventCategory::SelfMessage | EventCategory::MessageSendError
        )
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a store row, tagged with its category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvent {
    pub category: EventCategory,
    pub message: Arc<Message>,
}

impl DomainEvent {
    pub fn new(category: EventCategory, message: impl Into<Arc<Message>>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }

    /// De-duplication key: the same row in the same delivery state under the
    /// same category is the same logical event.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.category, self.message.state_key())
    }
}
