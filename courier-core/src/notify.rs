//! Notification sink boundary.
//!
//! The listener emits one [`Notification::Events`] per category per cycle;
//! the outgoing registry emits match/error notifications. Delivery is
//! at-least-once: consumers that need exactly-once must de-duplicate by row
//! guid and category.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::event::EventCategory;
use crate::types::Message;

/// Why an outgoing send was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RejectReason {
    /// No matching row appeared before the promise timer fired.
    Timeout,
    /// The Messages app recorded a delivery failure on the matching row.
    SendFailed { code: i64 },
    /// The send executor reported a failure.
    Other { detail: String },
}

impl RejectReason {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RejectReason::Timeout)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Timeout => f.write_str("message send timeout"),
            RejectReason::SendFailed { code } => write!(f, "message send failed (error {code})"),
            RejectReason::Other { detail } => f.write_str(detail),
        }
    }
}

/// Everything a sink can receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    /// All events of one category from a single poll cycle, in poller order.
    Events {
        category: EventCategory,
        messages: Vec<Arc<Message>>,
    },
    /// An outgoing send was observed in the store.
    MessageMatch {
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_guid: Option<String>,
        message: Arc<Message>,
    },
    /// An outgoing send was rejected.
    MessageError {
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_guid: Option<String>,
        reason: RejectReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<Arc<Message>>,
    },
}

impl Notification {
    /// Short name used for log fields and text output.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Events { category, .. } => category.as_str(),
            Notification::MessageMatch { .. } => "message-match",
            Notification::MessageError { .. } => "message-error",
        }
    }
}

/// Receiver of notifications. Implementations must not block for long: they
/// run on the listener's cycle task.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        self(notification)
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: &Notification) {}
}
