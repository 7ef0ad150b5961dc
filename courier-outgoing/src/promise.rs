//! A single registered outgoing send and its match rule.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use courier_core::text::{attachment_key, normalize, normalize_opt};
use courier_core::{ChatGuid, Message};

use crate::error::PromiseRejection;

pub(crate) type Outcome = Result<Arc<Message>, PromiseRejection>;

/// What the caller dispatched to the send executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Full chat guid or a bare address; matched by suffix. Empty matches any chat.
    pub chat: ChatGuid,
    /// Message body, or the file name for attachment sends.
    pub body: String,
    pub subject: Option<String>,
    pub is_attachment: bool,
    pub submitted_at: DateTime<Utc>,
    /// Caller's correlation token, echoed in match/error notifications.
    pub temp_guid: Option<String>,
}

impl SendRequest {
    pub fn text(chat: impl Into<ChatGuid>, body: impl Into<String>) -> Self {
        Self {
            chat: chat.into(),
            body: body.into(),
            subject: None,
            is_attachment: false,
            submitted_at: Utc::now(),
            temp_guid: None,
        }
    }

    pub fn attachment(chat: impl Into<ChatGuid>, file_name: impl Into<String>) -> Self {
        Self {
            is_attachment: true,
            ..Self::text(chat, file_name)
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = at;
        self
    }

    pub fn temp_guid(mut self, temp_guid: impl Into<String>) -> Self {
        self.temp_guid = Some(temp_guid.into());
        self
    }
}

/// A pending send. Settles exactly once; the registry guarantees that by
/// removing the promise from its pending list before settling it.
pub struct MessagePromise {
    pub(crate) id: u64,
    chat: ChatGuid,
    /// Normalised body, or normalised file stem for attachments.
    text: String,
    subject: String,
    is_attachment: bool,
    submitted_at: DateTime<Utc>,
    temp_guid: Option<String>,
    completion: Mutex<Option<oneshot::Sender<Outcome>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl MessagePromise {
    pub(crate) fn new(id: u64, request: SendRequest, completion: oneshot::Sender<Outcome>) -> Self {
        let text = if request.is_attachment {
            attachment_key(&request.body)
        } else {
            normalize(&request.body)
        };
        Self {
            id,
            chat: request.chat,
            text,
            subject: normalize_opt(request.subject.as_deref()),
            is_attachment: request.is_attachment,
            submitted_at: request.submitted_at,
            temp_guid: request.temp_guid,
            completion: Mutex::new(Some(completion)),
            timer: Mutex::new(None),
        }
    }

    pub fn temp_guid(&self) -> Option<&str> {
        self.temp_guid.as_deref()
    }

    pub fn chat(&self) -> &ChatGuid {
        &self.chat
    }

    pub fn is_attachment(&self) -> bool {
        self.is_attachment
    }

    pub fn normalized_text(&self) -> &str {
        &self.text
    }

    /// Whether `message` is the store row for this send.
    pub fn is_same(&self, message: &Message) -> bool {
        // Rows without chat joins skip the chat check.
        if !self.chat.is_empty()
            && !message.chats.is_empty()
            && !message.in_chat(&self.chat)
        {
            return false;
        }

        if self.is_attachment {
            return message
                .attachments
                .iter()
                .filter_map(|a| a.transfer_name.as_deref())
                .any(|name| attachment_key(name) == self.text);
        }

        let row_subject = normalize_opt(message.subject.as_deref());
        if !self.subject.is_empty() && !row_subject.is_empty() && self.subject != row_subject {
            return false;
        }

        self.text == normalize_opt(message.text.as_deref())
            && message.date_created >= self.submitted_at
    }

    pub(crate) fn arm(&self, timer: JoinHandle<()>) {
        *self.timer.lock() = Some(timer);
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// Deliver `outcome` to the waiting handle. The timer is aborted unless
    /// this call comes from the timer itself.
    pub(crate) fn settle(&self, outcome: Outcome, from_timer: bool) {
        if let Some(timer) = self.timer.lock().take() {
            if !from_timer {
                timer.abort();
            }
        }
        if let Some(tx) = self.completion.lock().take() {
            let _ = tx.send(outcome);
        }
    }
}

impl std::fmt::Debug for MessagePromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePromise")
            .field("id", &self.id)
            .field("chat", &self.chat)
            .field("text", &self.text)
            .field("is_attachment", &self.is_attachment)
            .field("temp_guid", &self.temp_guid)
            .finish()
    }
}
