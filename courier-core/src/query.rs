//! Store query description shared by the pollers and store implementations.
//!
//! A [`MessageQuery`] is one timestamp predicate plus a set of row filters.
//! Filters always apply to the whole predicate; for
//! [`TimePredicate::DeliveredOrRead`] that means both OR branches.

use chrono::{DateTime, Utc};

use crate::types::{ChatGuid, Message};

/// Half-open time range `[after, before)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self { after, before }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.after <= at && at < self.before
    }
}

/// Which timestamp column(s) a query ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePredicate {
    /// `message.date` within the window.
    Created(TimeWindow),
    /// `message.date_delivered` within the window OR `message.date_read`
    /// within the window.
    DeliveredOrRead(TimeWindow),
}

impl TimePredicate {
    pub fn window(&self) -> TimeWindow {
        match self {
            TimePredicate::Created(window) | TimePredicate::DeliveredOrRead(window) => *window,
        }
    }
}

/// Restriction on `message.item_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemFilter {
    #[default]
    Any,
    /// Only regular messages (`item_type = 0`).
    PlainOnly,
    /// Only group bookkeeping rows (`item_type != 0`).
    GroupActionsOnly,
}

/// A read-only query for message rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    pub time: TimePredicate,
    pub from_me: Option<bool>,
    pub items: ItemFilter,
    pub chat: Option<ChatGuid>,
    pub limit: Option<usize>,
}

impl MessageQuery {
    /// Rows created within `window`.
    pub fn created(window: TimeWindow) -> Self {
        Self::with_predicate(TimePredicate::Created(window))
    }

    /// Rows delivered or read within `window`.
    pub fn delivered_or_read(window: TimeWindow) -> Self {
        Self::with_predicate(TimePredicate::DeliveredOrRead(window))
    }

    fn with_predicate(time: TimePredicate) -> Self {
        Self {
            time,
            from_me: None,
            items: ItemFilter::Any,
            chat: None,
            limit: None,
        }
    }

    pub fn from_me(mut self, from_me: bool) -> Self {
        self.from_me = Some(from_me);
        self
    }

    pub fn items(mut self, items: ItemFilter) -> Self {
        self.items = items;
        self
    }

    pub fn in_chat(mut self, chat: impl Into<ChatGuid>) -> Self {
        self.chat = Some(chat.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the query against a row in memory.
    ///
    /// This is the reference semantics store implementations must agree with.
    /// `limit` is not applied here.
    pub fn matches(&self, message: &Message) -> bool {
        self.time_matches(message) && self.filters_match(message)
    }

    fn time_matches(&self, message: &Message) -> bool {
        match self.time {
            TimePredicate::Created(window) => window.contains(message.date_created),
            TimePredicate::DeliveredOrRead(window) => {
                message.date_delivered.is_some_and(|d| window.contains(d))
                    || message.date_read.is_some_and(|d| window.contains(d))
            }
        }
    }

    fn filters_match(&self, message: &Message) -> bool {
        if let Some(from_me) = self.from_me {
            if message.is_from_me != from_me {
                return false;
            }
        }
        let items_ok = match self.items {
            ItemFilter::Any => true,
            ItemFilter::PlainOnly => message.is_plain(),
            ItemFilter::GroupActionsOnly => !message.is_plain(),
        };
        if !items_ok {
            return false;
        }
        match &self.chat {
            Some(chat) => message.chats.iter().any(|c| &c.guid == chat),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{item_type, ChatRef, MessageGuid};
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(t(0), t(10))
    }

    fn msg(created: i64) -> Message {
        Message {
            guid: MessageGuid::from(format!("m-{created}")),
            date_created: t(created),
            ..Message::default()
        }
    }

    #[test]
    fn window_is_half_open() {
        let w = window();
        assert!(w.contains(t(0)));
        assert!(w.contains(t(10) - Duration::milliseconds(1)));
        assert!(!w.contains(t(10)));
        assert!(!w.contains(t(-1)));
    }

    #[test]
    fn created_predicate_uses_date_column() {
        let q = MessageQuery::created(window());
        assert!(q.matches(&msg(5)));
        assert!(!q.matches(&msg(11)));
    }

    #[test]
    fn delivered_or_read_matches_either_branch() {
        let q = MessageQuery::delivered_or_read(window());
        let mut delivered = msg(-100);
        delivered.date_delivered = Some(t(3));
        let mut read = msg(-100);
        read.date_delivered = Some(t(-50));
        read.date_read = Some(t(4));
        let untouched = msg(5);

        assert!(q.matches(&delivered));
        assert!(q.matches(&read));
        assert!(!q.matches(&untouched), "creation time alone is not an update");
    }

    #[test]
    fn filters_apply_to_both_or_branches() {
        let q = MessageQuery::delivered_or_read(window()).from_me(true);

        let mut delivered_not_mine = msg(-100);
        delivered_not_mine.date_delivered = Some(t(3));
        let mut read_not_mine = msg(-100);
        read_not_mine.date_read = Some(t(3));

        assert!(!q.matches(&delivered_not_mine));
        assert!(!q.matches(&read_not_mine));

        read_not_mine.is_from_me = true;
        assert!(q.matches(&read_not_mine));
    }

    #[test]
    fn item_filters() {
        let mut group = msg(1);
        group.item_type = item_type::NAME_CHANGE;
        let plain = msg(2);

        let plain_q = MessageQuery::created(window()).items(ItemFilter::PlainOnly);
        let group_q = MessageQuery::created(window()).items(ItemFilter::GroupActionsOnly);
        assert!(plain_q.matches(&plain) && !plain_q.matches(&group));
        assert!(group_q.matches(&group) && !group_q.matches(&plain));
    }

    #[test]
    fn chat_filter_is_exact() {
        let mut m = msg(1);
        m.chats.push(ChatRef {
            rowid: 1,
            guid: ChatGuid::from("iMessage;-;C1"),
            display_name: None,
        });
        assert!(MessageQuery::created(window()).in_chat("iMessage;-;C1").matches(&m));
        assert!(!MessageQuery::created(window()).in_chat("C1").matches(&m));
    }
}
