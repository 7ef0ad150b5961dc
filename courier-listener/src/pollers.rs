//! Category pollers: turn one query window into typed domain events.
//!
//! Each category owns the timestamp column it ranges over and the rows it
//! claims:
//!
//! | kind            | predicate              | rows                          |
//! |-----------------|------------------------|-------------------------------|
//! | `NewMessages`   | created in window      | plain, not from me            |
//! | `SelfMessages`  | created in window      | plain, from me                |
//! | `Updates`       | delivered OR read      | plain, from me                |
//! | `GroupChanges`  | created in window      | group bookkeeping rows        |
//!
//! Store failures are returned as-is; the listener retries the whole cycle.

use std::sync::Arc;

use courier_core::{
    types::item_type, DomainEvent, EventCategory, ItemFilter, Message, MessageQuery,
    MessageStore, StoreError, TimeWindow,
};

/// One source of domain events for a poll window.
///
/// Implementations block; the listener calls them from a blocking task.
pub trait Poller: Send + Sync {
    fn name(&self) -> &'static str;

    fn poll(&self, window: TimeWindow) -> Result<Vec<DomainEvent>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerKind {
    NewMessages,
    SelfMessages,
    Updates,
    GroupChanges,
}

impl PollerKind {
    /// Registration order used by [`default_pollers`].
    pub const ALL: [PollerKind; 4] = [
        PollerKind::NewMessages,
        PollerKind::SelfMessages,
        PollerKind::Updates,
        PollerKind::GroupChanges,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PollerKind::NewMessages => "new-message",
            PollerKind::SelfMessages => "self-message",
            PollerKind::Updates => "updated-message",
            PollerKind::GroupChanges => "group-change",
        }
    }

    pub fn query(self, window: TimeWindow) -> MessageQuery {
        match self {
            PollerKind::NewMessages => MessageQuery::created(window)
                .from_me(false)
                .items(ItemFilter::PlainOnly),
            PollerKind::SelfMessages => MessageQuery::created(window)
                .from_me(true)
                .items(ItemFilter::PlainOnly),
            PollerKind::Updates => MessageQuery::delivered_or_read(window)
                .from_me(true)
                .items(ItemFilter::PlainOnly),
            PollerKind::GroupChanges => {
                MessageQuery::created(window).items(ItemFilter::GroupActionsOnly)
            }
        }
    }

    /// Category for a row this kind returned, or `None` to skip it.
    pub fn categorize(self, message: &Message) -> Option<EventCategory> {
        match self {
            PollerKind::NewMessages => Some(EventCategory::NewMessage),
            PollerKind::SelfMessages if message.has_error() => {
                Some(EventCategory::MessageSendError)
            }
            PollerKind::SelfMessages => Some(EventCategory::SelfMessage),
            PollerKind::Updates => Some(EventCategory::MessageUpdated),
            PollerKind::GroupChanges => group_change_category(message),
        }
    }
}

/// Map a bookkeeping row's `(item_type, group_action_type)` to a category.
pub fn group_change_category(message: &Message) -> Option<EventCategory> {
    match (message.item_type, message.group_action_type) {
        (item_type::PARTICIPANT_CHANGE, 0) => Some(EventCategory::ParticipantAdded),
        (item_type::PARTICIPANT_CHANGE, 1) => Some(EventCategory::ParticipantRemoved),
        (item_type::NAME_CHANGE, _) => Some(EventCategory::GroupNameChanged),
        (item_type::GROUP_ACTION, 0) => Some(EventCategory::ParticipantLeft),
        (item_type::GROUP_ACTION, 1) => Some(EventCategory::GroupIconChanged),
        (item_type::GROUP_ACTION, 2) => Some(EventCategory::GroupIconRemoved),
        _ => None,
    }
}

/// A [`PollerKind`] bound to a store.
pub struct StorePoller {
    kind: PollerKind,
    store: Arc<dyn MessageStore>,
}

impl StorePoller {
    pub fn new(kind: PollerKind, store: Arc<dyn MessageStore>) -> Self {
        Self { kind, store }
    }

    pub fn kind(&self) -> PollerKind {
        self.kind
    }
}

impl Poller for StorePoller {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn poll(&self, window: TimeWindow) -> Result<Vec<DomainEvent>, StoreError> {
        let rows = self.store.messages(&self.kind.query(window))?;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            match self.kind.categorize(&row) {
                Some(category) => events.push(DomainEvent::new(category, row)),
                None => tracing::trace!(
                    poller = self.kind.name(),
                    guid = %row.guid,
                    item_type = row.item_type,
                    group_action_type = row.group_action_type,
                    "skipping unrecognised group action",
                ),
            }
        }
        Ok(events)
    }
}

/// The four category pollers, in registration order.
pub fn default_pollers(store: Arc<dyn MessageStore>) -> Vec<Arc<dyn Poller>> {
    PollerKind::ALL
        .into_iter()
        .map(|kind| Arc::new(StorePoller::new(kind, Arc::clone(&store))) as Arc<dyn Poller>)
        .collect()
}
