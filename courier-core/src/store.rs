//! Read-only store boundary.
//!
//! The listener never issues SQL itself; it describes what it needs as a
//! [`MessageQuery`] and hands it to a [`MessageStore`]. The SQLite-backed
//! implementation lives in `courier-store`; [`MemoryStore`] evaluates queries
//! in memory and backs tests and dry runs.

use parking_lot::RwLock;

use crate::error::StoreError;
use crate::query::MessageQuery;
use crate::types::{Message, MessageGuid};

/// Read-only access to message rows.
///
/// Implementations are blocking; async callers run them on a blocking pool.
/// Rows are returned ordered by creation time, then row id.
pub trait MessageStore: Send + Sync {
    fn messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StoreError>;
}

impl<S: MessageStore + ?Sized> MessageStore for std::sync::Arc<S> {
    fn messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StoreError> {
        (**self).messages(query)
    }
}

/// In-memory [`MessageStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row, replacing any existing row with the same guid.
    pub fn upsert(&self, message: Message) {
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|row| row.guid == message.guid) {
            Some(existing) => *existing = message,
            None => rows.push(message),
        }
    }

    /// Apply `update` to the row with `guid`; returns `false` if absent.
    pub fn update(&self, guid: &MessageGuid, update: impl FnOnce(&mut Message)) -> bool {
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|row| &row.guid == guid) {
            Some(row) => {
                update(row);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl MessageStore for MemoryStore {
    fn messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StoreError> {
        let rows = self.rows.read();
        let mut matched: Vec<Message> = rows.iter().filter(|m| query.matches(m)).cloned().collect();
        matched.sort_by(|a, b| {
            a.date_created
                .cmp(&b.date_created)
                .then(a.rowid.cmp(&b.rowid))
        });
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
