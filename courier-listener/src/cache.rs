//! Suppresses re-emission of rows that overlapping windows return twice.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use courier_core::DomainEvent;

/// Keyed by [`DomainEvent::dedup_key`]; entries expire after `ttl`.
#[derive(Debug)]
pub struct EventCache {
    ttl: chrono::Duration,
    seen: HashMap<String, DateTime<Utc>>,
}

impl EventCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(1)),
            seen: HashMap::new(),
        }
    }

    /// Record `key`; `false` if it was already seen and not yet expired.
    pub fn admit(&mut self, key: String, now: DateTime<Utc>) -> bool {
        match self.seen.get(&key) {
            Some(seen_at) if now - *seen_at < self.ttl => false,
            _ => {
                self.seen.insert(key, now);
                true
            }
        }
    }

    /// Keep only events not seen before, recording every one kept.
    pub fn retain_unseen(&mut self, events: Vec<DomainEvent>, now: DateTime<Utc>) -> Vec<DomainEvent> {
        events
            .into_iter()
            .filter(|event| self.admit(event.dedup_key(), now))
            .collect()
    }

    /// Drop expired entries; returns how many were removed.
    pub fn trim(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        let ttl = self.ttl;
        self.seen.retain(|_, seen_at| now - *seen_at < ttl);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use courier_core::{EventCategory, Message, MessageGuid};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn event(guid: &str, category: EventCategory) -> DomainEvent {
        DomainEvent::new(
            category,
            Message {
                guid: MessageGuid::from(guid),
                ..Message::default()
            },
        )
    }

    #[test]
    fn repeated_rows_are_suppressed() {
        let mut cache = EventCache::new(Duration::from_secs(60));
        let first = cache.retain_unseen(
            vec![event("a", EventCategory::NewMessage), event("b", EventCategory::NewMessage)],
            at(0),
        );
        assert_eq!(first.len(), 2);

        let second = cache.retain_unseen(
            vec![event("a", EventCategory::NewMessage), event("c", EventCategory::NewMessage)],
            at(1),
        );
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message.guid.0, "c");
    }

    #[test]
    fn same_row_in_another_category_is_new() {
        let mut cache = EventCache::new(Duration::from_secs(60));
        assert!(cache.admit(event("a", EventCategory::SelfMessage).dedup_key(), at(0)));
        assert!(cache.admit(event("a", EventCategory::MessageUpdated).dedup_key(), at(0)));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = EventCache::new(Duration::from_secs(60));
        cache.admit("k".to_string(), at(0));
        assert!(!cache.admit("k".to_string(), at(59)));
        assert_eq!(cache.trim(at(61)), 1);
        assert!(cache.is_empty());
        assert!(cache.admit("k".to_string(), at(62)));
    }
}
