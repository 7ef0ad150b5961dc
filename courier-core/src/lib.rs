//! Courier core library: store rows, queries, events, sinks, configuration.
//!
//! - [`types`]: chat database row snapshots and newtypes
//! - [`query`]: [`MessageQuery`] and its in-memory reference semantics
//! - [`store`]: the read-only [`MessageStore`] boundary
//! - [`event`]: [`EventCategory`] / [`DomainEvent`]
//! - [`notify`]: [`Notification`] and [`NotificationSink`]
//! - [`text`]: normalisation used for outgoing-send matching
//! - [`config`]: `~/.courier/config.yaml`

pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod query;
pub mod store;
pub mod text;
pub mod types;

pub use config::{CourierConfig, ListenerSettings, OutgoingSettings};
pub use error::{ConfigError, StoreError};
pub use event::{DomainEvent, EventCategory};
pub use notify::{Notification, NotificationSink, NullSink, RejectReason};
pub use query::{ItemFilter, MessageQuery, TimePredicate, TimeWindow};
pub use store::{MemoryStore, MessageStore};
pub use types::{Attachment, ChatGuid, ChatRef, Handle, Message, MessageGuid};
