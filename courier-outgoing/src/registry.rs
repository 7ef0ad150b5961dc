//! Registry of in-flight outgoing sends.
//!
//! # Lifecycle
//!
//! ```text
//! register ──► pending ──┬─ matching self-message row ──► resolved  (message-match)
//!                        ├─ matching send-error row  ──► rejected  (message-error, SendFailed)
//!                        ├─ reject(temp_guid, ..)     ──► rejected  (message-error)
//!                        └─ timer fires               ──► rejected  (message-error, Timeout)
//! ```
//!
//! Whichever path removes the promise from the pending list settles it; every
//! other path finds nothing and is a no-op. Matching and removal happen under
//! one lock, so two near-simultaneous rows can never both claim a promise.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use courier_core::{
    EventCategory, Message, MessageGuid, Notification, NotificationSink, OutgoingSettings,
    RejectReason,
};

use crate::error::PromiseRejection;
use crate::promise::{MessagePromise, Outcome, SendRequest};
use crate::send_cache::SendCache;

/// How many resolved row guids are remembered for the matched-row guard.
const MATCHED_HISTORY: usize = 1_024;

/// Awaitable side of a registered send.
#[derive(Debug)]
pub struct PromiseHandle {
    temp_guid: Option<String>,
    rx: oneshot::Receiver<Outcome>,
}

impl PromiseHandle {
    pub fn temp_guid(&self) -> Option<&str> {
        self.temp_guid.as_deref()
    }

    /// Wait for the store row, or the reason there will not be one.
    pub async fn wait(self) -> Result<Arc<Message>, PromiseRejection> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(PromiseRejection {
                temp_guid: self.temp_guid,
                reason: RejectReason::Other {
                    detail: "outgoing registry dropped".to_string(),
                },
                message: None,
            }),
        }
    }
}

#[derive(Default)]
struct State {
    /// Registration order.
    pending: Vec<Arc<MessagePromise>>,
    matched: HashSet<MessageGuid>,
    matched_order: VecDeque<MessageGuid>,
}

impl State {
    fn remember_match(&mut self, guid: &MessageGuid) {
        if self.matched.insert(guid.clone()) {
            self.matched_order.push_back(guid.clone());
            if self.matched_order.len() > MATCHED_HISTORY {
                if let Some(oldest) = self.matched_order.pop_front() {
                    self.matched.remove(&oldest);
                }
            }
        }
    }

    fn take_where(&mut self, pred: impl Fn(&MessagePromise) -> bool) -> Option<Arc<MessagePromise>> {
        let index = self.pending.iter().position(|p| pred(p.as_ref()))?;
        Some(self.pending.remove(index))
    }
}

struct Inner {
    settings: OutgoingSettings,
    state: Mutex<State>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    send_cache: Option<Arc<dyn SendCache>>,
    next_id: AtomicU64,
}

/// Shared handle to the registry; clones refer to the same pending set.
#[derive(Clone)]
pub struct OutgoingRegistry {
    inner: Arc<Inner>,
}

pub struct RegistryBuilder {
    settings: OutgoingSettings,
    sinks: Vec<Arc<dyn NotificationSink>>,
    send_cache: Option<Arc<dyn SendCache>>,
}

impl RegistryBuilder {
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn send_cache(mut self, cache: Arc<dyn SendCache>) -> Self {
        self.send_cache = Some(cache);
        self
    }

    pub fn build(self) -> OutgoingRegistry {
        OutgoingRegistry {
            inner: Arc::new(Inner {
                settings: self.settings,
                state: Mutex::new(State::default()),
                sinks: self.sinks,
                send_cache: self.send_cache,
                next_id: AtomicU64::new(1),
            }),
        }
    }
}

impl OutgoingRegistry {
    pub fn builder(settings: OutgoingSettings) -> RegistryBuilder {
        RegistryBuilder {
            settings,
            sinks: Vec::new(),
            send_cache: None,
        }
    }

    pub fn new(settings: OutgoingSettings) -> Self {
        Self::builder(settings).build()
    }

    /// Register a dispatched send and start its completion timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register(&self, request: SendRequest) -> PromiseHandle {
        let timeout = if request.is_attachment {
            self.inner.settings.attachment_timeout()
        } else {
            self.inner.settings.text_timeout()
        };
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let temp_guid = request.temp_guid.clone();
        let (tx, rx) = oneshot::channel();
        let promise = Arc::new(MessagePromise::new(id, request, tx));

        tracing::debug!(
            id,
            chat = %promise.chat(),
            attachment = promise.is_attachment(),
            temp_guid = ?promise.temp_guid(),
            timeout_ms = timeout.as_millis() as u64,
            "registered outgoing send",
        );

        // Arm before the promise is visible to matchers.
        promise.arm(spawn_timer(Arc::downgrade(&self.inner), id, timeout));
        self.inner.state.lock().pending.push(Arc::clone(&promise));

        PromiseHandle { temp_guid, rx }
    }

    pub fn pending(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Offer a store row observed under `category`.
    ///
    /// Self-message rows resolve the first matching promise; send-error rows
    /// reject it. Returns `true` if a promise was settled.
    pub fn observe(&self, category: EventCategory, message: &Arc<Message>) -> bool {
        match category {
            EventCategory::SelfMessage => self.try_match(message),
            EventCategory::MessageSendError => {
                let Some(promise) = self.claim(message) else {
                    return false;
                };
                let reason = RejectReason::SendFailed {
                    code: message.error,
                };
                self.inner.reject(promise, reason, Some(Arc::clone(message)), false);
                true
            }
            _ => false,
        }
    }

    /// Resolve the earliest-registered pending promise `message` satisfies.
    pub fn try_match(&self, message: &Arc<Message>) -> bool {
        let Some(promise) = self.claim(message) else {
            return false;
        };
        self.inner.resolve(promise, Arc::clone(message));
        true
    }

    /// Reject the pending promise registered with `temp_guid`.
    pub fn reject(&self, temp_guid: &str, reason: RejectReason) -> bool {
        let promise = self
            .inner
            .state
            .lock()
            .take_where(|p| p.temp_guid() == Some(temp_guid));
        match promise {
            Some(promise) => {
                self.inner.reject(promise, reason, None, false);
                true
            }
            None => false,
        }
    }

    /// Remove and return the first pending promise matching `message`,
    /// unless that row already resolved another promise.
    fn claim(&self, message: &Message) -> Option<Arc<MessagePromise>> {
        let mut state = self.inner.state.lock();
        if state.matched.contains(&message.guid) {
            tracing::trace!(guid = %message.guid, "row already matched a send");
            return None;
        }
        let promise = state.take_where(|p| p.is_same(message))?;
        state.remember_match(&message.guid);
        Some(promise)
    }
}

impl NotificationSink for OutgoingRegistry {
    fn notify(&self, notification: &Notification) {
        if let Notification::Events { category, messages } = notification {
            if !category.is_outgoing_candidate() {
                return;
            }
            for message in messages {
                self.observe(*category, message);
            }
        }
    }
}

impl Inner {
    fn resolve(&self, promise: Arc<MessagePromise>, message: Arc<Message>) {
        tracing::info!(
            id = promise.id,
            guid = %message.guid,
            temp_guid = ?promise.temp_guid(),
            "outgoing send matched",
        );
        let temp_guid = promise.temp_guid().map(str::to_owned);
        promise.settle(Ok(Arc::clone(&message)), false);
        self.forget(temp_guid.as_deref());
        self.emit(&Notification::MessageMatch { temp_guid, message });
    }

    fn reject(
        &self,
        promise: Arc<MessagePromise>,
        reason: RejectReason,
        message: Option<Arc<Message>>,
        from_timer: bool,
    ) {
        tracing::warn!(
            id = promise.id,
            temp_guid = ?promise.temp_guid(),
            reason = %reason,
            "outgoing send rejected",
        );
        let temp_guid = promise.temp_guid().map(str::to_owned);
        let rejection = PromiseRejection {
            temp_guid: temp_guid.clone(),
            reason: reason.clone(),
            message: message.clone(),
        };
        promise.settle(Err(rejection), from_timer);
        self.forget(temp_guid.as_deref());
        self.emit(&Notification::MessageError {
            temp_guid,
            reason,
            message,
        });
    }

    fn expire(&self, id: u64) {
        let promise = self.state.lock().take_where(|p| p.id == id);
        if let Some(promise) = promise {
            self.reject(promise, RejectReason::Timeout, None, true);
        }
    }

    fn forget(&self, temp_guid: Option<&str>) {
        if let (Some(cache), Some(temp_guid)) = (&self.send_cache, temp_guid) {
            cache.remove(temp_guid);
        }
    }

    fn emit(&self, notification: &Notification) {
        for sink in &self.sinks {
            sink.notify(notification);
        }
    }
}

fn spawn_timer(inner: Weak<Inner>, id: u64, timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if let Some(inner) = inner.upgrade() {
            inner.expire(id);
        }
    })
}
