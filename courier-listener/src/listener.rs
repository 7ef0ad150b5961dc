//! The change listener: watermark, poll cycles, retry, and fan-out.
//!
//! A cycle snapshots `now`, plans a window from the watermark (see
//! [`crate::window`]), runs every poller against it on a blocking task, and
//! on success advances the watermark to that `now`, drops rows the
//! [`EventCache`] has already emitted, and hands one batch per category to
//! each sink. A failing attempt re-runs the whole cycle after a doubling
//! backoff; when retries are exhausted the watermark stays where it was.
//!
//! At most one cycle runs at a time. Change-triggered cycles that find the
//! gate taken are dropped, not queued.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};

use courier_core::{
    DomainEvent, EventCategory, ListenerSettings, Message, Notification, NotificationSink,
    TimeWindow,
};

use crate::cache::EventCache;
use crate::clock::{Clock, SystemClock};
use crate::error::{io_err, ListenerError};
use crate::pollers::Poller;
use crate::window::{PollPlan, WindowPolicy};

/// Whether a successful cycle hands its events to the sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Yes,
    /// Warm-up: prime the event cache and advance the watermark only.
    Suppress,
}

/// Outcome of one successful poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub window: TimeWindow,
    pub attempts: u32,
    /// Events returned by the pollers, duplicates included.
    pub observed: usize,
    /// Events handed to sinks after de-duplication.
    pub emitted: usize,
    pub watermark: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// 1. Builder
// ---------------------------------------------------------------------------

pub struct ListenerBuilder {
    settings: ListenerSettings,
    pollers: Vec<Arc<dyn Poller>>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    clock: Arc<dyn Clock>,
}

impl ListenerBuilder {
    pub fn new(settings: ListenerSettings) -> Self {
        Self {
            settings,
            pollers: Vec::new(),
            sinks: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn poller(mut self, poller: Arc<dyn Poller>) -> Self {
        self.pollers.push(poller);
        self
    }

    pub fn pollers(mut self, pollers: impl IntoIterator<Item = Arc<dyn Poller>>) -> Self {
        self.pollers.extend(pollers);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Arc<MessageListener> {
        let (shutdown, _) = broadcast::channel(4);
        let now = self.clock.now();
        Arc::new(MessageListener {
            policy: WindowPolicy::from(&self.settings),
            cache: Mutex::new(EventCache::new(self.settings.event_cache_ttl())),
            settings: self.settings,
            pollers: Arc::new(self.pollers),
            sinks: self.sinks,
            clock: self.clock,
            watermark: Mutex::new(now),
            gate: Arc::new(Semaphore::new(1)),
            stopped: AtomicBool::new(false),
            shutdown,
        })
    }
}

// ---------------------------------------------------------------------------
// 2. Listener
// ---------------------------------------------------------------------------

pub struct MessageListener {
    settings: ListenerSettings,
    policy: WindowPolicy,
    pollers: Arc<Vec<Arc<dyn Poller>>>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    clock: Arc<dyn Clock>,
    watermark: Mutex<DateTime<Utc>>,
    cache: Mutex<EventCache>,
    gate: Arc<Semaphore>,
    stopped: AtomicBool,
    shutdown: broadcast::Sender<()>,
}

impl MessageListener {
    pub fn builder(settings: ListenerSettings) -> ListenerBuilder {
        ListenerBuilder::new(settings)
    }

    pub fn settings(&self) -> &ListenerSettings {
        &self.settings
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        *self.watermark.lock()
    }

    /// Overwrite the watermark. The next cycle sanitizes whatever is set.
    pub fn set_watermark(&self, at: DateTime<Utc>) {
        *self.watermark.lock() = at;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// True while a cycle holds the gate.
    pub fn is_polling(&self) -> bool {
        self.gate.available_permits() == 0
    }

    /// Stop accepting change triggers and tell the trigger loop to exit.
    /// A cycle already running finishes normally.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            tracing::info!("stopping message listener");
        }
        let _ = self.shutdown.send(());
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Seed the watermark from the earliest mtime among `files`, minus the
    /// startup margin. Missing files are skipped; if none exist the
    /// watermark is `now - margin`.
    pub fn seed_watermark(&self, files: &[PathBuf]) -> Result<DateTime<Utc>, ListenerError> {
        let mut earliest = self.clock.now();
        for file in files {
            let modified = match std::fs::metadata(file) {
                Ok(meta) => meta.modified().map_err(|e| io_err(file, e))?,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(io_err(file, err)),
            };
            let modified = DateTime::<Utc>::from(modified);
            if modified < earliest {
                earliest = modified;
            }
        }
        let margin = chrono::Duration::from_std(self.settings.startup_margin())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let seeded = earliest
            .checked_sub_signed(margin)
            .unwrap_or(earliest);
        self.set_watermark(seeded);
        tracing::debug!(watermark = %seeded, files = files.len(), "seeded watermark");
        Ok(seeded)
    }

    /// Seed the watermark and run one non-emitting cycle.
    pub async fn warm_up(&self, files: &[PathBuf]) -> Result<CycleReport, ListenerError> {
        self.seed_watermark(files)?;
        let report = self.poll_cycle(Emit::Suppress).await?;
        tracing::info!(
            observed = report.observed,
            watermark = %report.watermark,
            "listener warm-up complete",
        );
        Ok(report)
    }

    /// Run one cycle, waiting for any in-flight cycle to finish first.
    pub async fn poll_cycle(&self, emit: Emit) -> Result<CycleReport, ListenerError> {
        let _permit = Arc::clone(&self.gate)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::ChannelClosed("poll gate"))?;
        self.run_cycle(emit).await
    }

    /// Handle a debounced change: run a cycle unless one is in flight or the
    /// listener has stopped, in which case `Ok(None)`.
    pub async fn handle_change(&self) -> Result<Option<CycleReport>, ListenerError> {
        if self.is_stopped() {
            return Ok(None);
        }
        let Some(_permit) = self.try_gate() else {
            tracing::debug!("poll already in progress; dropping change");
            return Ok(None);
        };
        self.run_cycle(Emit::Yes).await.map(Some)
    }

    fn try_gate(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.gate).try_acquire_owned().ok()
    }

    /// Plan for the next cycle at the clock's current time, without running it.
    pub fn plan(&self) -> PollPlan {
        self.policy.plan(self.watermark(), self.clock.now())
    }

    async fn run_cycle(&self, emit: Emit) -> Result<CycleReport, ListenerError> {
        let plan = self.plan();
        if let Some(clamp) = plan.clamp {
            tracing::warn!(
                ?clamp,
                watermark = %self.watermark(),
                after = %plan.window.after,
                "watermark clamped before polling",
            );
        }
        tracing::debug!(
            after = %plan.window.after,
            before = %plan.window.before,
            interval_ms = plan.interval.as_millis() as u64,
            "starting poll cycle",
        );

        let (events, attempts) = self.execute_with_retry(plan.window).await?;
        let observed = events.len();

        let now = plan.window.before;
        self.set_watermark(now);

        let fresh = {
            let mut cache = self.cache.lock();
            let fresh = cache.retain_unseen(events, now);
            cache.trim(now);
            fresh
        };
        let emitted = match emit {
            Emit::Yes => {
                let count = fresh.len();
                self.fan_out(fresh);
                count
            }
            Emit::Suppress => 0,
        };

        Ok(CycleReport {
            window: plan.window,
            attempts,
            observed,
            emitted,
            watermark: now,
        })
    }

    async fn execute_with_retry(
        &self,
        window: TimeWindow,
    ) -> Result<(Vec<DomainEvent>, u32), ListenerError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.run_pollers(window).await {
                Ok(events) => return Ok((events, attempt)),
                Err(err) if attempt <= self.settings.max_retries => {
                    let delay = retry_delay(self.settings.initial_retry_delay(), attempt);
                    tracing::warn!(
                        attempt,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "poll attempt failed; retrying",
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::error!(attempts = attempt, error = %err, "poll cycle failed");
                    return Err(ListenerError::CycleFailed {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
            }
        }
    }

    async fn run_pollers(&self, window: TimeWindow) -> Result<Vec<DomainEvent>, ListenerError> {
        let pollers = Arc::clone(&self.pollers);
        tokio::task::spawn_blocking(move || {
            let mut events = Vec::new();
            for poller in pollers.iter() {
                let batch = poller.poll(window).map_err(|source| ListenerError::Poll {
                    poller: poller.name(),
                    source,
                })?;
                tracing::trace!(poller = poller.name(), events = batch.len(), "poller returned");
                events.extend(batch);
            }
            Ok(events)
        })
        .await
        .map_err(|err| ListenerError::Join(err.to_string()))?
    }

    fn fan_out(&self, events: Vec<DomainEvent>) {
        for (category, messages) in group_by_category(events) {
            tracing::info!(category = %category, count = messages.len(), "emitting events");
            let notification = Notification::Events { category, messages };
            for sink in &self.sinks {
                sink.notify(&notification);
            }
        }
    }
}

/// Group events by category, categories in order of first appearance and
/// events in their original relative order.
pub fn group_by_category(events: Vec<DomainEvent>) -> Vec<(EventCategory, Vec<Arc<Message>>)> {
    let mut groups: Vec<(EventCategory, Vec<Arc<Message>>)> = Vec::new();
    for event in events {
        match groups.iter_mut().find(|(category, _)| *category == event.category) {
            Some((_, messages)) => messages.push(event.message),
            None => groups.push((event.category, vec![event.message])),
        }
    }
    groups
}

/// Backoff before retry `n` (1-based): `initial × 2^(n-1)`.
pub fn retry_delay(initial: Duration, retry: u32) -> Duration {
    initial.saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
}
