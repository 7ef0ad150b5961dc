use std::future::pending;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::debounce::{ChangeOutcome, Debouncer};
use crate::error::ListenerError;
use crate::listener::MessageListener;
use crate::watcher::{FileWatcher, WatchSignal};

/// A running listener: its trigger loop task plus a way to stop it.
pub struct ListenerHandle {
    listener: Arc<MessageListener>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn listener(&self) -> &Arc<MessageListener> {
        &self.listener
    }

    pub fn stop(&self) {
        self.listener.stop();
    }

    /// Wait for the trigger loop to exit.
    pub async fn join(self) -> Result<(), ListenerError> {
        self.task
            .await
            .map_err(|err| ListenerError::Join(format!("trigger loop: {err}")))
    }
}

/// Warm up, attach a file watcher to `files`, and start reacting to changes.
pub async fn start(
    listener: Arc<MessageListener>,
    files: Vec<PathBuf>,
) -> Result<ListenerHandle, ListenerError> {
    listener.warm_up(&files).await?;

    let (tx, rx) = mpsc::unbounded_channel();
    let watcher = FileWatcher::start(&files, tx)?;
    tracing::info!(files = ?watcher.files(), "listening for database changes");

    let task = spawn_trigger_loop(Arc::clone(&listener), rx, Some(watcher));
    Ok(ListenerHandle { listener, task })
}

/// Drive `listener` from `signals`. `watcher`, if any, lives as long as the
/// loop and is dropped (detached) when the loop exits.
pub fn spawn_trigger_loop(
    listener: Arc<MessageListener>,
    signals: mpsc::UnboundedReceiver<WatchSignal>,
    watcher: Option<FileWatcher>,
) -> JoinHandle<()> {
    tokio::spawn(trigger_loop(listener, signals, watcher))
}

async fn trigger_loop(
    listener: Arc<MessageListener>,
    mut signals: mpsc::UnboundedReceiver<WatchSignal>,
    watcher: Option<FileWatcher>,
) {
    let _watcher = watcher;
    let mut shutdown_rx = listener.subscribe_shutdown();
    if listener.is_stopped() {
        return;
    }
    let mut debouncer = Debouncer::new(listener.settings().debounce());
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();

    loop {
        let deadline = debouncer.deadline();
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            signal = signals.recv() => {
                let Some(signal) = signal else { break };
                match signal {
                    WatchSignal::Changed(change) => {
                        let outcome = debouncer.on_change(Instant::now());
                        if outcome == ChangeOutcome::DroppedInFlight {
                            tracing::debug!(path = %change.path().display(), "change during poll; dropped");
                        } else {
                            tracing::trace!(path = %change.path().display(), ?outcome, "change noticed");
                        }
                    }
                    WatchSignal::Error(err) => {
                        tracing::warn!(error = %err, "file watcher error");
                    }
                }
            }
            _ = wait_until(deadline) => {
                if !debouncer.on_deadline(Instant::now()) {
                    continue;
                }
                let listener = Arc::clone(&listener);
                let done = done_tx.clone();
                tokio::spawn(async move {
                    match listener.handle_change().await {
                        Ok(Some(report)) => tracing::debug!(
                            attempts = report.attempts,
                            observed = report.observed,
                            emitted = report.emitted,
                            "change-triggered poll completed",
                        ),
                        Ok(None) => {}
                        Err(err) => tracing::error!(error = %err, "change-triggered poll failed"),
                    }
                    let _ = done.send(());
                });
            }
            Some(()) = done_rx.recv() => debouncer.on_cycle_finished(),
        }
    }

    debouncer.cancel();
    tracing::debug!("trigger loop exited");
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides `default`.
pub fn init_tracing(default: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
