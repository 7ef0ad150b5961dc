//! `courier watch`: run the listener in the foreground.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use courier_core::config::watched_files;
use courier_listener::{default_pollers, ChannelSink, MessageListener};
use courier_outgoing::OutgoingRegistry;

use crate::render;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Print notifications as JSON lines.
    #[arg(long)]
    pub json: bool,
}

impl WatchArgs {
    pub fn run(self, database: Option<PathBuf>) -> Result<()> {
        let resolved = super::resolve(database)?;
        let store = super::open_store(&resolved.database)?;
        let files = watched_files(&resolved.database);

        let (sink, mut rx) = ChannelSink::new();
        let sink = Arc::new(sink);
        // Settles sends registered by an embedding sender; `watch` registers none.
        let registry = OutgoingRegistry::builder(resolved.config.outgoing.clone())
            .sink(sink.clone())
            .build();
        let listener = MessageListener::builder(resolved.config.listener.clone())
            .pollers(default_pollers(store))
            .sink(sink)
            .sink(Arc::new(registry))
            .build();

        super::runtime()?.block_on(async move {
            let handle = courier_listener::start(listener, files)
                .await
                .context("failed to start listener")?;

            loop {
                tokio::select! {
                    notification = rx.recv() => match notification {
                        Some(notification) => render::print(&notification, self.json)?,
                        None => break,
                    },
                    signal = tokio::signal::ctrl_c() => {
                        signal.context("failed to listen for ctrl-c")?;
                        break;
                    }
                }
            }

            handle.stop();
            handle.join().await.context("listener shut down uncleanly")?;
            Ok::<(), anyhow::Error>(())
        })
    }
}
