//! `courier poll`: one emitting cycle over the last N minutes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use courier_listener::{default_pollers, ChannelSink, Emit, MessageListener};

use crate::render;

#[derive(Args, Debug)]
pub struct PollArgs {
    /// How far back the cycle looks, in minutes.
    #[arg(long, default_value_t = 5)]
    pub since_minutes: u32,

    /// Print notifications as JSON lines.
    #[arg(long)]
    pub json: bool,
}

impl PollArgs {
    pub fn run(self, database: Option<PathBuf>) -> Result<()> {
        let resolved = super::resolve(database)?;
        let store = super::open_store(&resolved.database)?;

        let (sink, mut rx) = ChannelSink::new();
        let listener = MessageListener::builder(resolved.config.listener.clone())
            .pollers(default_pollers(store))
            .sink(Arc::new(sink))
            .build();
        let since = chrono::Duration::minutes(i64::from(self.since_minutes));
        listener.set_watermark(Utc::now() - since);

        let report = super::runtime()?
            .block_on(listener.poll_cycle(Emit::Yes))
            .context("poll cycle failed")?;
        tracing::info!(
            after = %report.window.after,
            before = %report.window.before,
            observed = report.observed,
            emitted = report.emitted,
            "poll complete",
        );

        while let Ok(notification) = rx.try_recv() {
            render::print(&notification, self.json)?;
        }
        Ok(())
    }
}
