//! Change listener: file watching, debounced adaptive polling, and fan-out.

pub mod cache;
pub mod clock;
pub mod debounce;
mod error;
pub mod listener;
pub mod pollers;
mod runtime;
pub mod sink;
pub mod watcher;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ListenerError;
pub use listener::{CycleReport, Emit, ListenerBuilder, MessageListener};
pub use pollers::{default_pollers, Poller, PollerKind, StorePoller};
pub use runtime::{init_tracing, spawn_trigger_loop, start, ListenerHandle};
pub use sink::ChannelSink;
pub use watcher::{FileChange, FileWatcher, WatchSignal};
pub use window::{PollPlan, WatermarkClamp, WindowPolicy};
