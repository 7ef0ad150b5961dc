pub mod config;
pub mod poll;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use courier_core::{CourierConfig, MessageStore};
use courier_store::SqliteStore;

/// Home directory, loaded config, and the database path after `--database`.
pub struct Resolved {
    pub home: PathBuf,
    pub config: CourierConfig,
    pub database: PathBuf,
}

pub fn resolve(database: Option<PathBuf>) -> Result<Resolved> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let config = courier_core::config::load_at(&home).context("failed to load courier config")?;
    let database = database.unwrap_or_else(|| config.database_path(&home));
    Ok(Resolved {
        home,
        config,
        database,
    })
}

pub fn open_store(database: &Path) -> Result<Arc<dyn MessageStore>> {
    let store = SqliteStore::open(database)
        .with_context(|| format!("cannot read {}", database.display()))?;
    Ok(Arc::new(store))
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
