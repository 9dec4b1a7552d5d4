use anyhow::Result;
use std::path::Path;

use crate::store::IntervalStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: IntervalStore,
}

impl AppState {
    pub fn new(db_path: &Path) -> Result<Self> {
        Ok(AppState {
            store: IntervalStore::open(db_path)?,
        })
    }

    /// State backed by an in-memory database (for tests).
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Ok(AppState {
            store: IntervalStore::open_in_memory()?,
        })
    }
}
