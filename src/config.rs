//! Engine configuration
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Where the sled database lives. `None` opens a temporary database that
    /// is removed when dropped.
    pub db_path: Option<PathBuf>,
    /// Flush to disk after every committed transition.
    pub flush_on_commit: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }
    pub fn with_flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }
    pub fn open(&self) -> Result<sled::Db, sled::Error> {
        let config = match &self.db_path {
            Some(path) => sled::Config::new().path(path),
            None => sled::Config::new().temporary(true),
        };
        config.open()
    }
}
