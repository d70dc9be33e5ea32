//! Runtime configuration for the browse service and its adapters.

use std::path::PathBuf;

use crate::search::tantivy::index_dir;

/// Default tantivy writer arena.
pub const DEFAULT_WRITER_HEAP_BYTES: usize = 50_000_000;

/// Deepest `start + limit` a preview page may reach.
pub const DEFAULT_MAX_RESULT_WINDOW: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseConfig {
    pub data_dir: PathBuf,
    pub index_dir: PathBuf,
    pub db_path: PathBuf,
    pub writer_heap_bytes: usize,
    pub max_result_window: u64,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self::with_data_dir(default_data_dir())
    }
}

impl BrowseConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            index_dir: index_dir(&data_dir),
            db_path: data_dir.join("components.db"),
            data_dir,
            writer_heap_bytes: DEFAULT_WRITER_HEAP_BYTES,
            max_result_window: DEFAULT_MAX_RESULT_WINDOW,
        }
    }

    /// Load config from environment variables (and `.env`, if present).
    pub fn from_env() -> Self {
        let mut cfg = match dotenvy::var("CLEANUP_BROWSE_DATA_DIR") {
            Ok(dir) => Self::with_data_dir(PathBuf::from(dir)),
            Err(_) => Self::default(),
        };

        if let Ok(path) = dotenvy::var("CLEANUP_BROWSE_INDEX_DIR") {
            cfg.index_dir = PathBuf::from(path);
        }

        if let Ok(path) = dotenvy::var("CLEANUP_BROWSE_DB") {
            cfg.db_path = PathBuf::from(path);
        }

        if let Ok(val) = dotenvy::var("CLEANUP_BROWSE_WRITER_HEAP_BYTES")
            && let Ok(n) = val.parse()
        {
            cfg.writer_heap_bytes = n;
        }

        if let Ok(val) = dotenvy::var("CLEANUP_BROWSE_MAX_RESULT_WINDOW")
            && let Ok(n) = val.parse()
        {
            cfg.max_result_window = n;
        }

        cfg
    }
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "cleanup-browse", "cleanup-browse")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".cleanup-browse"))
}
