use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// One news item as persisted in the cache file.
///
/// Fields the aggregation layer doesn't know about survive a
/// read/write cycle untouched via the flattened `extra` map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of a raw cache read, kept distinct so logs can tell a
/// missing file from a corrupt one. Callers of the trait only ever
/// see the record list.
#[derive(Debug)]
pub enum CacheRead {
    Loaded(Vec<UpdateRecord>),
    Missing,
    Corrupt(serde_json::Error),
}

/// Storage seam between the fetcher and the read routes.
///
/// `read` never fails: a missing or unreadable cache degrades to an
/// empty list. `write` replaces the full record array and is best
/// effort; failures are logged, not returned.
pub trait UpdateStore: Send + Sync {
    fn read(&self) -> Vec<UpdateRecord>;
    fn write(&self, records: &[UpdateRecord]);
}

/// JSON-file-backed store, one file per domain.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn read_detailed(&self) -> CacheRead {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CacheRead::Missing,
            Err(e) => {
                error!("Failed to read cache file {}: {}", self.path.display(), e);
                return CacheRead::Missing;
            }
        };

        match serde_json::from_str(&content) {
            Ok(records) => CacheRead::Loaded(records),
            Err(e) => CacheRead::Corrupt(e),
        }
    }
}

impl UpdateStore for FileStore {
    fn read(&self) -> Vec<UpdateRecord> {
        match self.read_detailed() {
            CacheRead::Loaded(records) => records,
            CacheRead::Missing => {
                warn!("Cache file {} not found, serving empty data", self.path.display());
                Vec::new()
            }
            CacheRead::Corrupt(e) => {
                error!("Cache file {} is corrupt, serving empty data: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn write(&self, records: &[UpdateRecord]) {
        if let Err(e) = self.try_write(records) {
            error!("Failed to write cache file {}: {}", self.path.display(), e);
        }
    }
}

impl FileStore {
    fn try_write(&self, records: &[UpdateRecord]) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_string_pretty(records)?;

        // Write to a sibling temp file and rename so a concurrent
        // reader sees either the old array or the new one, never a
        // partially written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemStore {
    records: RwLock<Vec<UpdateRecord>>,
}

impl MemStore {
    pub fn new(records: Vec<UpdateRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

impl UpdateStore for MemStore {
    fn read(&self) -> Vec<UpdateRecord> {
        self.records.read().unwrap().clone()
    }

    fn write(&self, records: &[UpdateRecord]) {
        *self.records.write().unwrap() = records.to_vec();
    }
}
