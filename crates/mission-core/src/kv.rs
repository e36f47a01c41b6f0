use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::error::{DashboardError, Result};

pub const DEFAULT_NAMESPACE: &str = "crypto-missions";

/// Raw string storage addressed by key.
pub trait Medium: Send + Sync + fmt::Debug {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One JSON file per key inside a data directory.
#[derive(Debug)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    #[tracing::instrument(skip(dir))]
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        info!(data_dir = %dir.display(), "opened key-value directory");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys are percent-encoded so distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }
}

impl Medium for FileMedium {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        debug!(file = %path.display(), "writing slice atomically");

        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }
}

/// In-process medium. An optional byte capacity makes writes fail the way
/// a full browser storage quota does.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            capacity: Some(bytes),
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
    }
}

impl Medium for MemoryMedium {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock();
        if let Some(capacity) = self.capacity {
            let used: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > capacity {
                return Err(anyhow!("quota of {capacity} bytes exceeded writing {key}"));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed, namespaced view over a [`Medium`].
#[derive(Debug, Clone)]
pub struct KvBinding {
    medium: Arc<dyn Medium>,
    namespace: String,
}

impl KvBinding {
    pub fn new(medium: Arc<dyn Medium>, namespace: impl Into<String>) -> Self {
        Self {
            medium,
            namespace: namespace.into(),
        }
    }

    pub fn key(&self, slice: &str) -> String {
        format!("{}:{slice}", self.namespace)
    }

    /// Returns `default` when nothing is stored or the stored text does not decode.
    #[tracing::instrument(skip(self, default))]
    pub fn load<T: DeserializeOwned>(&self, slice: &str, default: T) -> T {
        match self.try_load(slice) {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(slice, "nothing stored; using default");
                default
            }
            Err(err) => {
                warn!(error = %err, "stored slice unreadable; using default");
                default
            }
        }
    }

    pub fn try_load<T: DeserializeOwned>(&self, slice: &str) -> Result<Option<T>> {
        let key = self.key(slice);
        let raw = self
            .medium
            .read(&key)
            .map_err(|err| DashboardError::StorageDecode {
                key: key.clone(),
                reason: format!("{err:#}"),
            })?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| DashboardError::StorageDecode {
                key,
                reason: err.to_string(),
            })
    }

    /// Write-through save. Failures are logged and swallowed; the caller's
    /// in-memory value stays authoritative.
    pub fn save<T: Serialize + ?Sized>(&self, slice: &str, value: &T) {
        if let Err(err) = self.try_save(slice, value) {
            error!(slice, error = %err, "write-through failed; keeping in-memory value");
        }
    }

    pub fn try_save<T: Serialize + ?Sized>(&self, slice: &str, value: &T) -> Result<()> {
        let key = self.key(slice);
        let raw = serde_json::to_string(value)?;
        self.medium
            .write(&key, &raw)
            .map_err(|err| DashboardError::StorageWrite {
                key: key.clone(),
                reason: format!("{err:#}"),
            })?;
        debug!(key = %key, bytes = raw.len(), "saved slice");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn file_medium_round_trips_slices() {
        let temp = tempdir().expect("tempdir");
        let medium = FileMedium::open(temp.path()).expect("open medium");
        let binding = KvBinding::new(Arc::new(medium), DEFAULT_NAMESPACE);

        binding
            .try_save("notes", "gm ser")
            .expect("save notes");
        let notes: String = binding.load("notes", String::new());
        assert_eq!(notes, "gm ser");
        assert!(temp.path().join("crypto-missions%3Anotes.json").exists());
    }

    #[test]
    fn namespaces_with_punctuation_keep_separate_files() {
        let temp = tempdir().expect("tempdir");
        let medium = FileMedium::open(temp.path()).expect("open medium");
        assert_ne!(medium.path_for("a/b:notes"), medium.path_for("a.b:notes"));
        assert_eq!(medium.path_for("a/b:notes").parent(), Some(temp.path()));

        let slashed = KvBinding::new(Arc::new(medium), "a/b");
        slashed.try_save("notes", "slashed").expect("save");
        let dotted = KvBinding::new(
            Arc::new(FileMedium::open(temp.path()).expect("reopen")),
            "a.b",
        );
        assert_eq!(dotted.load("notes", String::new()), "");
    }

    #[test]
    fn missing_slice_yields_default() {
        let binding = KvBinding::new(Arc::new(MemoryMedium::new()), "t");
        let todos: Vec<String> = binding.load("todos", vec!["fallback".to_string()]);
        assert_eq!(todos, vec!["fallback".to_string()]);
    }

    #[test]
    fn corrupt_slice_yields_default() {
        let medium = Arc::new(MemoryMedium::new());
        medium.insert_raw("t:todos", "{not json");
        let binding = KvBinding::new(medium, "t");

        assert!(matches!(
            binding.try_load::<Vec<String>>("todos"),
            Err(DashboardError::StorageDecode { .. })
        ));
        let todos: Vec<String> = binding.load("todos", Vec::new());
        assert!(todos.is_empty());
    }

    #[test]
    fn quota_rejection_is_reported_by_try_save_only() {
        let medium = Arc::new(MemoryMedium::with_capacity(16));
        let binding = KvBinding::new(medium.clone(), "t");

        let err = binding
            .try_save("notes", "a note far longer than sixteen bytes")
            .expect_err("quota exceeded");
        assert!(matches!(err, DashboardError::StorageWrite { .. }));

        binding.save("notes", "another long note that will not fit");
        assert_eq!(medium.raw("t:notes"), None);
    }
}
