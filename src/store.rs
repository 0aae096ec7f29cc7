//! Known-item store.
//!
//! One JSON document per monitor, shaped `{ "<id>": { ...tracked item } }`.
//! The document is read once at the start of a run and rewritten in full
//! at the end; nothing is persisted incrementally.
//!
//! Reading is lossy but always available: a missing or unparseable document
//! is an empty history. Writing is not: a failed save is returned to the
//! caller.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::models::TrackedItem;

#[derive(Debug, Clone)]
pub struct KnownItemStore {
    path: PathBuf,
    items: HashMap<String, TrackedItem>,
}

impl KnownItemStore {
    /// An empty store that will be written to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            items: HashMap::new(),
        }
    }

    /// Load the document at `path`. Never fails.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, TrackedItem>>(&content) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "store document is unreadable; starting with empty history"
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "could not read store document; starting with empty history"
                );
                HashMap::new()
            }
        };
        Self { path, items }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&TrackedItem> {
        self.items.get(id)
    }

    /// Insert or replace the record for `item.id`. Fields are not merged.
    pub fn upsert(&mut self, item: TrackedItem) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items ordered by id.
    pub fn items(&self) -> Vec<&TrackedItem> {
        let mut items: Vec<&TrackedItem> = self.items.values().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }

    pub fn newest_first_seen(&self) -> Option<DateTime<Utc>> {
        self.items.values().map(|i| i.first_seen).max()
    }

    /// Drop items first seen before `cutoff`. Returns how many were removed.
    ///
    /// Only called from the explicit prune command.
    pub fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.items.len();
        self.items.retain(|_, item| item.first_seen >= cutoff);
        before - self.items.len()
    }

    /// Serialize the whole mapping and atomically replace the document.
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;

        // Sorted keys keep the document diffable.
        let ordered: BTreeMap<&str, &TrackedItem> =
            self.items.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let json = serde_json::to_string_pretty(&ordered)?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write store: {}", self.path.display()))?;
        Ok(())
    }
}

/// Exclusive advisory lock guarding one store document for a whole run.
///
/// The lock lives in a sibling `<store>.lock` file and is released on drop.
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    pub fn lock_path(store_path: &Path) -> PathBuf {
        let mut name = store_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        store_path.with_file_name(name)
    }

    /// Take the lock without waiting. Fails if another run holds it.
    pub fn acquire(store_path: &Path) -> Result<Self> {
        let path = Self::lock_path(store_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            anyhow::bail!(
                "another run holds the store lock {}; refusing to run concurrently",
                path.display()
            );
        }

        file.set_len(0)?;
        writeln!(
            file,
            "pid={}\nacquired_at={}",
            std::process::id(),
            Utc::now().to_rfc3339()
        )?;
        file.flush()?;

        Ok(Self { file, path })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release store lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn item(id: &str, venue: &str) -> TrackedItem {
        TrackedItem {
            id: id.to_string(),
            attributes: BTreeMap::from([("venue".to_string(), venue.to_string())]),
            first_seen: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn missing_document_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let store = KnownItemStore::load(tmp.path().join("nope.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_document_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, "{ this is not json").unwrap();
        assert!(KnownItemStore::load(&path).is_empty());

        std::fs::write(&path, r#"["a list", "not a map"]"#).unwrap();
        assert!(KnownItemStore::load(&path).is_empty());
    }

    #[test]
    fn save_then_load_preserves_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/store.json");
        let mut store = KnownItemStore::empty(&path);
        store.upsert(item("a", "PNC Arena"));
        store.upsert(item("b", "Red Hat Amphitheater"));
        store.save().unwrap();

        let loaded = KnownItemStore::load(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("a"), store.get("a"));
        assert_eq!(loaded.get("b"), store.get("b"));
    }

    #[test]
    fn resave_is_logically_a_noop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let mut store = KnownItemStore::empty(&path);
        store.upsert(item("x", "Dorton Arena"));
        store.save().unwrap();
        let first: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        KnownItemStore::load(&path).save().unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn upsert_overwrites_without_merging() {
        let mut store = KnownItemStore::empty("unused.json");
        let mut first = item("a", "Old Venue");
        first.attributes.insert("city".into(), "Durham".into());
        store.upsert(first);
        store.upsert(item("a", "New Venue"));
        let stored = store.get("a").unwrap();
        assert_eq!(stored.attr("venue"), Some("New Venue"));
        assert_eq!(stored.attr("city"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn save_into_unwritable_location_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let store = KnownItemStore::empty(blocker.join("store.json"));
        assert!(store.save().is_err());
    }

    #[test]
    fn prune_removes_only_old_items() {
        let mut store = KnownItemStore::empty("unused.json");
        store.upsert(item("old", "A"));
        let mut fresh = item("fresh", "B");
        fresh.first_seen = fresh.first_seen + Duration::days(60);
        store.upsert(fresh);

        let cutoff = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(store.prune_older_than(cutoff), 1);
        assert!(store.contains("fresh"));
        assert!(!store.contains("old"));
    }

    #[test]
    fn second_lock_is_refused_until_first_drops() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let first = StoreLock::acquire(&path).unwrap();
        assert!(tmp.path().join("store.json.lock").exists());
        assert!(StoreLock::acquire(&path).is_err());
        drop(first);
        assert!(StoreLock::acquire(&path).is_ok());
    }
}
