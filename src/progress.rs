use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context as _;
use chrono::Utc;

use crate::formats::{
    PROGRESS_SCHEMA_VERSION, PROGRESS_STORAGE_KEY, ProgressData, ProgressPatch, StoredProgress,
};

/// Key/value persistence for the serialized progress record.
pub trait ProgressBackend: Send + Sync + std::fmt::Debug {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// Stores each key as `<key>.json` under a data directory.
#[derive(Debug, Clone)]
pub struct LocalFsBackend {
    base_dir: PathBuf,
}

impl LocalFsBackend {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

impl ProgressBackend for LocalFsBackend {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.key_path(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read: {}", path.display())),
        }
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        write_atomic(&self.key_path(key), value.as_bytes())
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    std::fs::write(&tmp_path, data)
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

/// In-process backend, mainly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let backend = Self::new();
        backend.lock().insert(key.to_owned(), value.to_owned());
        backend
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ProgressBackend for MemoryBackend {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Reading progress, persisted through a [`ProgressBackend`].
///
/// The in-memory record mirrors the last value written; when the backend
/// fails, it still reflects the attempted update so the running session
/// behaves as if persistence succeeded.
#[derive(Debug)]
pub struct ProgressStore {
    backend: Box<dyn ProgressBackend>,
    current: Mutex<Option<ProgressData>>,
}

impl ProgressStore {
    pub fn new(backend: impl ProgressBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            current: Mutex::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub fn local(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(LocalFsBackend::new(base_dir))
    }

    /// The persisted record, or the empty default when it is missing or unreadable.
    pub fn load(&self) -> ProgressData {
        let data = self
            .read_persisted()
            .or_else(|| self.cached())
            .unwrap_or_default();
        *self.lock() = Some(data.clone());
        data
    }

    /// Merges `patch` onto the chapter's record, marks it visited and makes it
    /// the last active chapter. Persists and returns the whole record.
    pub fn update(&self, chapter_id: &str, patch: &ProgressPatch) -> ProgressData {
        let mut data = self
            .read_persisted()
            .or_else(|| self.cached())
            .unwrap_or_default();

        let existing = data.chapters.get(chapter_id).cloned().unwrap_or_default();
        let merged = patch.apply(&existing, Utc::now().timestamp_millis());
        data.chapters.insert(chapter_id.to_owned(), merged);
        data.last_chapter = chapter_id.to_owned();

        tracing::debug!(chapter_id, ?patch, "progress update");
        self.persist(&data);
        data
    }

    /// Drops every chapter's progress and points back at the first chapter.
    pub fn reset(&self) -> ProgressData {
        let data = ProgressData::default();
        tracing::info!("progress reset");
        self.persist(&data);
        data
    }

    fn persist(&self, data: &ProgressData) {
        *self.lock() = Some(data.clone());

        let stored = StoredProgress {
            version: PROGRESS_SCHEMA_VERSION,
            data: data.clone(),
        };
        let result = serde_json::to_string(&stored)
            .context("serialize progress")
            .and_then(|json| self.backend.write(PROGRESS_STORAGE_KEY, &json));
        if let Err(err) = result {
            tracing::warn!(err = format!("{err:#}"), "progress not persisted");
        }
    }

    fn read_persisted(&self) -> Option<ProgressData> {
        let raw = match self.backend.read(PROGRESS_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(err = format!("{err:#}"), "progress storage unavailable");
                return None;
            }
        };

        match serde_json::from_str::<StoredProgress>(&raw) {
            Ok(stored) if stored.version == PROGRESS_SCHEMA_VERSION => Some(stored.data),
            Ok(stored) => {
                tracing::warn!(
                    version = stored.version,
                    expected = PROGRESS_SCHEMA_VERSION,
                    "discarding progress with unknown schema version"
                );
                Some(ProgressData::default())
            }
            Err(err) => {
                tracing::warn!(%err, "discarding malformed progress");
                Some(ProgressData::default())
            }
        }
    }

    fn cached(&self) -> Option<ProgressData> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ProgressData>> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BrokenBackend;

    impl ProgressBackend for BrokenBackend {
        fn read(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("storage disabled")
        }

        fn write(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("storage disabled")
        }
    }

    #[test]
    fn load_without_record_is_empty_default() {
        let store = ProgressStore::in_memory();
        let data = store.load();
        assert_eq!(data.last_chapter, "0");
        assert!(data.chapters.is_empty());
    }

    #[test]
    fn malformed_record_degrades_to_default() {
        let store = ProgressStore::new(MemoryBackend::with_entry(
            PROGRESS_STORAGE_KEY,
            "{not json",
        ));
        assert_eq!(store.load(), ProgressData::default());
    }

    #[test]
    fn unknown_version_is_discarded() {
        let store = ProgressStore::new(MemoryBackend::with_entry(
            PROGRESS_STORAGE_KEY,
            r#"{"version":99,"lastChapter":"4","chapters":{}}"#,
        ));
        assert_eq!(store.load().last_chapter, "0");
    }

    #[test]
    fn completion_is_monotonic_across_partial_updates() {
        let store = ProgressStore::in_memory();
        store.update("1", &ProgressPatch::completed());
        store.update("1", &ProgressPatch::section(0));
        let data = store.update(
            "1",
            &ProgressPatch {
                scroll_ratio: Some(0.1),
                ..ProgressPatch::default()
            },
        );

        assert!(data.chapters["1"].completed);
        assert!(store.load().chapters["1"].completed);
    }

    #[test]
    fn update_sets_last_chapter_and_visited() {
        let store = ProgressStore::in_memory();
        let data = store.update("3", &ProgressPatch::section(1));
        assert_eq!(data.last_chapter, "3");
        let chapter = &data.chapters["3"];
        assert!(chapter.visited);
        assert!(!chapter.completed);
        assert_eq!(chapter.current_section_index, Some(1));
        assert!(chapter.updated_at > 0);
    }

    #[test]
    fn load_round_trips_last_merged_values() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let store = ProgressStore::local(temp.path());
        store.update("0", &ProgressPatch::section(2));
        store.update(
            "0",
            &ProgressPatch {
                scroll_ratio: Some(0.5),
                ..ProgressPatch::default()
            },
        );
        store.update("2", &ProgressPatch::section(1).with_anchor("2-1-배열"));

        let reloaded = ProgressStore::local(temp.path()).load();
        assert_eq!(reloaded.last_chapter, "2");
        assert_eq!(reloaded.chapters["0"].current_section_index, Some(2));
        assert_eq!(reloaded.chapters["0"].scroll_ratio, 0.5);
        assert_eq!(reloaded.chapters["2"].last_anchor.as_deref(), Some("2-1-배열"));

        let path = temp.path().join(format!("{PROGRESS_STORAGE_KEY}.json"));
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn reset_clears_everything() {
        let store = ProgressStore::in_memory();
        store.update("5", &ProgressPatch::completed());
        let data = store.reset();
        assert_eq!(data, ProgressData::default());
        assert_eq!(store.load(), ProgressData::default());
    }

    #[test]
    fn broken_storage_keeps_session_state() {
        let store = ProgressStore::new(BrokenBackend);
        store.update("1", &ProgressPatch::section(3));
        let data = store.update("1", &ProgressPatch::completed());

        assert_eq!(data.chapters["1"].current_section_index, Some(3));
        assert!(data.chapters["1"].completed);
        assert_eq!(store.load().last_chapter, "1");
    }
}
