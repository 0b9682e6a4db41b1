//! Filesystem-backed history store
//!
//! Directory layout:
//! ```text
//! root/
//!   history.json   records, newest first
//!   stats.json     usage counters
//!   tasks.json     pending analyses
//!   user_id        generated once, then reused
//! ```

use super::{
    HistoryRecord, HistoryStore, NewRecord, PendingTask, RecordKind, RecordUpdate, UsageStats,
};
use crate::providers::{ProviderError, ProviderResult};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const HISTORY_FILE: &str = "history.json";
const STATS_FILE: &str = "stats.json";
const TASKS_FILE: &str = "tasks.json";
const USER_ID_FILE: &str = "user_id";

/// Random suffix length of generated ids
const ID_SUFFIX_LEN: usize = 9;

/// History store keeping JSON documents under one directory.
///
/// The directory is created lazily on first write. Every operation holds
/// one async lock, so concurrent callers never interleave reads and writes.
pub struct FileHistoryStore {
    root: PathBuf,
    /// Serializes access; holds the user id once loaded
    state: Mutex<Option<String>>,
}

impl FileHistoryStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            state: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Owner id stamped on new records
    pub async fn user_id(&self) -> ProviderResult<String> {
        let mut cached = self.state.lock().await;
        self.resolve_user_id(&mut cached).await
    }

    async fn resolve_user_id(&self, cached: &mut Option<String>) -> ProviderResult<String> {
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let path = self.root.join(USER_ID_FILE);
        let id = match tokio::fs::read_to_string(&path).await {
            Ok(existing) if !existing.trim().is_empty() => existing.trim().to_string(),
            Ok(_) => self.create_user_id(&path).await?,
            Err(e) if e.kind() == ErrorKind::NotFound => self.create_user_id(&path).await?,
            Err(e) => return Err(storage_error("read user id", &path, e)),
        };
        *cached = Some(id.clone());
        Ok(id)
    }

    async fn create_user_id(&self, path: &Path) -> ProviderResult<String> {
        let id = generate_id("user");
        self.ensure_root().await?;
        tokio::fs::write(path, &id)
            .await
            .map_err(|e| storage_error("write user id", path, e))?;
        info!("Created user id {}", id);
        Ok(id)
    }

    async fn ensure_root(&self) -> ProviderResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| storage_error("create", &self.root, e))
    }

    async fn read_doc<T: DeserializeOwned + Default>(&self, name: &str) -> ProviderResult<T> {
        let path = self.root.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(T::default()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                ProviderError::Storage(format!("Corrupt document {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(storage_error("read", &path, e)),
        }
    }

    async fn write_doc<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> ProviderResult<()> {
        self.ensure_root().await?;
        let path = self.root.join(name);
        let tmp = self.root.join(format!("{}.tmp", name));
        let contents = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| storage_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage_error("replace", &path, e))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn records(&self) -> ProviderResult<Vec<HistoryRecord>> {
        self.read_doc(HISTORY_FILE).await
    }

    async fn tasks(&self) -> ProviderResult<Vec<PendingTask>> {
        self.read_doc(TASKS_FILE).await
    }
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> ProviderError {
    ProviderError::Storage(format!("Failed to {} {}: {}", action, path.display(), e))
}

/// `<prefix>_<millis>_<9 random base36 chars>`
pub fn generate_id(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| std::char::from_digit(rng.gen_range(0..36), 36).unwrap_or('0'))
        .collect();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), suffix)
}

fn take_limit<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn save(&self, record: NewRecord) -> ProviderResult<HistoryRecord> {
        let mut cached = self.state.lock().await;
        let user_id = self.resolve_user_id(&mut cached).await?;

        let now = Utc::now();
        let saved = HistoryRecord {
            id: generate_id("hist"),
            user_id,
            kind: record.kind,
            image_path: record.image_path,
            image_metadata: record.image_metadata,
            prompt: record.prompt,
            result: record.result,
            metadata: record.metadata,
            created_at: now,
        };

        let mut records = self.records().await?;
        records.insert(0, saved.clone());
        self.write_doc(HISTORY_FILE, &records).await?;

        // Stats are secondary: a failure here does not undo the save
        let stats_update = async {
            let mut stats: UsageStats = self.read_doc(STATS_FILE).await?;
            stats.record(saved.kind, now.date_naive());
            self.write_doc(STATS_FILE, &stats).await
        };
        if let Err(e) = stats_update.await {
            warn!("Failed to update usage stats: {}", e);
        }

        info!("Saved {} record {}", saved.kind, saved.id);
        Ok(saved)
    }

    async fn list(&self, limit: Option<usize>) -> ProviderResult<Vec<HistoryRecord>> {
        let _guard = self.state.lock().await;
        Ok(take_limit(self.records().await?, limit))
    }

    async fn list_by_kind(
        &self,
        kind: RecordKind,
        limit: Option<usize>,
    ) -> ProviderResult<Vec<HistoryRecord>> {
        let _guard = self.state.lock().await;
        let records = self
            .records()
            .await?
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect();
        Ok(take_limit(records, limit))
    }

    async fn get(&self, id: &str) -> ProviderResult<Option<HistoryRecord>> {
        let _guard = self.state.lock().await;
        Ok(self.records().await?.into_iter().find(|r| r.id == id))
    }

    async fn update(&self, id: &str, update: RecordUpdate) -> ProviderResult<HistoryRecord> {
        let _guard = self.state.lock().await;
        let mut records = self.records().await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ProviderError::Storage(format!("Record {} not found", id)))?;
        update.apply(record);
        let updated = record.clone();
        self.write_doc(HISTORY_FILE, &records).await?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> ProviderResult<bool> {
        let _guard = self.state.lock().await;
        let mut records = self.records().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_doc(HISTORY_FILE, &records).await?;
        debug!("Deleted record {}", id);
        Ok(true)
    }

    async fn clear(&self) -> ProviderResult<()> {
        let _guard = self.state.lock().await;
        let path = self.root.join(HISTORY_FILE);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &path, e)),
        }
    }

    async fn stats(&self) -> ProviderResult<UsageStats> {
        let _guard = self.state.lock().await;
        self.read_doc(STATS_FILE).await
    }

    async fn export(&self) -> ProviderResult<String> {
        let _guard = self.state.lock().await;
        Ok(serde_json::to_string_pretty(&self.records().await?)?)
    }

    async fn import(&self, json: &str) -> ProviderResult<usize> {
        let records: Vec<HistoryRecord> = serde_json::from_str(json)?;
        let _guard = self.state.lock().await;
        self.write_doc(HISTORY_FILE, &records).await?;
        info!("Imported {} records", records.len());
        Ok(records.len())
    }

    async fn save_task(&self, task: &PendingTask) -> ProviderResult<()> {
        let _guard = self.state.lock().await;
        let mut tasks = self.tasks().await?;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task.clone(),
            None => tasks.push(task.clone()),
        }
        self.write_doc(TASKS_FILE, &tasks).await
    }

    async fn load_task(&self, id: &str) -> ProviderResult<Option<PendingTask>> {
        let _guard = self.state.lock().await;
        Ok(self.tasks().await?.into_iter().find(|t| t.id == id))
    }

    async fn remove_task(&self, id: &str) -> ProviderResult<()> {
        let _guard = self.state.lock().await;
        let mut tasks = self.tasks().await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() != before {
            self.write_doc(TASKS_FILE, &tasks).await?;
        }
        Ok(())
    }

    async fn list_tasks(&self) -> ProviderResult<Vec<PendingTask>> {
        let _guard = self.state.lock().await;
        self.tasks().await
    }
}
