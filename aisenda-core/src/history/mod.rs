//! Local history of assistant results and usage statistics
//!
//! `HistoryStore` is the collaborator the assistant services write to.
//! `FileHistoryStore` keeps everything as JSON documents in one directory.

mod file;

pub use file::{generate_id, FileHistoryStore};

use crate::providers::ProviderResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Most recent active days kept in the stats
const ACTIVE_DAYS_KEPT: usize = 7;

/// Which assistant feature produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Facial,
    Content,
    Video,
    Qa,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Facial,
        RecordKind::Content,
        RecordKind::Video,
        RecordKind::Qa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Facial => "facial",
            RecordKind::Content => "content",
            RecordKind::Video => "video",
            RecordKind::Qa => "qa",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown record kind '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub mime_type: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub filename: String,
}

/// Model details stored alongside a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replayed_at: Option<DateTime<Utc>>,
}

/// One saved assistant result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// `hist_<millis>_<9 base36 chars>`
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_metadata: Option<ImageMetadata>,
    pub prompt: String,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RecordMetadata>,
    pub created_at: DateTime<Utc>,
}

/// A record before the store assigns its id, owner and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub kind: RecordKind,
    pub prompt: String,
    pub result: String,
    pub image_path: Option<String>,
    pub image_metadata: Option<ImageMetadata>,
    pub metadata: Option<RecordMetadata>,
}

impl NewRecord {
    pub fn new(kind: RecordKind, prompt: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            result: result.into(),
            image_path: None,
            image_metadata: None,
            metadata: None,
        }
    }

    pub fn with_image(mut self, path: impl Into<String>, metadata: Option<ImageMetadata>) -> Self {
        self.image_path = Some(path.into());
        self.image_metadata = metadata;
        self
    }

    pub fn with_metadata(mut self, metadata: RecordMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Fields to replace on an existing record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub result: Option<String>,
    pub metadata: Option<RecordMetadata>,
}

impl RecordUpdate {
    pub(crate) fn apply(self, record: &mut HistoryRecord) {
        if let Some(result) = self.result {
            record.result = result;
        }
        if let Some(metadata) = self.metadata {
            record.metadata = Some(metadata);
        }
    }
}

/// Running usage counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageStats {
    pub total_analyses: u64,
    pub total_content_generated: u64,
    pub total_videos_created: u64,
    pub total_qa_responses: u64,
    /// Days with activity, `YYYY-MM-DD`, oldest first
    pub weekly_active_days: Vec<String>,
    pub favorite_features: BTreeMap<String, u64>,
    pub average_session_time: f64,
    pub conversion_rate: Option<f64>,
}

impl UsageStats {
    /// Count one saved record of `kind` on `day`
    pub fn record(&mut self, kind: RecordKind, day: NaiveDate) {
        match kind {
            RecordKind::Facial => self.total_analyses += 1,
            RecordKind::Content => self.total_content_generated += 1,
            RecordKind::Video => self.total_videos_created += 1,
            RecordKind::Qa => self.total_qa_responses += 1,
        }

        let day = day.format("%Y-%m-%d").to_string();
        if !self.weekly_active_days.contains(&day) {
            self.weekly_active_days.push(day);
            if self.weekly_active_days.len() > ACTIVE_DAYS_KEPT {
                let excess = self.weekly_active_days.len() - ACTIVE_DAYS_KEPT;
                self.weekly_active_days.drain(..excess);
            }
        }

        *self
            .favorite_features
            .entry(kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    pub fn total_for(&self, kind: RecordKind) -> u64 {
        match kind {
            RecordKind::Facial => self.total_analyses,
            RecordKind::Content => self.total_content_generated,
            RecordKind::Video => self.total_videos_created,
            RecordKind::Qa => self.total_qa_responses,
        }
    }
}

/// Records per day for the seven days ending on `today`, oldest first
pub fn weekly_activity(records: &[HistoryRecord], today: NaiveDate) -> Vec<(NaiveDate, usize)> {
    (0..7)
        .rev()
        .map(|back| {
            let day = today - Duration::days(back);
            let count = records
                .iter()
                .filter(|r| r.created_at.date_naive() == day)
                .count();
            (day, count)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Analyze,
}

/// An analysis that was in flight, with the text received so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTask {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub prompt: String,
    /// Image data URLs sent with the prompt
    #[serde(default)]
    pub image_contents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,
    #[serde(default)]
    pub partial_response: String,
    pub timestamp: DateTime<Utc>,
}

impl PendingTask {
    pub fn analyze(
        id: impl Into<String>,
        prompt: impl Into<String>,
        image_contents: Vec<String>,
        requirement: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: TaskKind::Analyze,
            prompt: prompt.into(),
            image_contents,
            requirement,
            partial_response: String::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Storage for history records, usage stats and pending tasks
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Save a record as the newest entry and update the stats
    async fn save(&self, record: NewRecord) -> ProviderResult<HistoryRecord>;

    /// Records, newest first
    async fn list(&self, limit: Option<usize>) -> ProviderResult<Vec<HistoryRecord>>;

    async fn list_by_kind(
        &self,
        kind: RecordKind,
        limit: Option<usize>,
    ) -> ProviderResult<Vec<HistoryRecord>>;

    async fn get(&self, id: &str) -> ProviderResult<Option<HistoryRecord>>;

    async fn update(&self, id: &str, update: RecordUpdate) -> ProviderResult<HistoryRecord>;

    /// Remove a record; returns whether it existed
    async fn delete(&self, id: &str) -> ProviderResult<bool>;

    /// Remove every record. Stats are kept.
    async fn clear(&self) -> ProviderResult<()>;

    async fn stats(&self) -> ProviderResult<UsageStats>;

    /// All records as pretty-printed JSON
    async fn export(&self) -> ProviderResult<String>;

    /// Replace all records with a previously exported document
    async fn import(&self, json: &str) -> ProviderResult<usize>;

    async fn save_task(&self, task: &PendingTask) -> ProviderResult<()>;

    async fn load_task(&self, id: &str) -> ProviderResult<Option<PendingTask>>;

    async fn remove_task(&self, id: &str) -> ProviderResult<()>;

    async fn list_tasks(&self) -> ProviderResult<Vec<PendingTask>>;
}
