//! Persistence seam for analysis runs.
//!
//! The pipeline only ever appends: version creation, bulk topic and
//! classification inserts, and single-row status/result updates keyed by the
//! run's own version id. [`MemoryStore`] backs the tests and demos; a
//! database-backed implementation plugs in behind the same trait.

use crate::error::StoreError;
use crate::model::{
    AnalysisVersion, Classification, IntermediateResults, ItemContent, Representative, RunStatus,
    SourceReport, Topic,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Topic payload for bulk insertion, before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub name: String,
    pub narrative: String,
    pub representatives: Vec<Representative>,
    pub sort_order: u32,
}

/// Durable storage for analysis runs and read access to source material.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Create a new version record in `pending`, allocating the next
    /// per-item version number.
    async fn create_version(&self, item_id: i64) -> Result<AnalysisVersion, StoreError>;

    /// Update a version's status, optionally recording an error message.
    /// Rejects updates to versions that already reached a terminal status.
    async fn update_version_status(
        &self,
        version_id: i64,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Write the summary narrative and intermediate snapshot onto a version.
    async fn update_version_result(
        &self,
        version_id: i64,
        summary: &str,
        intermediate: &IntermediateResults,
    ) -> Result<(), StoreError>;

    /// Bulk-insert topics, returning them with assigned ids.
    async fn create_topics(
        &self,
        version_id: i64,
        topics: Vec<NewTopic>,
    ) -> Result<Vec<Topic>, StoreError>;

    /// Bulk-insert classification edges.
    async fn create_classifications(
        &self,
        version_id: i64,
        rows: Vec<Classification>,
    ) -> Result<(), StoreError>;

    /// Fetch the legislative item under analysis.
    async fn fetch_item(&self, item_id: i64) -> Result<ItemContent, StoreError>;

    /// Fetch completed source reports with their opinions for an item.
    async fn fetch_completed_reports(&self, item_id: i64)
    -> Result<Vec<SourceReport>, StoreError>;

    /// List all runs for an item, ordered by version number.
    async fn list_versions(&self, item_id: i64) -> Result<Vec<AnalysisVersion>, StoreError>;

    /// Fetch the persisted topics of a run, ordered by sort order.
    async fn fetch_topics(&self, version_id: i64) -> Result<Vec<Topic>, StoreError>;
}

#[derive(Default)]
struct Inner {
    items: HashMap<i64, ItemContent>,
    reports: HashMap<i64, Vec<SourceReport>>,
    versions: Vec<AnalysisVersion>,
    topics: Vec<Topic>,
    classifications: Vec<Classification>,
    next_version_id: i64,
    next_topic_id: i64,
}

/// In-memory store implementation.
///
/// Cloning is cheap (Arc-based); clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a legislative item.
    pub fn insert_item(&self, item: ItemContent) {
        self.inner.lock().unwrap().items.insert(item.id, item);
    }

    /// Seed a completed source report for an item.
    pub fn insert_report(&self, item_id: i64, report: SourceReport) {
        self.inner
            .lock()
            .unwrap()
            .reports
            .entry(item_id)
            .or_default()
            .push(report);
    }

    /// All classification rows for a version, in insertion order.
    pub fn classifications(&self, version_id: i64) -> Vec<Classification> {
        self.inner
            .lock()
            .unwrap()
            .classifications
            .iter()
            .filter(|c| c.version_id == version_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn create_version(&self, item_id: i64) -> Result<AnalysisVersion, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let number = inner
            .versions
            .iter()
            .filter(|v| v.item_id == item_id)
            .map(|v| v.number)
            .max()
            .unwrap_or(0)
            + 1;
        inner.next_version_id += 1;
        let version = AnalysisVersion {
            id: inner.next_version_id,
            item_id,
            number,
            status: RunStatus::Pending,
            error_message: None,
            summary: None,
            intermediate: None,
            created_at: Utc::now(),
        };
        inner.versions.push(version.clone());
        Ok(version)
    }

    async fn update_version_status(
        &self,
        version_id: i64,
        status: RunStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let version = inner
            .versions
            .iter_mut()
            .find(|v| v.id == version_id)
            .ok_or(StoreError::VersionNotFound(version_id))?;
        if version.status.is_terminal() {
            return Err(StoreError::VersionTerminal(version_id));
        }
        version.status = status;
        version.error_message = error_message.map(str::to_string);
        Ok(())
    }

    async fn update_version_result(
        &self,
        version_id: i64,
        summary: &str,
        intermediate: &IntermediateResults,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let version = inner
            .versions
            .iter_mut()
            .find(|v| v.id == version_id)
            .ok_or(StoreError::VersionNotFound(version_id))?;
        if version.status.is_terminal() {
            return Err(StoreError::VersionTerminal(version_id));
        }
        version.summary = Some(summary.to_string());
        version.intermediate = Some(intermediate.clone());
        Ok(())
    }

    async fn create_topics(
        &self,
        version_id: i64,
        topics: Vec<NewTopic>,
    ) -> Result<Vec<Topic>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut persisted = Vec::with_capacity(topics.len());
        for topic in topics {
            inner.next_topic_id += 1;
            let record = Topic {
                id: inner.next_topic_id,
                version_id,
                name: topic.name,
                narrative: topic.narrative,
                representatives: topic.representatives,
                sort_order: topic.sort_order,
            };
            inner.topics.push(record.clone());
            persisted.push(record);
        }
        Ok(persisted)
    }

    async fn create_classifications(
        &self,
        _version_id: i64,
        rows: Vec<Classification>,
    ) -> Result<(), StoreError> {
        self.inner.lock().unwrap().classifications.extend(rows);
        Ok(())
    }

    async fn fetch_item(&self, item_id: i64) -> Result<ItemContent, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .items
            .get(&item_id)
            .cloned()
            .ok_or(StoreError::ItemNotFound(item_id))
    }

    async fn fetch_completed_reports(
        &self,
        item_id: i64,
    ) -> Result<Vec<SourceReport>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .reports
            .get(&item_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_versions(&self, item_id: i64) -> Result<Vec<AnalysisVersion>, StoreError> {
        let mut versions: Vec<AnalysisVersion> = self
            .inner
            .lock()
            .unwrap()
            .versions
            .iter()
            .filter(|v| v.item_id == item_id)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.number);
        Ok(versions)
    }

    async fn fetch_topics(&self, version_id: i64) -> Result<Vec<Topic>, StoreError> {
        let mut topics: Vec<Topic> = self
            .inner
            .lock()
            .unwrap()
            .topics
            .iter()
            .filter(|t| t.version_id == version_id)
            .cloned()
            .collect();
        topics.sort_by_key(|t| t.sort_order);
        Ok(topics)
    }
}
