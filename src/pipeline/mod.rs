//! The five-stage analysis pipeline.
//!
//! The orchestrator owns all cross-stage state for a run: the flattened
//! opinion list, the topic-to-opinions map built from classification, and
//! the topic-name-to-id map after persistence. Data flows strictly forward;
//! a failure in any stage fails the whole run, and nothing is persisted
//! until stage 5 has succeeded.

mod classify;
mod events;
mod extract;
mod grounding;
mod merge;
mod prompt;
mod report;
mod summary;

pub use events::{EventCallback, PipelineCallbacks, PipelineEvent, Stage, verbose_callbacks};
pub use grounding::{filter_representatives, ground_narrative};

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::generation::GenerationClient;
use crate::model::{
    AnalysisVersion, Classification, ClassificationIntent, FlatOpinion, IntermediateResults,
    MergedTopic, RunStatus, flatten_reports,
};
use crate::store::{AnalysisStore, NewTopic};
use report::TopicReport;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Orchestrates analysis runs for legislative items.
pub struct Analyzer {
    client: Arc<dyn GenerationClient>,
    store: Arc<dyn AnalysisStore>,
    config: AnalysisConfig,
    callbacks: PipelineCallbacks,
}

impl Analyzer {
    /// Create a new analyzer over a generation client and a store.
    pub fn new(
        client: Arc<dyn GenerationClient>,
        store: Arc<dyn AnalysisStore>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
            callbacks: PipelineCallbacks::default(),
        }
    }

    /// Enable verbose progress logging to stderr.
    pub fn verbose(mut self, enabled: bool) -> Self {
        if enabled {
            self.callbacks = verbose_callbacks();
        }
        self
    }

    /// Replace the callback set.
    pub fn with_callbacks(mut self, callbacks: PipelineCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Set a catch-all callback for any event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_event = Some(Arc::new(f));
        self
    }

    /// Execute a full analysis run for an item and wait for its outcome.
    ///
    /// Creates the version record, drives all five stages, and returns the
    /// completed version. On failure the error is recorded on the version
    /// record before being returned.
    pub async fn run(&self, item_id: i64) -> Result<AnalysisVersion> {
        let version = self.store.create_version(item_id).await?;
        self.drive(version, item_id).await
    }

    /// Start a detached analysis run (the administrative trigger surface).
    ///
    /// Returns the freshly created `pending` version immediately; the run
    /// continues on the runtime, and callers observe the outcome only by
    /// polling the version's status through the store.
    pub async fn spawn(self: &Arc<Self>, item_id: i64) -> Result<AnalysisVersion> {
        let version = self.store.create_version(item_id).await?;
        let snapshot = version.clone();
        let analyzer = Arc::clone(self);
        tokio::spawn(async move {
            // Outcome is recorded on the version record; nothing to return.
            let _ = analyzer.drive(version, item_id).await;
        });
        Ok(snapshot)
    }

    /// Run the state machine around `execute`, recording the terminal status.
    async fn drive(&self, version: AnalysisVersion, item_id: i64) -> Result<AnalysisVersion> {
        tracing::info!(
            item_id,
            version_id = version.id,
            number = version.number,
            "analysis run started"
        );
        self.callbacks.emit(&PipelineEvent::RunStarted {
            version_id: version.id,
            item_id,
            number: version.number,
        });

        let outcome = async {
            self.store
                .update_version_status(version.id, RunStatus::Running, None)
                .await?;
            self.execute(&version, item_id).await
        }
        .await;

        match outcome {
            Ok((completed, topics)) => {
                tracing::info!(item_id, version_id = version.id, topics, "analysis run completed");
                self.callbacks.emit(&PipelineEvent::RunCompleted {
                    version_id: version.id,
                    topics,
                });
                Ok(completed)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::error!(
                    item_id,
                    version_id = version.id,
                    error = %message,
                    "analysis run failed"
                );
                self.callbacks.emit(&PipelineEvent::RunFailed {
                    version_id: version.id,
                    message: message.clone(),
                });
                if let Err(update_err) = self
                    .store
                    .update_version_status(version.id, RunStatus::Failed, Some(&message))
                    .await
                {
                    tracing::error!(
                        version_id = version.id,
                        error = %update_err,
                        "failed to record run failure"
                    );
                }
                Err(err)
            }
        }
    }

    /// Stages 1-5 plus persistence. Returns the completed version and the
    /// number of persisted topics.
    async fn execute(
        &self,
        version: &AnalysisVersion,
        item_id: i64,
    ) -> Result<(AnalysisVersion, usize)> {
        let client = self.client.as_ref();
        let item = self.store.fetch_item(item_id).await?;
        let reports = self.store.fetch_completed_reports(item_id).await?;
        let opinions = flatten_reports(&reports);
        if opinions.is_empty() {
            return Err(Error::EmptyInput(item_id));
        }

        self.stage(Stage::Extract);
        let raw_topics = extract::extract_topics(client, &self.config, &item, &opinions).await?;
        self.callbacks.emit(&PipelineEvent::TopicsExtracted {
            count: raw_topics.len(),
        });

        self.stage(Stage::Merge);
        let merged = merge::merge_topics(client, &self.config, &item.title, &raw_topics).await?;
        let canonical = canonical_names(&merged);
        self.callbacks.emit(&PipelineEvent::TopicsMerged {
            raw: raw_topics.len(),
            canonical: canonical.len(),
        });

        self.stage(Stage::Classify);
        let intents =
            classify::classify_opinions(client, &self.config, &item, &canonical, &opinions).await?;
        self.callbacks.emit(&PipelineEvent::OpinionsClassified {
            assignments: intents.len(),
        });

        let assignments = assign_opinions(&canonical, &intents, &opinions);

        self.stage(Stage::Report);
        let valid_ids: HashSet<String> =
            reports.iter().map(|r| r.session_id.clone()).collect();
        let topic_reports =
            report::generate_reports(client, &self.config, &item.title, assignments, &valid_ids)
                .await?;
        for topic_report in &topic_reports {
            self.callbacks.emit(&PipelineEvent::ReportGenerated {
                topic: topic_report.name.clone(),
                opinion_count: topic_report.opinions.len(),
            });
        }

        self.stage(Stage::Summary);
        let summary = summary::generate_summary(
            client,
            &self.config,
            &item.title,
            &topic_reports,
            opinions.len(),
            reports.len(),
        )
        .await?;

        // Persistence happens only now, after every stage has succeeded.
        let new_topics: Vec<NewTopic> = topic_reports
            .iter()
            .enumerate()
            .map(|(order, tr)| NewTopic {
                name: tr.name.clone(),
                narrative: tr.narrative.clone(),
                representatives: tr.representatives.clone(),
                sort_order: order as u32,
            })
            .collect();
        let persisted = self.store.create_topics(version.id, new_topics).await?;

        let topic_ids: HashMap<&str, i64> = persisted
            .iter()
            .map(|t| (t.name.as_str(), t.id))
            .collect();
        let rows = classification_rows(version.id, &topic_ids, &topic_reports);
        self.store.create_classifications(version.id, rows).await?;

        let intermediate = IntermediateResults {
            raw_topics,
            merged_topics: merged,
            classifications: intents,
            opinion_count: opinions.len(),
            report_count: reports.len(),
        };
        self.store
            .update_version_result(version.id, &summary, &intermediate)
            .await?;
        self.store
            .update_version_status(version.id, RunStatus::Completed, None)
            .await?;

        let topic_count = persisted.len();
        let completed = AnalysisVersion {
            status: RunStatus::Completed,
            summary: Some(summary),
            intermediate: Some(intermediate),
            ..version.clone()
        };
        Ok((completed, topic_count))
    }

    fn stage(&self, stage: Stage) {
        tracing::debug!(%stage, "stage started");
        self.callbacks.emit(&PipelineEvent::StageStarted { stage });
    }
}

/// Canonical topic names in merge order, first occurrence winning on
/// duplicates.
fn canonical_names(merged: &[MergedTopic]) -> Vec<String> {
    let mut seen = HashSet::new();
    merged
        .iter()
        .map(|m| m.name.clone())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Resolve classification intents into per-topic opinion lists.
///
/// Intents referencing an opinion missing from the working set, or a topic
/// name outside the canonical list, are skipped silently. A (report, index)
/// pair lands in a topic at most once. Topics that end up with zero opinions
/// are dropped, so the result feeds straight into the report stage.
fn assign_opinions(
    canonical: &[String],
    intents: &[ClassificationIntent],
    opinions: &[FlatOpinion],
) -> Vec<(String, Vec<FlatOpinion>)> {
    let lookup: HashMap<(i64, u32), &FlatOpinion> = opinions
        .iter()
        .map(|o| ((o.report_id, o.opinion_index), o))
        .collect();
    let known: HashSet<&str> = canonical.iter().map(String::as_str).collect();

    let mut by_topic: HashMap<&str, Vec<FlatOpinion>> = HashMap::new();
    let mut seen: HashSet<(&str, i64, u32)> = HashSet::new();
    for intent in intents {
        let Some(opinion) = lookup.get(&(intent.report_id, intent.opinion_index)) else {
            continue;
        };
        for name in &intent.topic_names {
            let Some(name) = known.get(name.as_str()) else {
                continue;
            };
            if seen.insert((name, intent.report_id, intent.opinion_index)) {
                by_topic.entry(name).or_default().push((*opinion).clone());
            }
        }
    }

    canonical
        .iter()
        .filter_map(|name| {
            let assigned = by_topic.remove(name.as_str())?;
            Some((name.clone(), assigned))
        })
        .collect()
}

/// Build classification edges once topic ids are known.
fn classification_rows(
    version_id: i64,
    topic_ids: &HashMap<&str, i64>,
    topic_reports: &[TopicReport],
) -> Vec<Classification> {
    let mut rows = Vec::new();
    for topic_report in topic_reports {
        let Some(&topic_id) = topic_ids.get(topic_report.name.as_str()) else {
            continue;
        };
        for opinion in &topic_report.opinions {
            rows.push(Classification {
                version_id,
                report_id: opinion.report_id,
                topic_id,
                opinion_index: opinion.opinion_index,
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::generation::testing::MockClient;
    use crate::model::{ItemContent, Opinion, SourceReport};
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn opinion(report_id: i64, session_id: &str, index: u32, title: &str) -> FlatOpinion {
        FlatOpinion {
            report_id,
            session_id: session_id.to_string(),
            opinion_index: index,
            title: title.to_string(),
            content: format!("{title} content"),
        }
    }

    fn intent(report_id: i64, index: u32, names: &[&str]) -> ClassificationIntent {
        ClassificationIntent {
            report_id,
            opinion_index: index,
            topic_names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_assign_skips_unknown_opinions_and_topics() {
        let canonical = vec!["safety".to_string(), "cost".to_string()];
        let opinions = vec![opinion(1, "s1", 0, "a"), opinion(1, "s1", 1, "b")];
        let intents = vec![
            intent(1, 0, &["safety", "not-a-topic"]),
            intent(99, 0, &["safety"]), // unknown opinion, skipped
            intent(1, 1, &[]),
        ];

        let assigned = assign_opinions(&canonical, &intents, &opinions);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].0, "safety");
        assert_eq!(assigned[0].1.len(), 1);
    }

    #[test]
    fn test_assign_dedupes_repeated_pairs() {
        let canonical = vec!["safety".to_string()];
        let opinions = vec![opinion(1, "s1", 0, "a")];
        let intents = vec![intent(1, 0, &["safety"]), intent(1, 0, &["safety"])];

        let assigned = assign_opinions(&canonical, &intents, &opinions);
        assert_eq!(assigned[0].1.len(), 1);
    }

    #[test]
    fn test_assign_drops_zero_opinion_topics_and_keeps_order() {
        let canonical = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let opinions = vec![opinion(1, "s1", 0, "x"), opinion(1, "s1", 1, "y")];
        let intents = vec![intent(1, 0, &["c"]), intent(1, 1, &["a"])];

        let assigned = assign_opinions(&canonical, &intents, &opinions);
        let names: Vec<&str> = assigned.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_canonical_names_dedupes() {
        let merged = vec![
            MergedTopic {
                name: "a".to_string(),
                absorbs: vec!["a".to_string()],
            },
            MergedTopic {
                name: "a".to_string(),
                absorbs: vec!["a2".to_string()],
            },
            MergedTopic {
                name: "b".to_string(),
                absorbs: vec!["b".to_string()],
            },
        ];
        assert_eq!(canonical_names(&merged), vec!["a", "b"]);
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_item(ItemContent {
            id: 1,
            title: "Road Safety Act".to_string(),
            summary: "Lower urban speed limits".to_string(),
        });
        store.insert_report(
            1,
            SourceReport {
                report_id: 10,
                session_id: "s1".to_string(),
                opinions: vec![
                    Opinion {
                        title: "Speeding worries".to_string(),
                        content: "Cars drive too fast near schools".to_string(),
                    },
                    Opinion {
                        title: "Enforcement cost".to_string(),
                        content: "Who pays for the new cameras?".to_string(),
                    },
                ],
            },
        );
        store.insert_report(
            1,
            SourceReport {
                report_id: 20,
                session_id: "s2".to_string(),
                opinions: vec![Opinion {
                    title: "General remark".to_string(),
                    content: "I support careful rollout".to_string(),
                }],
            },
        );
        store
    }

    /// Scripted client covering the full five-stage run: 4 raw topics,
    /// 2 canonical, one opinion left unclassified.
    fn scripted_client() -> MockClient {
        MockClient::new(|request| {
            if request.system == prompt::EXTRACT_SYSTEM {
                Ok(json!({
                    "topics": ["school zone speed", "speeding", "camera cost", "enforcement cost"]
                }))
            } else if request.system == prompt::MERGE_SYSTEM {
                Ok(json!({
                    "topics": [
                        { "name": "Traffic safety", "absorbs": ["school zone speed", "speeding"] },
                        { "name": "Cost burden", "absorbs": ["camera cost", "enforcement cost"] }
                    ]
                }))
            } else if request.system == prompt::CLASSIFY_SYSTEM {
                Ok(json!({
                    "assignments": [
                        { "report_id": 10, "opinion_index": 0, "topic_names": ["Traffic safety"] },
                        { "report_id": 10, "opinion_index": 1, "topic_names": ["Cost burden"] },
                        { "report_id": 20, "opinion_index": 0, "topic_names": [] }
                    ]
                }))
            } else if request.system == prompt::REPORT_SYSTEM {
                // One valid citation, one pointing outside the run
                Ok(json!({
                    "narrative": "Residents raised this repeatedly [ref:1], unlike [ref:2].",
                    "references": [
                        { "ref_id": 1, "session_id": "s1" },
                        { "ref_id": 2, "session_id": "nonexistent" }
                    ],
                    "representatives": [
                        { "session_id": "s1", "title": "t", "content": "c" }
                    ]
                }))
            } else {
                Ok(json!({ "summary": "Across 3 opinions from 2 reports, two themes dominate." }))
            }
        })
    }

    fn analyzer(store: &MemoryStore, client: MockClient) -> Analyzer {
        Analyzer::new(
            Arc::new(client),
            Arc::new(store.clone()),
            AnalysisConfig::new("test-model"),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_run_completes() {
        let store = seeded_store();
        let analyzer = analyzer(&store, scripted_client());

        let version = analyzer.run(1).await.unwrap();

        assert_eq!(version.status, RunStatus::Completed);
        assert_eq!(version.number, 1);
        assert!(version.summary.is_some());
        let intermediate = version.intermediate.as_ref().unwrap();
        assert_eq!(intermediate.raw_topics.len(), 4);
        assert_eq!(intermediate.merged_topics.len(), 2);
        assert_eq!(intermediate.classifications.len(), 3);
        assert_eq!(intermediate.opinion_count, 3);
        assert_eq!(intermediate.report_count, 2);

        // Both canonical topics survive (each has one opinion)
        let topics = store.fetch_topics(version.id).await.unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "Traffic safety");
        assert_eq!(topics[0].sort_order, 0);
        assert_eq!(topics[1].name, "Cost burden");
        assert_eq!(topics[1].sort_order, 1);

        // Narratives are grounded: invalid citation erased, valid one linked
        assert!(!topics[0].narrative.contains("[ref:"));
        assert!(topics[0].narrative.contains("s1"));
        assert!(!topics[0].narrative.contains("nonexistent"));
        assert_eq!(topics[0].representatives.len(), 1);

        // The unclassified opinion yields no row; 2 rows total (<= 3)
        let rows = store.classifications(version.id);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.version_id == version.id));

        // Stored version record matches the returned one
        let stored = store.list_versions(1).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, RunStatus::Completed);
        assert!(stored[0].summary.is_some());
        assert!(stored[0].error_message.is_none());
    }

    #[tokio::test]
    async fn test_stage_failure_marks_run_failed_without_artifacts() {
        let store = seeded_store();
        let client = MockClient::new(|request| {
            if request.system == prompt::MERGE_SYSTEM {
                Err(GenerationError::Transport("connection reset".to_string()))
            } else {
                Ok(json!({ "topics": ["a"] }))
            }
        });
        let analyzer = analyzer(&store, client);

        let result = analyzer.run(1).await;
        assert!(result.is_err());

        let versions = store.list_versions(1).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].status, RunStatus::Failed);
        let message = versions[0].error_message.as_deref().unwrap();
        assert!(message.contains("connection reset"));
        assert!(versions[0].summary.is_none());

        // A failure after extraction persists nothing
        assert!(store.fetch_topics(versions[0].id).await.unwrap().is_empty());
        assert!(store.classifications(versions[0].id).is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_fails_before_any_stage() {
        let store = MemoryStore::new();
        store.insert_item(ItemContent {
            id: 1,
            title: "Quiet Act".to_string(),
            summary: String::new(),
        });
        let client = Arc::new(scripted_client());
        let analyzer = Analyzer::new(
            Arc::clone(&client) as Arc<dyn GenerationClient>,
            Arc::new(store.clone()),
            AnalysisConfig::new("test-model"),
        );

        let result = analyzer.run(1).await;
        assert!(matches!(result, Err(Error::EmptyInput(1))));
        assert_eq!(client.calls(), 0);

        let versions = store.list_versions(1).await.unwrap();
        assert_eq!(versions[0].status, RunStatus::Failed);
        assert!(versions[0].error_message.is_some());
    }

    #[tokio::test]
    async fn test_version_numbers_survive_failed_runs() {
        let store = seeded_store();
        let failing = MockClient::new(|_| {
            Err(GenerationError::Transport("down".to_string()))
        });
        let _ = analyzer(&store, failing).run(1).await;

        let version = analyzer(&store, scripted_client()).run(1).await.unwrap();
        assert_eq!(version.number, 2);
    }

    #[tokio::test]
    async fn test_spawned_run_observed_by_polling() {
        let store = seeded_store();
        let analyzer = Arc::new(analyzer(&store, scripted_client()));

        let pending = analyzer.spawn(1).await.unwrap();
        assert_eq!(pending.status, RunStatus::Pending);

        let mut status = pending.status;
        for _ in 0..50 {
            let versions = store.list_versions(1).await.unwrap();
            status = versions[0].status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, RunStatus::Completed);
    }
}
