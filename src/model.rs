//! Data model for analysis runs.
//!
//! Persistent records (`AnalysisVersion`, `Topic`, `Classification`) are
//! owned by the store; the remaining types are the pipeline's working units
//! and the read-side view of source material.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an analysis run.
///
/// `Completed` and `Failed` are terminal; a version record is never mutated
/// after reaching either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// One pipeline run for a given legislative item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisVersion {
    pub id: i64,
    pub item_id: i64,
    /// Per-item version number, strictly increasing from 1. Numbers are
    /// never reused, even when earlier runs failed.
    pub number: u32,
    pub status: RunStatus,
    pub error_message: Option<String>,
    /// Overall summary narrative, written only on completion.
    pub summary: Option<String>,
    /// Snapshot of the pipeline's intermediate output, written only on
    /// completion.
    pub intermediate: Option<IntermediateResults>,
    pub created_at: DateTime<Utc>,
}

/// Intermediate pipeline output persisted alongside the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediateResults {
    /// Flat topic-name list from stage 1, duplicates included.
    pub raw_topics: Vec<String>,
    /// Canonical entries from stage 2 with the raw names each absorbed.
    pub merged_topics: Vec<MergedTopic>,
    /// Raw classification intents from stage 3, before resolution.
    pub classifications: Vec<ClassificationIntent>,
    pub opinion_count: usize,
    pub report_count: usize,
}

/// A canonical topic entry produced by the merge stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedTopic {
    pub name: String,
    /// Raw topic names collapsed into this entry. Every raw name appears in
    /// exactly one entry, singletons included.
    pub absorbs: Vec<String>,
}

/// A canonical analysis topic belonging to one version.
///
/// Topics are created in bulk after report generation and never mutated.
/// A topic is only persisted when at least one opinion was classified into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub version_id: i64,
    pub name: String,
    /// Markdown narrative with grounded citation links.
    pub narrative: String,
    /// Up to 5 representative opinions, copied verbatim from the source.
    pub representatives: Vec<Representative>,
    /// Stable display order, equal to generation order.
    pub sort_order: u32,
}

/// A representative opinion attached to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representative {
    pub session_id: String,
    pub title: String,
    pub content: String,
}

/// A many-to-many edge between a source opinion and a topic within a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub version_id: i64,
    pub report_id: i64,
    pub topic_id: i64,
    /// Position of the opinion within its source report's opinion list.
    pub opinion_index: u32,
}

/// Raw classification output from stage 3: one opinion, zero or more
/// canonical topic names. Resolved back to `FlatOpinion`s by the
/// orchestrator; intents that reference an unknown opinion are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationIntent {
    pub report_id: i64,
    pub opinion_index: u32,
    pub topic_names: Vec<String>,
}

/// One opinion within one source report. The pipeline's working unit across
/// stages 1-4; never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatOpinion {
    pub report_id: i64,
    pub session_id: String,
    pub opinion_index: u32,
    pub title: String,
    pub content: String,
}

/// A claimed citation from the report stage: a marker id paired with the
/// session it points at. Filtered against the run's valid session ids before
/// any narrative text is rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub ref_id: u32,
    pub session_id: String,
}

/// A completed interview session's report with its free-text opinions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub report_id: i64,
    pub session_id: String,
    pub opinions: Vec<Opinion>,
}

/// A single free-text opinion as stored on a source report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opinion {
    pub title: String,
    pub content: String,
}

/// The legislative item under analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemContent {
    pub id: i64,
    pub title: String,
    pub summary: String,
}

/// Flatten source reports into the pipeline's working opinion list,
/// preserving report order and per-report opinion indices.
pub fn flatten_reports(reports: &[SourceReport]) -> Vec<FlatOpinion> {
    reports
        .iter()
        .flat_map(|report| {
            report.opinions.iter().enumerate().map(|(index, opinion)| FlatOpinion {
                report_id: report.report_id,
                session_id: report.session_id.clone(),
                opinion_index: index as u32,
                title: opinion.title.clone(),
                content: opinion.content.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(report_id: i64, session_id: &str, opinions: &[(&str, &str)]) -> SourceReport {
        SourceReport {
            report_id,
            session_id: session_id.to_string(),
            opinions: opinions
                .iter()
                .map(|(title, content)| Opinion {
                    title: title.to_string(),
                    content: content.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_flatten_preserves_order_and_indices() {
        let reports = vec![
            report(1, "s1", &[("a", "A"), ("b", "B")]),
            report(2, "s2", &[("c", "C")]),
        ];

        let flat = flatten_reports(&reports);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].report_id, 1);
        assert_eq!(flat[0].opinion_index, 0);
        assert_eq!(flat[1].opinion_index, 1);
        assert_eq!(flat[2].report_id, 2);
        assert_eq!(flat[2].session_id, "s2");
        assert_eq!(flat[2].opinion_index, 0);
    }

    #[test]
    fn test_flatten_empty_reports() {
        let reports = vec![report(1, "s1", &[])];
        assert!(flatten_reports(&reports).is_empty());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&RunStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
