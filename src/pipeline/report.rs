//! Stage 4: grounded per-topic report generation.
//!
//! Topics are processed item-level under the concurrency cap; each produces
//! a narrative with claimed citations, which is immediately reconciled
//! against the run's valid session ids by the grounding validator. A topic
//! only reaches this stage with at least one assigned opinion.

use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::generation::{GenerationClient, GenerationRequest, generate_as};
use crate::model::{FlatOpinion, Reference, Representative};
use crate::pipeline::grounding::{MAX_REPRESENTATIVES, filter_representatives, ground_narrative};
use crate::pipeline::prompt;
use crate::runner::run_bounded;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashSet;

/// Stage-4 output for one topic, grounded and ready to persist.
#[derive(Debug, Clone)]
pub(crate) struct TopicReport {
    pub(crate) name: String,
    pub(crate) narrative: String,
    pub(crate) representatives: Vec<Representative>,
    /// The opinions classified into this topic; the classification edges
    /// persisted for the topic come from this list.
    pub(crate) opinions: Vec<FlatOpinion>,
}

#[derive(Debug, Deserialize)]
struct ReportResponse {
    narrative: String,
    #[serde(default)]
    references: Vec<Reference>,
    #[serde(default)]
    representatives: Vec<Representative>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "required": ["narrative"],
        "properties": {
            "narrative": { "type": "string", "minLength": 1 },
            "references": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["ref_id", "session_id"],
                    "properties": {
                        "ref_id": { "type": "integer", "minimum": 0 },
                        "session_id": { "type": "string" }
                    }
                }
            },
            "representatives": {
                "type": "array",
                "maxItems": MAX_REPRESENTATIVES,
                "items": {
                    "type": "object",
                    "required": ["session_id", "title", "content"],
                    "properties": {
                        "session_id": { "type": "string" },
                        "title": { "type": "string" },
                        "content": { "type": "string" }
                    }
                }
            }
        }
    })
}

fn build_prompt(item_title: &str, topic: &str, opinions: &[FlatOpinion]) -> String {
    let mut prompt = format!("Legislation: {item_title}\nTopic: {topic}\n\nAssigned opinions:\n");
    for opinion in opinions {
        prompt.push_str(&format!(
            "- [session {}] {}: {}\n",
            opinion.session_id, opinion.title, opinion.content
        ));
    }
    prompt.push_str("\nWrite the grounded report for this topic.");
    prompt
}

/// Generate grounded reports for all surviving topics, in assignment order.
pub(crate) async fn generate_reports(
    client: &dyn GenerationClient,
    config: &AnalysisConfig,
    item_title: &str,
    assignments: Vec<(String, Vec<FlatOpinion>)>,
    valid_ids: &HashSet<String>,
) -> Result<Vec<TopicReport>, Error> {
    run_bounded(assignments, config.concurrency, |(name, opinions)| async move {
        let request = GenerationRequest::new(
            config,
            prompt::REPORT_SYSTEM,
            build_prompt(item_title, &name, &opinions),
            schema(),
        );
        let response: ReportResponse = generate_as(client, &request).await?;

        let (narrative, _kept) =
            ground_narrative(&response.narrative, &response.references, valid_ids);
        let representatives = filter_representatives(response.representatives, valid_ids);

        Ok::<_, Error>(TopicReport {
            name,
            narrative,
            representatives,
            opinions,
        })
    })
    .await
}
