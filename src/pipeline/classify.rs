//! Stage 3: opinion classification.
//!
//! Same batching and concurrency discipline as extraction. Each opinion is
//! labeled with its (report_id, opinion_index) identity so the orchestrator
//! can resolve intents back to the working set afterwards.

use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::generation::{GenerationClient, GenerationRequest, generate_as};
use crate::model::{ClassificationIntent, FlatOpinion, ItemContent};
use crate::pipeline::prompt;
use crate::runner::{into_batches, run_bounded};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    assignments: Vec<ClassificationIntent>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "required": ["assignments"],
        "properties": {
            "assignments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["report_id", "opinion_index", "topic_names"],
                    "properties": {
                        "report_id": { "type": "integer" },
                        "opinion_index": { "type": "integer", "minimum": 0 },
                        "topic_names": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    }
                }
            }
        }
    })
}

fn build_prompt(item: &ItemContent, topics: &[String], batch: &[FlatOpinion]) -> String {
    let mut prompt = format!("Legislation: {}\n\nCanonical topics:\n", item.title);
    for name in topics {
        prompt.push_str(&format!("- {name}\n"));
    }
    prompt.push_str("\nOpinions to classify:\n");
    for opinion in batch {
        prompt.push_str(&format!(
            "- report_id={} opinion_index={} | {}: {}\n",
            opinion.report_id, opinion.opinion_index, opinion.title, opinion.content
        ));
    }
    prompt.push_str("\nAssign each opinion to its topics.");
    prompt
}

/// Classify every opinion against the canonical topic set.
///
/// Returns the flat intent list across batches; resolution against the
/// working set happens in the orchestrator.
pub(crate) async fn classify_opinions(
    client: &dyn GenerationClient,
    config: &AnalysisConfig,
    item: &ItemContent,
    topics: &[String],
    opinions: &[FlatOpinion],
) -> Result<Vec<ClassificationIntent>, Error> {
    let batches = into_batches(opinions.to_vec(), config.batch_size);
    let per_batch = run_bounded(batches, config.concurrency, |batch| async move {
        let request = GenerationRequest::new(
            config,
            prompt::CLASSIFY_SYSTEM,
            build_prompt(item, topics, &batch),
            schema(),
        );
        let response: ClassifyResponse = generate_as(client, &request).await?;
        Ok::<_, Error>(response.assignments)
    })
    .await?;

    Ok(per_batch.into_iter().flatten().collect())
}
