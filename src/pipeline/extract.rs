//! Stage 1: candidate topic extraction.
//!
//! Opinions are partitioned into fixed-size batches and each batch goes out
//! as one generation call under the concurrency cap. Batch outputs are
//! concatenated as-is; deduplication is the merge stage's job.

use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::generation::{GenerationClient, GenerationRequest, generate_as};
use crate::model::{FlatOpinion, ItemContent};
use crate::pipeline::prompt;
use crate::runner::{into_batches, run_bounded};
use serde::Deserialize;
use serde_json::{Value, json};

/// Hard limit the extraction prompt and schema put on topic-name length.
pub(crate) const TOPIC_NAME_MAX_CHARS: usize = 40;

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    topics: Vec<String>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "required": ["topics"],
        "properties": {
            "topics": {
                "type": "array",
                "minItems": 1,
                "items": { "type": "string", "minLength": 1, "maxLength": TOPIC_NAME_MAX_CHARS }
            }
        }
    })
}

fn build_prompt(item: &ItemContent, batch: &[FlatOpinion]) -> String {
    let mut prompt = format!(
        "Legislation: {}\nSummary: {}\n\nOpinions in this batch:\n",
        item.title, item.summary
    );
    for (index, opinion) in batch.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {}: {}\n",
            index + 1,
            opinion.title,
            opinion.content
        ));
    }
    prompt.push_str("\nExtract the topic names covering this batch.");
    prompt
}

/// Extract candidate topic names over all opinions.
///
/// Returns the flat, possibly duplicate-laden name list across batches.
pub(crate) async fn extract_topics(
    client: &dyn GenerationClient,
    config: &AnalysisConfig,
    item: &ItemContent,
    opinions: &[FlatOpinion],
) -> Result<Vec<String>, Error> {
    let batches = into_batches(opinions.to_vec(), config.batch_size);
    let per_batch = run_bounded(batches, config.concurrency, |batch| async move {
        let request =
            GenerationRequest::new(config, prompt::EXTRACT_SYSTEM, build_prompt(item, &batch), schema());
        let response: ExtractResponse = generate_as(client, &request).await?;
        Ok::<_, Error>(response.topics)
    })
    .await?;

    Ok(per_batch.into_iter().flatten().collect())
}
