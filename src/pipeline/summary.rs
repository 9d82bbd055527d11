//! Stage 5: overall summary generation.
//!
//! One call over every per-topic report plus the aggregate counts; never
//! batched, and the output carries no citation markers to validate.

use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::generation::{GenerationClient, GenerationRequest, generate_as};
use crate::pipeline::prompt;
use crate::pipeline::report::TopicReport;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: String,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "required": ["summary"],
        "properties": {
            "summary": { "type": "string", "minLength": 1 }
        }
    })
}

fn build_prompt(
    item_title: &str,
    reports: &[TopicReport],
    opinion_count: usize,
    report_count: usize,
) -> String {
    let mut prompt = format!(
        "Legislation: {item_title}\nTotal opinions: {opinion_count}\nTotal source reports: {report_count}\n\nTopic reports:\n"
    );
    for report in reports {
        prompt.push_str(&format!(
            "## {} ({} opinions)\n{}\n\n",
            report.name,
            report.opinions.len(),
            report.narrative
        ));
    }
    prompt.push_str("Write the overall summary.");
    prompt
}

/// Produce the overall summary narrative across all topic reports.
pub(crate) async fn generate_summary(
    client: &dyn GenerationClient,
    config: &AnalysisConfig,
    item_title: &str,
    reports: &[TopicReport],
    opinion_count: usize,
    report_count: usize,
) -> Result<String, Error> {
    let request = GenerationRequest::new(
        config,
        prompt::SUMMARY_SYSTEM,
        build_prompt(item_title, reports, opinion_count, report_count),
        schema(),
    );
    let response: SummaryResponse = generate_as(client, &request).await?;
    Ok(response.summary)
}
