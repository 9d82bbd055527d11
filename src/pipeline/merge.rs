//! Stage 2: topic merge.
//!
//! One call over the full raw-name list, never batched; cross-batch
//! duplicates only become visible here.

use crate::config::AnalysisConfig;
use crate::error::Error;
use crate::generation::{GenerationClient, GenerationRequest, generate_as};
use crate::model::MergedTopic;
use crate::pipeline::prompt;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct MergeResponse {
    topics: Vec<MergedTopic>,
}

fn schema() -> Value {
    json!({
        "type": "object",
        "required": ["topics"],
        "properties": {
            "topics": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["name", "absorbs"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "absorbs": {
                            "type": "array",
                            "minItems": 1,
                            "items": { "type": "string" }
                        }
                    }
                }
            }
        }
    })
}

fn build_prompt(item_title: &str, raw_topics: &[String]) -> String {
    let mut prompt = format!("Legislation: {item_title}\n\nRaw topic names:\n");
    for (index, name) in raw_topics.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", index + 1, name));
    }
    prompt.push_str("\nMerge these into one canonical topic set.");
    prompt
}

/// Collapse the raw topic names into a canonical set.
pub(crate) async fn merge_topics(
    client: &dyn GenerationClient,
    config: &AnalysisConfig,
    item_title: &str,
    raw_topics: &[String],
) -> Result<Vec<MergedTopic>, Error> {
    let request = GenerationRequest::new(
        config,
        prompt::MERGE_SYSTEM,
        build_prompt(item_title, raw_topics),
        schema(),
    );
    let response: MergeResponse = generate_as(client, &request).await?;
    Ok(response.topics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::MockClient;

    #[tokio::test]
    async fn test_single_call_over_full_list() {
        let client = MockClient::new(|request| {
            // All raw names are visible in one prompt
            assert!(request.prompt.contains("1. speed limits"));
            assert!(request.prompt.contains("2. speeding"));
            assert!(request.prompt.contains("3. noise"));
            Ok(json!({
                "topics": [
                    { "name": "speed limits", "absorbs": ["speed limits", "speeding"] },
                    { "name": "noise", "absorbs": ["noise"] }
                ]
            }))
        });
        let config = AnalysisConfig::new("test");
        let raw = vec![
            "speed limits".to_string(),
            "speeding".to_string(),
            "noise".to_string(),
        ];

        let merged = merge_topics(&client, &config, "Road Safety Act", &raw)
            .await
            .unwrap();

        assert_eq!(client.calls(), 1);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].absorbs.len(), 2);
        // Singleton entries absorb themselves
        assert_eq!(merged[1].absorbs, vec!["noise"]);
    }

    #[tokio::test]
    async fn test_entry_without_absorbs_is_contract_error() {
        let client = MockClient::new(|_| Ok(json!({ "topics": [{ "name": "x" }] })));
        let config = AnalysisConfig::new("test");

        let result = merge_topics(&client, &config, "t", &["x".to_string()]).await;
        assert!(matches!(result, Err(Error::Generation(_))));
    }
}
