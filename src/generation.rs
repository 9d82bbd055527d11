//! Structured generation boundary.
//!
//! Every pipeline stage talks to the text-generation service through the
//! [`GenerationClient`] trait: the stage supplies a prompt and a JSON Schema,
//! the client returns a raw JSON value, and [`decode`] validates that value
//! against the schema before deserializing it into the stage's response
//! type. A schema mismatch is a typed [`GenerationError::Contract`], never a
//! crash, and no retries happen at this layer.

use crate::config::AnalysisConfig;
use crate::error::GenerationError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A single structured generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    /// System instruction for the call.
    pub system: String,
    /// User prompt carrying the stage's working data.
    pub prompt: String,
    /// JSON Schema the response object must satisfy.
    pub schema: Value,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Build a request from the run configuration and stage content.
    pub fn new(
        config: &AnalysisConfig,
        system: impl Into<String>,
        prompt: impl Into<String>,
        schema: Value,
    ) -> Self {
        Self {
            model: config.model.clone(),
            system: system.into(),
            prompt: prompt.into(),
            schema,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Client for the external structured text-generation service.
///
/// Implementations are transport-only: they submit the prompt and return the
/// model's JSON output without interpreting it. Contract validation happens
/// on this side of the seam, in [`decode`].
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Issue one generation call and return the raw structured object.
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError>;
}

/// Validate a raw response against the stage schema, then deserialize it.
pub fn decode<T: DeserializeOwned>(schema: &Value, raw: Value) -> Result<T, GenerationError> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| GenerationError::Schema(e.to_string()))?;
    if let Err(violation) = validator.validate(&raw) {
        return Err(GenerationError::Contract(violation.to_string()));
    }
    serde_json::from_value(raw).map_err(|e| GenerationError::Malformed(e.to_string()))
}

/// Issue one call and decode the response through the request's schema.
pub async fn generate_as<T: DeserializeOwned>(
    client: &dyn GenerationClient,
    request: &GenerationRequest,
) -> Result<T, GenerationError> {
    let raw = client.generate(request).await?;
    decode(&request.schema, raw)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        topics: Vec<String>,
    }

    fn sample_schema() -> Value {
        json!({
            "type": "object",
            "required": ["topics"],
            "properties": {
                "topics": {
                    "type": "array",
                    "minItems": 1,
                    "items": { "type": "string" }
                }
            }
        })
    }

    #[test]
    fn test_decode_valid_response() {
        let raw = json!({ "topics": ["tax policy", "road safety"] });
        let decoded: Sample = decode(&sample_schema(), raw).unwrap();
        assert_eq!(decoded.topics.len(), 2);
    }

    #[test]
    fn test_decode_rejects_contract_violation() {
        let raw = json!({ "topics": [] });
        let result: Result<Sample, _> = decode(&sample_schema(), raw);
        assert!(matches!(result, Err(GenerationError::Contract(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let raw = json!({ "other": true });
        let result: Result<Sample, _> = decode(&sample_schema(), raw);
        assert!(matches!(result, Err(GenerationError::Contract(_))));
    }

    #[tokio::test]
    async fn test_generate_as_counts_calls() {
        let client =
            testing::MockClient::new(|_| Ok(json!({ "topics": ["one"] })));
        let config = AnalysisConfig::new("test");
        let request = GenerationRequest::new(&config, "sys", "prompt", sample_schema());

        let decoded: Sample = generate_as(&client, &request).await.unwrap();
        assert_eq!(decoded.topics, vec!["one"]);
        assert_eq!(client.calls(), 1);
    }
}
