//! Pipeline run against a real OpenAI-compatible chat completions endpoint.
//!
//! The client asks for structured output via `response_format: json_schema`,
//! so each stage's reply already matches the schema the crate validates
//! against. Works with OpenAI or any compatible server (set OPENAI_BASE_URL).
//!
//! Run with:
//!   OPENAI_API_KEY=your_key cargo run --example openai_pipeline

use agora::{
    AnalysisConfig, AnalysisStore, Analyzer, GenerationClient, GenerationError, GenerationRequest,
    ItemContent, MemoryStore, Opinion, SourceReport,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::env;
use std::sync::Arc;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

struct OpenAiClient {
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    fn from_env() -> Result<Self, String> {
        let api_key =
            env::var("OPENAI_API_KEY").map_err(|_| "OPENAI_API_KEY not set".to_string())?;
        let base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        Ok(Self { api_key, base_url })
    }

    fn call(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let body = ChatRequest {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt.clone(),
                },
            ],
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "stage_response",
                    "schema": request.schema,
                    "strict": false
                }
            }),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = ureq::post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send_json(&body);

        let mut resp = match response {
            Ok(resp) => resp,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(GenerationError::Transport(format!("HTTP error {}", code)));
            }
            Err(e) => return Err(GenerationError::Transport(format!("{:?}", e))),
        };

        let parsed: ChatResponse = resp
            .body_mut()
            .read_json()
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("empty choices".to_string()))?;

        serde_json::from_str(&content).map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        // ureq blocks, so the call runs off the async runtime's worker threads
        let client = OpenAiClient {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
        };
        let request = request.clone();
        tokio::task::spawn_blocking(move || client.call(&request))
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?
    }
}

fn seed(store: &MemoryStore) {
    store.insert_item(ItemContent {
        id: 1,
        title: "Urban Road Safety Act".to_string(),
        summary: "Lowers speed limits in school zones and funds automated enforcement."
            .to_string(),
    });
    store.insert_report(
        1,
        SourceReport {
            report_id: 1,
            session_id: "sess-a".to_string(),
            opinions: vec![
                Opinion {
                    title: "Slow down near schools".to_string(),
                    content: "Cars routinely exceed the limit outside the primary school."
                        .to_string(),
                },
                Opinion {
                    title: "Who pays?".to_string(),
                    content: "The cameras sound expensive; where does the money come from?"
                        .to_string(),
                },
            ],
        },
    );
    store.insert_report(
        1,
        SourceReport {
            report_id: 2,
            session_id: "sess-b".to_string(),
            opinions: vec![Opinion {
                title: "Support with caveats".to_string(),
                content: "Lower limits make sense, but enforcement must be funded honestly."
                    .to_string(),
            }],
        },
    );
}

#[tokio::main]
async fn main() {
    let client = match OpenAiClient::from_env() {
        Ok(client) => client,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    };

    let store = MemoryStore::new();
    seed(&store);

    let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let analyzer = Analyzer::new(
        Arc::new(client),
        Arc::new(store.clone()),
        AnalysisConfig::new(model),
    )
    .verbose(true);

    match analyzer.run(1).await {
        Ok(version) => {
            println!("\n=== Run #{} completed ===", version.number);
            println!("\n{}", version.summary.as_deref().unwrap_or(""));
            let topics = store.fetch_topics(version.id).await.unwrap();
            for topic in topics {
                println!("\n## {}\n\n{}", topic.name, topic.narrative);
            }
        }
        Err(err) => {
            eprintln!("analysis failed: {}", err);
            std::process::exit(1);
        }
    }
}
