//! End-to-end pipeline run against the in-memory store, with a scripted
//! generation client standing in for the model.
//!
//! Shows the full surface without any external service: seeding items and
//! reports, running all five stages, and reading back the persisted version,
//! topics, and grounded narratives.
//!
//! Run with:
//!   cargo run --example memory_pipeline

use agora::{
    AnalysisConfig, AnalysisStore, Analyzer, GenerationClient, GenerationError, GenerationRequest,
    ItemContent, MemoryStore, Opinion, SourceReport,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

/// Returns a canned response for whichever stage the request belongs to.
struct ScriptedClient;

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let response = if request.system.contains("extract the topics") {
            json!({
                "topics": [
                    "school zone speed limits",
                    "speed camera placement",
                    "enforcement funding",
                    "camera operating costs"
                ]
            })
        } else if request.system.contains("consolidate raw topic names") {
            json!({
                "topics": [
                    {
                        "name": "Speed limits near schools",
                        "absorbs": ["school zone speed limits", "speed camera placement"]
                    },
                    {
                        "name": "Enforcement costs",
                        "absorbs": ["enforcement funding", "camera operating costs"]
                    }
                ]
            })
        } else if request.system.contains("classify citizen opinions") {
            json!({
                "assignments": [
                    { "report_id": 1, "opinion_index": 0,
                      "topic_names": ["Speed limits near schools"] },
                    { "report_id": 1, "opinion_index": 1,
                      "topic_names": ["Enforcement costs"] },
                    { "report_id": 2, "opinion_index": 0,
                      "topic_names": ["Speed limits near schools", "Enforcement costs"] }
                ]
            })
        } else if request.system.contains("report for one topic") {
            json!({
                "narrative": "Several residents pressed this point directly [ref:1], \
                              while others tied it to budget concerns [ref:2].",
                "references": [
                    { "ref_id": 1, "session_id": "sess-a" },
                    { "ref_id": 2, "session_id": "sess-b" }
                ],
                "representatives": [
                    {
                        "session_id": "sess-a",
                        "title": "Slow down near schools",
                        "content": "Cars routinely exceed the limit outside the primary school."
                    }
                ]
            })
        } else {
            json!({
                "summary": "Across 3 opinions from 2 reports, discussion splits between \
                            speed limits near schools and the cost of enforcing them."
            })
        };
        Ok(response)
    }
}

fn seed(store: &MemoryStore) {
    store.insert_item(ItemContent {
        id: 42,
        title: "Urban Road Safety Act".to_string(),
        summary: "Lowers speed limits in school zones and funds automated enforcement."
            .to_string(),
    });
    store.insert_report(
        42,
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
        42,
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
    let store = MemoryStore::new();
    seed(&store);

    let analyzer = Analyzer::new(
        Arc::new(ScriptedClient),
        Arc::new(store.clone()),
        AnalysisConfig::new("scripted"),
    )
    .verbose(true);

    let version = analyzer.run(42).await.unwrap();

    println!("\n=== Version {} (run #{}) ===", version.id, version.number);
    println!("status: {:?}", version.status);
    println!("\n--- Summary ---\n{}", version.summary.as_deref().unwrap_or(""));

    let topics = store.fetch_topics(version.id).await.unwrap();
    for topic in topics {
        println!("\n--- Topic: {} ---", topic.name);
        println!("{}", topic.narrative);
        for rep in &topic.representatives {
            println!("  representative [{}]: {}", rep.session_id, rep.title);
        }
    }
}
