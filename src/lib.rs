//! Agora - LLM topic analysis for citizen opinions on legislation
//!
//! Agora distils the opinions citizens submit about a legislative item into
//! a set of named topics, each with a citation-grounded narrative report,
//! plus an overall summary. A run walks five stages (extract, merge,
//! classify, report, summarize) and persists its output as an immutable
//! numbered version; a failed run records its error and persists nothing
//! else.
//!
//! # Quick Start
//!
//! ```ignore
//! use agora::{AnalysisConfig, Analyzer, MemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!     // seed the store with an item and its completed reports...
//!
//!     let analyzer = Analyzer::new(
//!         Arc::new(my_client),
//!         Arc::new(store.clone()),
//!         AnalysisConfig::new("gpt-4o-mini"),
//!     )
//!     .verbose(true);
//!
//!     let version = analyzer.run(1).await.unwrap();
//!     println!("{}", version.summary.unwrap());
//! }
//! ```

mod config;
mod error;
mod generation;
mod model;
mod pipeline;
mod runner;
mod store;

pub use config::AnalysisConfig;
pub use error::{Error, GenerationError, Result, StoreError};
pub use generation::{GenerationClient, GenerationRequest, decode, generate_as};
pub use model::{
    AnalysisVersion, Classification, ClassificationIntent, FlatOpinion, IntermediateResults,
    ItemContent, MergedTopic, Opinion, Reference, Representative, RunStatus, SourceReport, Topic,
    flatten_reports,
};
pub use pipeline::{
    Analyzer, EventCallback, PipelineCallbacks, PipelineEvent, Stage, filter_representatives,
    ground_narrative, verbose_callbacks,
};
pub use runner::{into_batches, run_bounded};
pub use store::{AnalysisStore, MemoryStore, NewTopic};
