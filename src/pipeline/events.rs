//! Pipeline events and callbacks for observability.

use std::fmt;
use std::sync::Arc;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Merge,
    Classify,
    Report,
    Summary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::Merge => "merge",
            Stage::Classify => "classify",
            Stage::Report => "report",
            Stage::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Events emitted during a run for observability.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A run was created and is about to execute
    RunStarted {
        version_id: i64,
        item_id: i64,
        number: u32,
    },
    /// A stage began executing
    StageStarted { stage: Stage },
    /// Stage 1 finished with this many raw topic names
    TopicsExtracted { count: usize },
    /// Stage 2 collapsed the raw names into this many canonical topics
    TopicsMerged { raw: usize, canonical: usize },
    /// Stage 3 produced this many classification intents
    OpinionsClassified { assignments: usize },
    /// Stage 4 finished one topic's grounded report
    ReportGenerated { topic: String, opinion_count: usize },
    /// The run reached `completed`
    RunCompleted { version_id: i64, topics: usize },
    /// The run reached `failed`
    RunFailed { version_id: i64, message: String },
}

/// Type alias for event callbacks
pub type EventCallback = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Storage for pipeline callbacks
#[derive(Default, Clone)]
pub struct PipelineCallbacks {
    pub on_run_started: Option<EventCallback>,
    pub on_stage_started: Option<EventCallback>,
    pub on_report_generated: Option<EventCallback>,
    pub on_run_completed: Option<EventCallback>,
    pub on_run_failed: Option<EventCallback>,
    /// Catch-all callback for any event
    pub on_event: Option<EventCallback>,
}

impl PipelineCallbacks {
    /// Emit an event to the appropriate callback(s)
    pub fn emit(&self, event: &PipelineEvent) {
        let specific = match event {
            PipelineEvent::RunStarted { .. } => &self.on_run_started,
            PipelineEvent::StageStarted { .. } => &self.on_stage_started,
            PipelineEvent::ReportGenerated { .. } => &self.on_report_generated,
            PipelineEvent::RunCompleted { .. } => &self.on_run_completed,
            PipelineEvent::RunFailed { .. } => &self.on_run_failed,
            _ => &None,
        };

        if let Some(cb) = specific {
            cb(event);
        }

        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }
}

/// Create verbose logging callbacks printing progress to stderr.
pub fn verbose_callbacks() -> PipelineCallbacks {
    PipelineCallbacks {
        on_event: Some(Arc::new(|event| match event {
            PipelineEvent::RunStarted {
                version_id,
                item_id,
                number,
            } => eprintln!("[agora] run v{number} started (version {version_id}, item {item_id})"),
            PipelineEvent::StageStarted { stage } => eprintln!("[agora] stage: {stage}"),
            PipelineEvent::TopicsExtracted { count } => {
                eprintln!("[agora] extracted {count} raw topics")
            }
            PipelineEvent::TopicsMerged { raw, canonical } => {
                eprintln!("[agora] merged {raw} raw topics into {canonical}")
            }
            PipelineEvent::OpinionsClassified { assignments } => {
                eprintln!("[agora] classified opinions ({assignments} intents)")
            }
            PipelineEvent::ReportGenerated {
                topic,
                opinion_count,
            } => eprintln!("[agora] report: {topic} ({opinion_count} opinions)"),
            PipelineEvent::RunCompleted { version_id, topics } => {
                eprintln!("[agora] run completed (version {version_id}, {topics} topics)")
            }
            PipelineEvent::RunFailed {
                version_id,
                message,
            } => eprintln!("[agora] run failed (version {version_id}): {message}"),
        })),
        ..Default::default()
    }
}
