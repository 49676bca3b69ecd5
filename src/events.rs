// src/events.rs
//! Incremental outputs the pipelines emit while they run.

use crate::analysis::AnalyzedJob;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Progress { fraction: f32, message: String },
    Warning { message: String },
    JobResult(AnalyzedJob),
}

impl PipelineEvent {
    /// SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineEvent::Progress { .. } => "progress",
            PipelineEvent::Warning { .. } => "warning",
            PipelineEvent::JobResult(_) => "result",
        }
    }
}

/// Cheap-to-clone handle the orchestrators report through. A disabled sink drops everything.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is watching any more
            let _ = tx.send(event);
        }
    }

    pub fn progress(&self, fraction: f32, message: impl Into<String>) {
        self.emit(PipelineEvent::Progress {
            fraction: fraction.clamp(0.0, 1.0),
            message: message.into(),
        });
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(PipelineEvent::Warning {
            message: message.into(),
        });
    }

    pub fn job_result(&self, job: &AnalyzedJob) {
        self.emit(PipelineEvent::JobResult(job.clone()));
    }
}
