//! Lifecycle events for pipeline runs and remote jobs.
//!
//! The orchestrator and the edit client publish [`PipelineEvent`]s to an
//! [`EventSink`]. Sinks are injected at construction; the default discards
//! everything.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::JobState;
use crate::errors::ErrorKind;
use crate::pipeline::{RunStatus, StageName};

/// Something observable that happened during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage began executing.
    StageStarted {
        /// Run the stage belongs to.
        run_id: Uuid,
        /// The stage.
        stage: StageName,
    },
    /// A stage produced its output.
    StageCompleted {
        /// Run the stage belongs to.
        run_id: Uuid,
        /// The stage.
        stage: StageName,
        /// Path of the produced image.
        output: String,
        /// Wall time spent in the stage.
        duration_ms: u64,
    },
    /// A stage failed; later stages will not run.
    StageFailed {
        /// Run the stage belongs to.
        run_id: Uuid,
        /// The stage.
        stage: StageName,
        /// Classification of the failure.
        kind: ErrorKind,
        /// Error message.
        message: String,
    },
    /// A run reached `Done` or `Failed`.
    PipelineFinished {
        /// The run.
        run_id: Uuid,
        /// Aggregate status.
        status: RunStatus,
    },
    /// An edit request was accepted by the service.
    JobSubmitted {
        /// Service-issued job id.
        job_id: String,
    },
    /// One status query returned.
    JobPolled {
        /// Service-issued job id.
        job_id: String,
        /// Raw status string reported by the service.
        status: String,
        /// 1-based attempt counter.
        attempt: u32,
    },
    /// A job left the polling loop.
    JobFinished {
        /// Service-issued job id.
        job_id: String,
        /// Final local state.
        state: JobState,
    },
}

impl PipelineEvent {
    /// Dotted event type, e.g. `stage.started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageStarted { .. } => "stage.started",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageFailed { .. } => "stage.failed",
            Self::PipelineFinished {
                status: RunStatus::Done,
                ..
            } => "pipeline.completed",
            Self::PipelineFinished { .. } => "pipeline.failed",
            Self::JobSubmitted { .. } => "job.submitted",
            Self::JobPolled { .. } => "job.polled",
            Self::JobFinished { .. } => "job.finished",
        }
    }
}
