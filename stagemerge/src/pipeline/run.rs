//! The record of one staged merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::outputs::{OutputNaming, StageOutputs};
use super::stage::{MergeState, StageName, StageStatus};
use crate::client::{EditRequest, StageAction};
use crate::codec::ImageRef;
use crate::errors::{ErrorKind, StagemergeError};

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Stages are still executing.
    Running,
    /// Every stage produced its output.
    Done,
    /// A stage or the input check failed.
    Failed,
}

impl From<MergeState> for RunStatus {
    fn from(state: MergeState) -> Self {
        match state {
            MergeState::Done => Self::Done,
            MergeState::Failed => Self::Failed,
            _ => Self::Running,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// What happened in one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage.
    pub name: StageName,
    /// How the stage was executed.
    pub action: StageAction,
    /// Instruction used; for remote stages, exactly what was sent.
    #[serde(default)]
    pub instruction: String,
    /// Images the stage consumed.
    #[serde(default)]
    pub inputs: Vec<ImageRef>,
    /// Current status.
    pub status: StageStatus,
    /// Output image on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ImageRef>,
    /// Error message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error classification on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// When the stage started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the stage finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl StageRecord {
    fn pending(name: StageName) -> Self {
        let action = match name {
            StageName::Composite => StageAction::LocalComposite,
            StageName::AddContent | StageName::Swap => StageAction::RemoteEdit,
        };
        Self {
            name,
            action,
            instruction: String::new(),
            inputs: Vec::new(),
            status: StageStatus::Pending,
            output: None,
            error: None,
            error_kind: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Wall time between start and end, if both are known.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        let (start, end) = (self.started_at?, self.ended_at?);
        u64::try_from((end - start).num_milliseconds()).ok()
    }
}

/// One execution of the three-stage merge.
///
/// Outputs only ever grow: a stage's image is recorded once that stage
/// succeeds and is never removed, so a failed run still reports every
/// image produced before the failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    run_id: Uuid,
    state: MergeState,
    naming: OutputNaming,
    output_dir: PathBuf,
    stages: Vec<StageRecord>,
    outputs: StageOutputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Creates a run with all stages pending.
    pub fn new(output_dir: impl Into<PathBuf>, naming: OutputNaming) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: MergeState::AddContent,
            naming,
            output_dir: output_dir.into(),
            stages: StageName::ALL.iter().map(|s| StageRecord::pending(*s)).collect(),
            outputs: StageOutputs::default(),
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Unique id of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Current position in the stage sequence.
    #[must_use]
    pub fn state(&self) -> MergeState {
        self.state
    }

    /// Aggregate status.
    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.state.into()
    }

    /// Naming scheme for outputs.
    #[must_use]
    pub fn naming(&self) -> OutputNaming {
        self.naming
    }

    /// Directory receiving stage outputs.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// All stage records, in execution order.
    #[must_use]
    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    /// The record for `name`.
    #[must_use]
    pub fn stage(&self, name: StageName) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.name == name)
    }

    /// Outputs produced so far.
    #[must_use]
    pub fn outputs(&self) -> &StageOutputs {
        &self.outputs
    }

    /// Outputs produced so far, keyed by the run's naming scheme.
    #[must_use]
    pub fn output_map(&self) -> BTreeMap<String, ImageRef> {
        self.outputs.to_map(self.naming)
    }

    /// Message of the error that stopped the run.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the run finished.
    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Compact JSON summary: id, status, outputs by name, stage statuses.
    #[must_use]
    pub fn report(&self) -> serde_json::Value {
        let stages: BTreeMap<String, String> = self
            .stages
            .iter()
            .map(|r| (r.name.to_string(), r.status.to_string()))
            .collect();
        let mut report = serde_json::json!({
            "run_id": self.run_id,
            "status": self.status(),
            "results": self.output_map(),
            "stages": stages,
        });
        if let Some(error) = &self.error {
            report["error"] = serde_json::json!(error);
        }
        report
    }

    fn record_mut(&mut self, name: StageName) -> Option<&mut StageRecord> {
        self.stages.iter_mut().find(|r| r.name == name)
    }

    pub(crate) fn begin_stage(&mut self, name: StageName, request: &EditRequest) {
        if let Some(record) = self.record_mut(name) {
            record.action = request.action();
            record.instruction = request.instruction().to_string();
            record.inputs = std::iter::once(request.source())
                .chain(request.secondary())
                .cloned()
                .collect();
            record.status = StageStatus::Running;
            record.started_at = Some(Utc::now());
        }
    }

    pub(crate) fn complete_stage(&mut self, name: StageName, output: ImageRef) {
        if let Some(record) = self.record_mut(name) {
            record.status = StageStatus::Ok;
            record.output = Some(output.clone());
            record.ended_at = Some(Utc::now());
        }
        self.outputs.set(name, output);
        self.state = self.state.succeed();
        if self.state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub(crate) fn fail_stage(&mut self, name: StageName, error: &StagemergeError) {
        if let Some(record) = self.record_mut(name) {
            record.status = StageStatus::Fail;
            record.error = Some(error.to_string());
            record.error_kind = Some(error.kind());
            record.ended_at = Some(Utc::now());
        }
        self.abort(error);
    }

    /// Marks the run failed; stages that never started are skipped.
    pub(crate) fn abort(&mut self, error: &StagemergeError) {
        for record in &mut self.stages {
            if !record.status.is_terminal() {
                record.status = StageStatus::Skip;
            }
        }
        self.error = Some(error.to_string());
        self.state = self.state.fail();
        self.ended_at = Some(Utc::now());
    }
}
