//! Stage names, per-stage status and the run state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three stages of a staged merge, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Remote edit adding a person to the context image.
    AddContent,
    /// Local side-by-side composite of stage 1's output and the person image.
    Composite,
    /// Remote edit transferring the right half's appearance onto the left.
    Swap,
}

impl StageName {
    /// All stages in execution order.
    pub const ALL: [Self; 3] = [Self::AddContent, Self::Composite, Self::Swap];

    /// The stage whose output this stage consumes.
    #[must_use]
    pub fn upstream(self) -> Option<Self> {
        match self {
            Self::AddContent => None,
            Self::Composite => Some(Self::AddContent),
            Self::Swap => Some(Self::Composite),
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddContent => write!(f, "add_content"),
            Self::Composite => write!(f, "composite"),
            Self::Swap => write!(f, "swap"),
        }
    }
}

/// Execution status of one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not started yet.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Finished with an output.
    Ok,
    /// Finished with an error.
    Fail,
    /// Never ran because an earlier step failed.
    Skip,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Ok => write!(f, "ok"),
            Self::Fail => write!(f, "fail"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status will not change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Fail | Self::Skip)
    }
}

/// Where a staged merge currently is.
///
/// `AddContent -> Composite -> Swap -> Done`, with `Failed` reachable from
/// any stage and absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeState {
    /// Stage 1 is next or running.
    #[default]
    AddContent,
    /// Stage 2 is next or running.
    Composite,
    /// Stage 3 is next or running.
    Swap,
    /// All three outputs exist.
    Done,
    /// A stage failed; nothing further runs.
    Failed,
}

impl MergeState {
    /// The stage executed in this state, if any.
    #[must_use]
    pub fn stage(self) -> Option<StageName> {
        match self {
            Self::AddContent => Some(StageName::AddContent),
            Self::Composite => Some(StageName::Composite),
            Self::Swap => Some(StageName::Swap),
            Self::Done | Self::Failed => None,
        }
    }

    /// The state after the current stage succeeds.
    #[must_use]
    pub fn succeed(self) -> Self {
        match self {
            Self::AddContent => Self::Composite,
            Self::Composite => Self::Swap,
            Self::Swap | Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    /// The state after the current stage fails.
    #[must_use]
    pub fn fail(self) -> Self {
        match self {
            Self::Done => Self::Done,
            _ => Self::Failed,
        }
    }

    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddContent => write!(f, "add_content"),
            Self::Composite => write!(f, "composite"),
            Self::Swap => write!(f, "swap"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
