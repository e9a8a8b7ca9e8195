//! The staged merge pipeline.
//!
//! A run takes a context image and a person image through three stages:
//!
//! 1. **add content**: the editing service adds a person to the context image
//! 2. **composite**: stage 1's output and the person image are laid side by
//!    side locally
//! 3. **swap**: the editing service transfers the right half's appearance
//!    onto the left half
//!
//! Outputs are written under the request's output directory with one fixed
//! file name per stage. A failure halts the run but keeps earlier outputs.

mod orchestrator;
mod outputs;
mod prompts;
mod run;
mod stage;


pub use orchestrator::{MergeRequest, StagedMerge, VALIDATE_STAGE};
pub use outputs::{OutputNaming, RunLayout, StageOutputs};
pub use prompts::{
    augment_swap_instruction, StagePrompts, DEFAULT_ADD_CONTENT_PROMPT, DEFAULT_COMPOSITE_PROMPT,
    DEFAULT_SWAP_PROMPT, SWAP_LAYOUT_NOTE,
};
pub use run::{PipelineRun, RunStatus, StageRecord};
pub use stage::{MergeState, StageName, StageStatus};
