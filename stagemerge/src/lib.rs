//! # Stagemerge
//!
//! Staged image-edit orchestration over an asynchronous generative editing
//! service.
//!
//! A merge run takes a scene and a person image through three stages:
//!
//! - **Add content**: the editing service adds a person to the scene
//! - **Composite**: the result and the person image are placed side by side
//!   locally, with no remote call
//! - **Swap**: the editing service transfers the right half's appearance
//!   onto the left half
//!
//! Remote edits are submitted, polled until terminal under a deadline, and
//! downloaded. A failed stage halts the run but keeps earlier outputs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagemerge::prelude::*;
//!
//! let client = EditClient::new(EditServiceConfig::from_env())?;
//! let merge = StagedMerge::new(client).with_event_sink(Arc::new(LoggingEventSink::default()));
//!
//! let request = MergeRequest::new("scene.jpg", "person.jpg", "out/session-1");
//! match merge.run(&request).await {
//!     Ok(run) => println!("{}", run.report()),
//!     Err(failure) => eprintln!("{failure}; kept {:?}", failure.run.output_map()),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod client;
pub mod codec;
pub mod compositor;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{
        EditClient, EditJob, EditRequest, EditResult, EditTransport, HttpTransport, JobState,
        RemoteStatus, StageAction,
    };
    pub use crate::codec::ImageRef;
    pub use crate::compositor::Compositor;
    pub use crate::config::{EditServiceConfig, PollConfig};
    pub use crate::errors::{ErrorKind, PipelineFailure, StagemergeError};
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        MergeRequest, MergeState, OutputNaming, PipelineRun, RunStatus, StageName, StagePrompts,
        StagedMerge,
    };
}
