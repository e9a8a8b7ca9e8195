//! Test support for code built on stagemerge.
//!
//! This module provides:
//! - [`ScriptedTransport`], an in-memory editing service that replays a
//!   script of status responses
//! - [`write_test_image`] for solid-colour fixture images

mod fixtures;
mod scripted;

pub use fixtures::{solid_image_bytes, write_test_image};
pub use scripted::{PollStep, ScriptedTransport, SCRIPTED_POLL_URL};
