//! Sequencing of the three merge stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;

use super::outputs::{OutputNaming, RunLayout};
use super::prompts::StagePrompts;
use super::run::PipelineRun;
use super::stage::StageName;
use crate::client::{EditClient, EditRequest};
use crate::codec::ImageRef;
use crate::compositor::Compositor;
use crate::errors::{PipelineFailure, Result, StagemergeError};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::observability::SpanTimer;

/// Stage name reported when the input check fails.
pub const VALIDATE_STAGE: &str = "validate";

/// Inputs of one staged merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    context_image: ImageRef,
    person_image: ImageRef,
    output_dir: PathBuf,
    prompts: StagePrompts,
    naming: OutputNaming,
}

impl MergeRequest {
    /// Creates a request with default prompts and session naming.
    pub fn new(
        context_image: impl Into<ImageRef>,
        person_image: impl Into<ImageRef>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            context_image: context_image.into(),
            person_image: person_image.into(),
            output_dir: output_dir.into(),
            prompts: StagePrompts::default(),
            naming: OutputNaming::default(),
        }
    }

    /// Overrides the stage instructions.
    #[must_use]
    pub fn with_prompts(mut self, prompts: StagePrompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Selects the output naming scheme.
    #[must_use]
    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    /// The scene that receives the person.
    #[must_use]
    pub fn context_image(&self) -> &ImageRef {
        &self.context_image
    }

    /// The image whose person's appearance is transferred.
    #[must_use]
    pub fn person_image(&self) -> &ImageRef {
        &self.person_image
    }

    /// Directory receiving stage outputs.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Stage instructions.
    #[must_use]
    pub fn prompts(&self) -> &StagePrompts {
        &self.prompts
    }

    /// Output naming scheme.
    #[must_use]
    pub fn naming(&self) -> OutputNaming {
        self.naming
    }
}

/// Runs `AddContent -> Composite -> Swap` for a [`MergeRequest`].
///
/// Stages run strictly in order and each consumes only the outputs of
/// earlier stages. The first failure stops the run; outputs produced up to
/// that point are kept on disk and returned inside the [`PipelineFailure`].
#[derive(Clone)]
pub struct StagedMerge {
    client: EditClient,
    compositor: Compositor,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for StagedMerge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedMerge")
            .field("client", &self.client)
            .field("compositor", &self.compositor)
            .finish_non_exhaustive()
    }
}

impl StagedMerge {
    /// Creates an orchestrator using `client` for remote stages.
    pub fn new(client: EditClient) -> Self {
        Self {
            client,
            compositor: Compositor::new(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the compositor used for stage 2.
    #[must_use]
    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = compositor;
        self
    }

    /// Sends stage, run and job events to `events`.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.client = self.client.with_event_sink(Arc::clone(&events));
        self.events = events;
        self
    }

    /// The client used for remote stages.
    #[must_use]
    pub fn client(&self) -> &EditClient {
        &self.client
    }

    /// Executes all stages for `request`.
    ///
    /// Both input images are checked before any remote call is made, then
    /// stage files left in the output directory by an earlier run are
    /// removed. On success the returned run is `Done` and holds three
    /// outputs.
    pub async fn run(&self, request: &MergeRequest) -> Result<PipelineRun, PipelineFailure> {
        let mut run = PipelineRun::new(request.output_dir(), request.naming());
        let span = tracing::info_span!("staged_merge", run_id = %run.run_id());

        let outcome = self.drive(request, &mut run).instrument(span).await;

        self.events.emit(&PipelineEvent::PipelineFinished {
            run_id: run.run_id(),
            status: run.status(),
        });

        match outcome {
            Ok(()) => {
                tracing::info!(
                    run_id = %run.run_id(),
                    outputs = run.outputs().len(),
                    "Staged merge completed"
                );
                Ok(run)
            }
            Err((stage, error)) => {
                tracing::error!(
                    run_id = %run.run_id(),
                    stage = %stage,
                    kind = %error.kind(),
                    error = %error,
                    kept_outputs = run.outputs().len(),
                    "Staged merge failed"
                );
                Err(PipelineFailure::new(stage, error, run))
            }
        }
    }

    async fn drive(
        &self,
        request: &MergeRequest,
        run: &mut PipelineRun,
    ) -> std::result::Result<(), (String, StagemergeError)> {
        let layout = RunLayout::new(request.output_dir(), request.naming());

        if let Err(error) = Self::validate(request, &layout) {
            run.abort(&error);
            return Err((VALIDATE_STAGE.to_string(), error));
        }

        while let Some(stage) = run.state().stage() {
            let outcome = match Self::request_for(stage, request, run, &layout) {
                Ok(edit) => self.run_stage(stage, &edit, &layout, run).await,
                Err(error) => {
                    run.fail_stage(stage, &error);
                    Err(error)
                }
            };
            outcome.map_err(|error| (stage.to_string(), error))?;
        }

        Ok(())
    }

    fn validate(request: &MergeRequest, layout: &RunLayout) -> Result<()> {
        request.context_image().ensure_readable()?;
        request.person_image().ensure_readable()?;
        layout.prepare()
    }

    /// Builds the request for `stage` from the run's earlier outputs.
    ///
    /// The primary image is the upstream stage's output, or the context
    /// image for the first stage.
    fn request_for(
        stage: StageName,
        request: &MergeRequest,
        run: &PipelineRun,
        layout: &RunLayout,
    ) -> Result<EditRequest> {
        let prompts = request.prompts();
        let source = match stage.upstream() {
            None => request.context_image().clone(),
            Some(upstream) => run
                .outputs()
                .get(upstream)
                .cloned()
                .ok_or_else(|| StagemergeError::not_found(layout.path_for(upstream)))?,
        };

        Ok(match stage {
            StageName::AddContent => EditRequest::new(source, &prompts.add_content),
            StageName::Composite => EditRequest::new(source, &prompts.composite)
                .with_secondary(request.person_image().clone()),
            StageName::Swap => EditRequest::new(source, prompts.swap_instruction()),
        })
    }

    async fn run_stage(
        &self,
        stage: StageName,
        edit: &EditRequest,
        layout: &RunLayout,
        run: &mut PipelineRun,
    ) -> Result<()> {
        let run_id = run.run_id();
        run.begin_stage(stage, edit);
        self.events
            .emit(&PipelineEvent::StageStarted { run_id, stage });
        tracing::info!(stage = %stage, action = ?edit.action(), "Stage started");

        let timer = SpanTimer::start(stage.to_string());
        match self.execute(edit, &layout.path_for(stage)).await {
            Ok(output) => {
                let duration_ms = timer.elapsed_ms();
                tracing::info!(stage = %stage, output = %output, duration_ms, "Stage completed");
                self.events.emit(&PipelineEvent::StageCompleted {
                    run_id,
                    stage,
                    output: output.to_string(),
                    duration_ms,
                });
                run.complete_stage(stage, output);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(stage = %stage, kind = %error.kind(), error = %error, "Stage failed");
                self.events.emit(&PipelineEvent::StageFailed {
                    run_id,
                    stage,
                    kind: error.kind(),
                    message: error.to_string(),
                });
                run.fail_stage(stage, &error);
                Err(error)
            }
        }
    }

    /// Produces the output of one stage at `dest`.
    ///
    /// Requests carrying a second image are composed locally; the rest go
    /// to the editing service.
    async fn execute(&self, edit: &EditRequest, dest: &Path) -> Result<ImageRef> {
        edit.source().ensure_readable()?;

        let Some(secondary) = edit.secondary() else {
            return self.client.edit(edit, dest).await;
        };
        secondary.ensure_readable()?;

        let compositor = self.compositor.clone();
        let (left, right, dest) = (edit.source().clone(), secondary.clone(), dest.to_path_buf());
        tokio::task::spawn_blocking(move || compositor.compose_side_by_side(&left, &right, &dest))
            .await
            .map_err(|e| StagemergeError::Io(std::io::Error::other(e)))?
    }
}
