//! Pipeline controller
//!
//! Sequences one request through the stages:
//!
//! 1. snapshot the live scene and digest recent history (never fatal)
//! 2. classify intent (failures degrade to "unanalyzed")
//! 3. generate a draft, critique it, revise it (failures are fatal)
//! 4. render with a bounded repair loop
//! 5. persist a [`Turn`] for whatever was last attempted
//!
//! One request runs at a time. The admission lock covers the live scene
//! file, the history file and the output directory for the whole run, so a
//! stored turn always describes the script that was actually executed.

use crate::config::MathSpaceConfig;
use crate::error::{FailureReason, LlmError, PipelineError, PipelineFailure, StageFailure};
use crate::executor::{ExecutionAdapter, ManimRenderer};
use crate::llm::{ChatCompletionsClient, LanguageModel};
use crate::stages::{repair_message, Stage, StageContext, StageOutcome};
use crate::types::{PipelineRunResult, RequestId, RunOutcome, StageTimings};
use mathspace_artifact::{
    analyze, extract_code_block, extract_intent, extract_objects, extract_rating,
    truncate_with_ellipsis, IntentClassification,
};
use mathspace_context::{
    summarize_window, ContextDigest, ConversationStore, CurrentArtifactInspector,
    CurrentArtifactSnapshot, Turn, Workspace,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::Instrument;

/// Turns returned by [`Pipeline::context_overview`]
pub const OVERVIEW_TURNS: usize = 5;

/// Current context as seen by the next request
#[derive(Debug, Clone, Serialize)]
pub struct ContextOverview {
    pub digest: ContextDigest,
    pub snapshot: CurrentArtifactSnapshot,
    pub recent_turns: Vec<Turn>,
    pub history_len: usize,
}

/// State of the render loop once it stops
struct RenderLoop {
    artifact: String,
    outcome: RunOutcome,
    attempts: usize,
    repairs: usize,
}

/// The pipeline controller
///
/// Owns the configuration, the model and renderer handles, and the
/// on-disk workspace. Shared behind an `Arc` by the HTTP layer.
pub struct Pipeline {
    config: MathSpaceConfig,
    model: Arc<dyn LanguageModel>,
    renderer: Arc<dyn ExecutionAdapter>,
    workspace: Workspace,
    store: ConversationStore,
    inspector: CurrentArtifactInspector,
    admission: Mutex<()>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline over explicit model and renderer handles
    #[must_use]
    pub fn new(
        config: MathSpaceConfig,
        model: Arc<dyn LanguageModel>,
        renderer: Arc<dyn ExecutionAdapter>,
    ) -> Self {
        let workspace = Workspace::new(&config.paths.static_dir, &config.paths.work_dir);
        let store = ConversationStore::new(workspace.history_path(), config.pipeline.history_capacity);
        let inspector = CurrentArtifactInspector::new(workspace.scene_path(), config.pipeline.preview_chars);

        Self {
            config,
            model,
            renderer,
            workspace,
            store,
            inspector,
            admission: Mutex::new(()),
        }
    }

    /// Create a pipeline backed by the HTTP model client and the Manim
    /// renderer
    ///
    /// # Errors
    /// Returns `LlmError` if the HTTP client cannot be built.
    pub fn from_config(config: MathSpaceConfig) -> Result<Self, LlmError> {
        let model = Arc::new(ChatCompletionsClient::new(&config.llm)?);
        let renderer = Arc::new(ManimRenderer::new(&config.render, &config.paths.work_dir));
        Ok(Self::new(config, model, renderer))
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &MathSpaceConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Run one instruction end to end
    ///
    /// # Errors
    /// Returns a `PipelineFailure` for an empty instruction, a failed
    /// generator/critic/reviser stage or a workspace write failure. Render
    /// exhaustion is not an error: it is reported through
    /// [`RunOutcome::Exhausted`].
    pub async fn handle(&self, instruction: &str) -> Result<PipelineRunResult, PipelineFailure> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(PipelineError::InvalidInstruction.into());
        }

        let request_id = RequestId::new();
        let span = tracing::info_span!("request", request_id = %request_id);
        self.run(instruction, request_id).instrument(span).await
    }

    async fn run(
        &self,
        instruction: &str,
        request_id: RequestId,
    ) -> Result<PipelineRunResult, PipelineFailure> {
        let _admission = self.admission.lock().await;
        tracing::info!("Handling instruction: {}", truncate_with_ellipsis(instruction, 80));

        let snapshot = self.inspector.inspect();
        let history = self.store.load_all();
        let digest = summarize_window(history.recent(self.config.pipeline.digest_window));
        tracing::debug!(
            "Snapshot {} with {} object(s); digest over {} turn(s)",
            snapshot.status(),
            snapshot.objects().len(),
            digest.turns_considered
        );

        let mut ctx = StageContext {
            instruction,
            snapshot: &snapshot,
            digest: &digest,
            intent: None,
        };

        let intent = match self.intent_stage(&ctx).await {
            StageOutcome::Completed(intent) => {
                tracing::info!("Intent: {:?} ({:.2})", intent.intent, intent.confidence);
                Some(intent)
            }
            StageOutcome::Failed(failure) => {
                tracing::warn!("Intent classification degraded: {}", failure);
                None
            }
        };
        ctx.intent = intent.as_ref();

        let started = Instant::now();
        let draft = self
            .artifact_stage(Stage::Generator, ctx.generator_message())
            .await
            .into_result()
            .map_err(|failure| fatal(failure, intent.as_ref(), None))?;
        let generator_secs = StageTimings::secs(started.elapsed());

        let critic_started = Instant::now();
        let critique = self
            .text_stage(Stage::Critic, ctx.critic_message(&draft))
            .await
            .into_result()
            .map_err(|failure| fatal(failure, intent.as_ref(), None))?;
        let rating = extract_rating(&critique);
        let critic_secs = StageTimings::secs(critic_started.elapsed());
        tracing::info!("Critique rating: {}", rating);

        let reviser_started = Instant::now();
        let candidate = self
            .artifact_stage(Stage::Reviser, ctx.reviser_message(&draft, &critique, rating))
            .await
            .into_result()
            .map_err(|failure| fatal(failure, intent.as_ref(), Some(critique.as_str())))?;
        let reviser_secs = StageTimings::secs(reviser_started.elapsed());

        let render = self
            .render_with_repair(&request_id, candidate)
            .await
            .map_err(|error| {
                tracing::error!("Render loop aborted: {}", error);
                PipelineFailure::bare(error)
                    .with_intent(intent.clone())
                    .with_critique(Some(critique.clone()))
            })?;

        let timings = StageTimings {
            generator: generator_secs,
            critic: critic_secs,
            reviser: reviser_secs,
            total: StageTimings::secs(started.elapsed()),
        };

        let analysis = analyze(&render.artifact);
        let objects = extract_objects(&render.artifact);

        let turn = Turn::new(instruction, &render.artifact)
            .with_draft(truncate_with_ellipsis(&draft, self.config.pipeline.draft_storage_chars))
            .with_critique(&critique, rating)
            .with_intent(intent.clone())
            .with_analysis(analysis.clone(), objects.clone())
            .with_repairs(render.repairs)
            .with_locator(render.outcome.locator().map(str::to_string));
        if let Err(e) = self.store.append(turn) {
            tracing::error!("Failed to persist turn: {}", e);
        }

        match &render.outcome {
            RunOutcome::Rendered { locator } => {
                tracing::info!("Completed in {:.2}s: {}", timings.total, locator);
            }
            RunOutcome::Exhausted { failure } => {
                tracing::error!(
                    "Render failed after {} attempt(s): {}",
                    render.attempts,
                    truncate_with_ellipsis(failure.diagnostic(), 100)
                );
            }
        }

        Ok(PipelineRunResult {
            request_id,
            draft,
            critique,
            rating,
            final_artifact: render.artifact,
            outcome: render.outcome,
            intent,
            objects,
            analysis,
            repairs: render.repairs,
            attempts: render.attempts,
            timings,
        })
    }

    /// Execute `candidate`, repairing it after each failed attempt until
    /// the budget is spent
    async fn render_with_repair(
        &self,
        request_id: &RequestId,
        mut candidate: String,
    ) -> Result<RenderLoop, PipelineError> {
        let max_attempts = self.config.pipeline.max_attempts();
        let tail = self.config.pipeline.error_tail_chars;
        let output_name = request_id.output_name();
        let mut repairs = 0;
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::info!("Render attempt {}/{}", attempt, max_attempts);

            let script = self.workspace.write_scene(&candidate)?;
            let report = self.renderer.execute(&script, &output_name).await;

            let failure = match report.into_outcome(tail) {
                Ok(located) => {
                    let locator = self.workspace.publish_output(&located, &output_name)?;
                    return Ok(RenderLoop {
                        artifact: candidate,
                        outcome: RunOutcome::Rendered { locator },
                        attempts: attempt,
                        repairs,
                    });
                }
                Err(failure) => failure,
            };

            tracing::warn!(
                "Render attempt {} failed: {}",
                attempt,
                truncate_with_ellipsis(failure.diagnostic(), 100)
            );
            if attempt >= max_attempts {
                return Ok(RenderLoop {
                    artifact: candidate,
                    outcome: RunOutcome::Exhausted { failure },
                    attempts: attempt,
                    repairs,
                });
            }

            repairs += 1;
            let message = repair_message(failure.diagnostic(), &candidate);
            match self.artifact_stage(Stage::Repair, message).await {
                StageOutcome::Completed(fixed) => candidate = fixed,
                StageOutcome::Failed(repair_failure) => {
                    tracing::warn!("Repair stage failed, giving up: {}", repair_failure);
                    return Ok(RenderLoop {
                        artifact: candidate,
                        outcome: RunOutcome::Exhausted { failure },
                        attempts: attempt,
                        repairs,
                    });
                }
            }
        }
    }

    /// One model call under the request timeout
    async fn text_stage(&self, stage: Stage, user: String) -> StageOutcome<String> {
        let timeout = self.config.llm.request_timeout();
        let started = Instant::now();
        tracing::info!("Stage {} started", stage);

        let result = match tokio::time::timeout(timeout, self.model.complete(stage.request(user))).await {
            Err(_) => Err(StageFailure::from_llm(
                stage,
                &LlmError::Timeout {
                    secs: timeout.as_secs(),
                },
            )),
            Ok(Err(e)) => Err(StageFailure::from_llm(stage, &e)),
            Ok(Ok(text)) if text.trim().is_empty() => {
                Err(StageFailure::new(stage, FailureReason::EmptyResponse, "model returned no text"))
            }
            Ok(Ok(text)) => Ok(text),
        };

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(_) => tracing::info!("Stage {} finished ({:.2}s)", stage, elapsed),
            Err(failure) => tracing::debug!("Stage {} failed after {:.2}s: {}", stage, elapsed, failure),
        }
        result.into()
    }

    /// Model call whose response must contain a non-empty script
    async fn artifact_stage(&self, stage: Stage, user: String) -> StageOutcome<String> {
        let text = match self.text_stage(stage, user).await {
            StageOutcome::Completed(text) => text,
            StageOutcome::Failed(failure) => return StageOutcome::Failed(failure),
        };

        let artifact = extract_code_block(&text);
        if artifact.trim().is_empty() {
            return StageOutcome::Failed(StageFailure::new(
                stage,
                FailureReason::EmptyArtifact,
                "response contained no code",
            ));
        }
        StageOutcome::Completed(artifact)
    }

    async fn intent_stage(&self, ctx: &StageContext<'_>) -> StageOutcome<IntentClassification> {
        let text = match self.text_stage(Stage::Intent, ctx.intent_message()).await {
            StageOutcome::Completed(text) => text,
            StageOutcome::Failed(failure) => return StageOutcome::Failed(failure),
        };

        match extract_intent(&text) {
            Some(intent) => StageOutcome::Completed(intent),
            None => StageOutcome::Failed(StageFailure::new(
                Stage::Intent,
                FailureReason::Malformed,
                "response contained no intent JSON",
            )),
        }
    }

    /// Clear the live scene, history, media and published videos
    ///
    /// # Errors
    /// Returns `PipelineError::Workspace` if the layout cannot be reset.
    pub async fn reset(&self) -> Result<(), PipelineError> {
        let _admission = self.admission.lock().await;
        self.workspace.reset()?;
        Ok(())
    }

    /// Raw text of the live scene, `None` when there is none
    ///
    /// # Errors
    /// Returns `PipelineError::Workspace` if the file exists but cannot be
    /// read.
    pub fn current_code(&self) -> Result<Option<String>, PipelineError> {
        Ok(self.workspace.read_current_code()?)
    }

    /// Digest, live snapshot and the newest turns
    #[must_use]
    pub fn context_overview(&self) -> ContextOverview {
        let history = self.store.load_all();
        ContextOverview {
            digest: summarize_window(history.recent(self.config.pipeline.digest_window)),
            snapshot: self.inspector.inspect(),
            recent_turns: history.recent(OVERVIEW_TURNS).to_vec(),
            history_len: history.len(),
        }
    }
}

fn fatal(
    failure: StageFailure,
    intent: Option<&IntentClassification>,
    critique: Option<&str>,
) -> PipelineFailure {
    tracing::error!("Fatal stage failure: {}", failure);
    PipelineFailure::bare(failure)
        .with_intent(intent.cloned())
        .with_critique(critique.map(str::to_string))
}
