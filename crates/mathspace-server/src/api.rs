//! Request handlers and wire types

use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use mathspace_artifact::{IntentClassification, Rating};
use mathspace_context::{summarize_window, ContextDigest, NO_CURRENT_CODE};
use mathspace_core::{
    ContextOverview, Pipeline, PipelineError, PipelineRunResult, RunOutcome, StageTimings,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

/// `POST /api/chat` body; `prompt` is accepted as an alias
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ChatRequest {
    /// `instruction` if non-blank, else `prompt`, else empty
    #[must_use]
    pub fn instruction(&self) -> &str {
        [&self.instruction, &self.prompt]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|text| !text.trim().is_empty())
            .unwrap_or_default()
    }
}

/// Stage timings in seconds, named after the drafting roles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub generator: f64,
    pub analyzer: f64,
    pub improver: f64,
    pub total: f64,
}

impl From<StageTimings> for Timing {
    fn from(timings: StageTimings) -> Self {
        Self {
            generator: timings.generator,
            analyzer: timings.critic,
            improver: timings.reviser,
            total: timings.total,
        }
    }
}

/// Successful chat response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub status: String,
    pub request_id: String,
    pub artifact_locator: String,
    pub final_artifact_text: String,
    pub critique: String,
    pub rating: Rating,
    pub intent_classification: Option<IntentClassification>,
    pub extracted_objects: Vec<String>,
    pub attempts: usize,
    pub repairs: usize,
    pub timing: Timing,
}

impl ChatResponse {
    fn rendered(result: PipelineRunResult, locator: String) -> Self {
        Self {
            status: "success".to_string(),
            request_id: result.request_id.to_string(),
            artifact_locator: locator,
            final_artifact_text: result.final_artifact,
            critique: result.critique,
            rating: result.rating,
            intent_classification: result.intent,
            extracted_objects: result.objects,
            attempts: result.attempts,
            repairs: result.repairs,
            timing: result.timings.into(),
        }
    }
}

/// Failure envelope shared by every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub error: String,
    pub details: Option<String>,
    pub critique: Option<String>,
    pub intent_classification: Option<IntentClassification>,
}

impl FailureResponse {
    pub(crate) fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            critique: None,
            intent_classification: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub status: String,
    pub message: String,
}

/// Runtime facts reported by `GET /api/debug`
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    pub static_dir: PathBuf,
    pub work_dir: PathBuf,
    pub work_dir_exists: bool,
    pub scene_file_exists: bool,
    pub history_len: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugResponse {
    pub system: SystemInfo,
    pub context: ContextDigest,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
    })
}

pub(crate) async fn chat(
    State(pipeline): State<Arc<Pipeline>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let request: ChatRequest = parse_json(&body)?;
    let instruction = request.instruction().to_string();

    // The run owns the live scene and history until it finishes, so it
    // must not be dropped with the connection.
    let run = tokio::spawn(async move { pipeline.handle(&instruction).await });
    let result = match run.await {
        Ok(Ok(result)) => result,
        Ok(Err(failure)) => return Err(failure.into()),
        Err(join_error) if join_error.is_panic() => {
            let panic = join_error.into_panic();
            let message = format!("request panicked: {}", panic_message(panic.as_ref()));
            return Err(PipelineError::Internal(message).into());
        }
        Err(join_error) => return Err(PipelineError::Internal(join_error.to_string()).into()),
    };

    match &result.outcome {
        RunOutcome::Rendered { locator } => {
            let locator = locator.clone();
            Ok(Json(ChatResponse::rendered(result, locator)))
        }
        RunOutcome::Exhausted { .. } => Err(ApiError::exhausted(&result)),
    }
}

pub(crate) async fn reset(State(pipeline): State<Arc<Pipeline>>) -> Result<Json<ResetResponse>, ApiError> {
    pipeline.reset().await?;
    tracing::info!("Workspace reset");
    Ok(Json(ResetResponse {
        status: "success".to_string(),
        message: "workspace reset".to_string(),
    }))
}

pub(crate) async fn current_code(State(pipeline): State<Arc<Pipeline>>) -> Result<String, ApiError> {
    let code = pipeline.current_code()?;
    Ok(code.unwrap_or_else(|| NO_CURRENT_CODE.to_string()))
}

pub(crate) async fn context(State(pipeline): State<Arc<Pipeline>>) -> Json<ContextOverview> {
    Json(pipeline.context_overview())
}

pub(crate) async fn debug(State(pipeline): State<Arc<Pipeline>>) -> Json<DebugResponse> {
    let workspace = pipeline.workspace();
    let history = pipeline.store().load_all();

    Json(DebugResponse {
        system: SystemInfo {
            version: crate::VERSION,
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            static_dir: workspace.static_dir().to_path_buf(),
            work_dir: workspace.work_dir().to_path_buf(),
            work_dir_exists: workspace.work_dir().is_dir(),
            scene_file_exists: workspace.scene_path().is_file(),
            history_len: history.len(),
        },
        context: summarize_window(history.recent(pipeline.config().pipeline.digest_window)),
    })
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is required"));
    }

    serde_json::from_slice(body).map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic with non-string payload")
}
