//! Testing utilities for the MathSpace workspace
//!
//! Shared fakes and fixtures:
//! - [`ScriptedModel`]: per-stage canned replies with call recording
//! - [`ScriptedRenderer`]: per-attempt render outcomes that materialise a
//!   fake video on success
//! - fixture helpers for configs and model replies

#![allow(missing_docs)]

use async_trait::async_trait;
use mathspace_core::{
    CompletionRequest, ExecutionAdapter, ExecutionReport, LanguageModel, LlmError,
    MathSpaceConfig, Pipeline, Stage,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A scene that parses and names one object
pub const CIRCLE_SCENE: &str = "from manim import *\n\nclass MathScene(Scene):\n    def construct(self):\n        circle = Circle()\n        self.play(Create(circle))\n";

/// A scene that parses, uses axes and names two objects
pub const AXES_SCENE: &str = "from manim import *\n\nclass MathScene(Scene):\n    def construct(self):\n        ax = Axes()\n        dot = Dot()\n        self.add(ax, dot)\n        self.play(FadeIn(dot))\n";

/// Wrap `code` in a python-tagged fence
#[must_use]
pub fn code_reply(code: &str) -> String {
    format!("Here is the scene:\n```python\n{code}```\nEnjoy!")
}

/// Intent-stage reply for `intent` (e.g. `"ADD"`)
#[must_use]
pub fn intent_reply(intent: &str, targets: &[&str]) -> String {
    let body = serde_json::json!({
        "intent": intent,
        "target_objects": targets,
        "context_relation": "continuous",
        "layout_hints": [],
        "explicit_requirements": [],
        "implicit_needs": [],
        "confidence": 0.9
    });
    format!("Analysis:\n{body}\n")
}

/// Critic reply carrying `rating`
#[must_use]
pub fn critique_reply(rating: &str) -> String {
    format!("[Overall Rating] {rating}\n[Details]\n1. Intent match: fine")
}

/// Config rooted in `dir` with a dummy API key
#[must_use]
pub fn test_config(dir: &Path) -> MathSpaceConfig {
    MathSpaceConfig::new()
        .with_paths(dir.join("static"), dir.join("temp_gen"))
        .with_api_key("test-key")
}

/// Pipeline over scripted fakes
#[must_use]
pub fn scripted_pipeline(
    config: MathSpaceConfig,
    model: &Arc<ScriptedModel>,
    renderer: &Arc<ScriptedRenderer>,
) -> Pipeline {
    Pipeline::new(config, model.clone(), renderer.clone())
}

/// Initialise a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail(String),
    Hang,
}

/// Language model returning queued replies per stage
///
/// Each call pops the next reply queued for its stage. A stage with an
/// empty queue fails with `LlmError::Unavailable`. A queued hang never
/// answers, leaving the caller's timeout to end the call.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<HashMap<Stage, VecDeque<Scripted>>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies for a full run that renders `code`: intent, generator,
    /// critic (PASS) and reviser
    #[must_use]
    pub fn happy_path(code: &str) -> Self {
        Self::new()
            .with_reply(Stage::Intent, intent_reply("CREATE", &[]))
            .with_reply(Stage::Generator, code_reply(code))
            .with_reply(Stage::Critic, critique_reply("PASS"))
            .with_reply(Stage::Reviser, code_reply(code))
    }

    /// Queue a reply for `stage`
    #[must_use]
    pub fn with_reply(self, stage: Stage, reply: impl Into<String>) -> Self {
        self.push(stage, Scripted::Reply(reply.into()));
        self
    }

    /// Queue a failure for `stage`
    #[must_use]
    pub fn with_failure(self, stage: Stage, message: impl Into<String>) -> Self {
        self.push(stage, Scripted::Fail(message.into()));
        self
    }

    /// Queue a call for `stage` that never completes
    #[must_use]
    pub fn with_hang(self, stage: Stage) -> Self {
        self.push(stage, Scripted::Hang);
        self
    }

    fn push(&self, stage: Stage, scripted: Scripted) {
        self.replies.lock().entry(stage).or_default().push_back(scripted);
    }

    /// Every request received, in order
    #[must_use]
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests received for `stage`
    #[must_use]
    pub fn calls_for(&self, stage: Stage) -> usize {
        self.calls.lock().iter().filter(|c| c.stage == stage).count()
    }

    /// Stages in call order
    #[must_use]
    pub fn stage_sequence(&self) -> Vec<Stage> {
        self.calls.lock().iter().map(|c| c.stage).collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let stage = request.stage;
        self.calls.lock().push(request);

        let next = self.replies.lock().get_mut(&stage).and_then(VecDeque::pop_front);
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(LlmError::Unavailable(message)),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(LlmError::Unavailable(format!("no scripted reply for {stage}"))),
        }
    }
}

/// Outcome of one scripted render attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStep {
    /// Write a fake video and report it
    Succeed,
    /// Exit non-zero with `stderr`
    Fail { exit_code: i32, stderr: String },
    /// Behave like a killed render
    Timeout,
    /// Exit 0 without producing a video
    NoOutput,
}

impl RenderStep {
    #[must_use]
    pub fn fail(stderr: impl Into<String>) -> Self {
        Self::Fail {
            exit_code: 1,
            stderr: stderr.into(),
        }
    }
}

/// Renderer replaying a script of outcomes
///
/// Once the script is used up every further attempt repeats `fallback`.
#[derive(Debug)]
pub struct ScriptedRenderer {
    media_dir: PathBuf,
    steps: Mutex<VecDeque<RenderStep>>,
    fallback: RenderStep,
    delay: Duration,
    executed: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    #[must_use]
    pub fn new(media_dir: impl Into<PathBuf>, steps: Vec<RenderStep>, fallback: RenderStep) -> Self {
        Self {
            media_dir: media_dir.into(),
            steps: Mutex::new(steps.into()),
            fallback,
            delay: Duration::ZERO,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` before each attempt completes
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn always_succeed(media_dir: impl Into<PathBuf>) -> Self {
        Self::new(media_dir, Vec::new(), RenderStep::Succeed)
    }

    #[must_use]
    pub fn always_fail(media_dir: impl Into<PathBuf>, stderr: impl Into<String>) -> Self {
        Self::new(media_dir, Vec::new(), RenderStep::fail(stderr))
    }

    /// Number of render attempts so far
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.executed.lock().len()
    }

    /// Script contents seen at each attempt
    #[must_use]
    pub fn executed_scripts(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

#[async_trait]
impl ExecutionAdapter for ScriptedRenderer {
    async fn execute(&self, script: &Path, output_name: &str) -> ExecutionReport {
        let source = std::fs::read_to_string(script).unwrap_or_default();
        self.executed.lock().push(source);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let step = self.steps.lock().pop_front().unwrap_or_else(|| self.fallback.clone());
        match step {
            RenderStep::Succeed => {
                let dir = self.media_dir.join("videos").join("current_scene").join("480p15");
                let path = dir.join(format!("{output_name}.mp4"));
                let written = std::fs::create_dir_all(&dir).and_then(|()| std::fs::write(&path, b"fake video"));
                match written {
                    Ok(()) => ExecutionReport::rendered(path),
                    Err(e) => ExecutionReport::exited(1, "", format!("fake render failed: {e}")),
                }
            }
            RenderStep::Fail { exit_code, stderr } => ExecutionReport::exited(exit_code, "", stderr),
            RenderStep::Timeout => ExecutionReport::timed_out(),
            RenderStep::NoOutput => ExecutionReport::exited(0, "Rendered nothing", ""),
        }
    }
}
