use mathspace_artifact::{IntentKind, Rating};
use mathspace_core::{
    FailureReason, PipelineError, RenderFailure, RunOutcome, Stage, TIMEOUT_MESSAGE, UNANALYZED,
};
use mathspace_test_utils::{
    code_reply, critique_reply, init_tracing, intent_reply, scripted_pipeline, test_config,
    RenderStep, ScriptedModel, ScriptedRenderer, AXES_SCENE, CIRCLE_SCENE,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    _dir: tempfile::TempDir,
    model: Arc<ScriptedModel>,
    renderer: Arc<ScriptedRenderer>,
    pipeline: mathspace_core::Pipeline,
}

fn harness(model: ScriptedModel, steps: Vec<RenderStep>, fallback: RenderStep) -> Harness {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let model = Arc::new(model);
    let renderer = Arc::new(ScriptedRenderer::new(&config.paths.work_dir, steps, fallback));
    let pipeline = scripted_pipeline(config, &model, &renderer);
    Harness {
        _dir: dir,
        model,
        renderer,
        pipeline,
    }
}

fn last_user_message(model: &ScriptedModel, stage: Stage) -> String {
    model
        .calls()
        .into_iter()
        .filter(|c| c.stage == stage)
        .last()
        .map(|c| c.user)
        .unwrap()
}

#[tokio::test]
async fn test_happy_path_renders_and_persists() {
    let h = harness(ScriptedModel::happy_path(CIRCLE_SCENE), vec![], RenderStep::Succeed);

    let result = h.pipeline.handle("draw a red circle").await.unwrap();

    assert!(result.succeeded());
    let expected_locator = format!("/static/{}.mp4", result.request_id.output_name());
    assert_eq!(result.outcome.locator(), Some(expected_locator.as_str()));
    assert_eq!(result.attempts, 1);
    assert_eq!(result.repairs, 0);
    assert_eq!(result.rating, Rating::Pass);
    assert_eq!(result.final_artifact, CIRCLE_SCENE.trim());
    assert_eq!(result.objects, vec!["circle".to_string()]);
    assert_eq!(
        result.analysis.structure().and_then(|s| s.scene_class.as_deref()),
        Some("MathScene")
    );
    assert_eq!(result.intent.as_ref().map(|i| i.intent), Some(IntentKind::Create));
    assert_eq!(
        h.model.stage_sequence(),
        vec![Stage::Intent, Stage::Generator, Stage::Critic, Stage::Reviser]
    );

    let published = h
        .pipeline
        .workspace()
        .static_dir()
        .join(format!("{}.mp4", result.request_id.output_name()));
    assert!(published.exists());

    let history = h.pipeline.store().load_all();
    let turn = history.last().unwrap();
    assert!(turn.success());
    assert_eq!(turn.artifact_locator(), Some(expected_locator.as_str()));
    assert_eq!(turn.instruction, "draw a red circle");
    assert_eq!(turn.final_artifact, CIRCLE_SCENE.trim());
}

#[tokio::test]
async fn test_always_failing_renderer_exhausts_budget() {
    let model = ScriptedModel::happy_path(CIRCLE_SCENE)
        .with_reply(Stage::Repair, code_reply("x = 1\n"))
        .with_reply(Stage::Repair, code_reply("x = 2\n"));
    let h = harness(model, vec![], RenderStep::fail("Traceback\nNameError: name 'Circel' is not defined"));

    let result = h.pipeline.handle("draw a circle").await.unwrap();

    assert!(!result.succeeded());
    assert_eq!(result.attempts, 3);
    assert_eq!(h.renderer.attempts(), 3);
    assert_eq!(h.model.calls_for(Stage::Repair), 2);
    assert_eq!(result.repairs, 2);
    assert_eq!(result.final_artifact, "x = 2");
    assert!(result.outcome.diagnostic().unwrap().ends_with("is not defined"));

    let turn = h.pipeline.store().load_all().last().cloned().unwrap();
    assert!(!turn.success());
    assert_eq!(turn.artifact_locator(), None);
    assert_eq!(turn.final_artifact, "x = 2");
    assert_eq!(turn.repairs, 2);
}

#[tokio::test]
async fn test_success_on_second_attempt_uses_one_repair() {
    let model = ScriptedModel::happy_path(CIRCLE_SCENE).with_reply(Stage::Repair, code_reply(AXES_SCENE));
    let h = harness(model, vec![RenderStep::fail("SyntaxError")], RenderStep::Succeed);

    let result = h.pipeline.handle("plot a dot on axes").await.unwrap();

    assert!(result.succeeded());
    assert_eq!(result.attempts, 2);
    assert_eq!(h.model.calls_for(Stage::Repair), 1);
    assert_eq!(
        h.renderer.executed_scripts(),
        vec![CIRCLE_SCENE.trim().to_string(), AXES_SCENE.trim().to_string()]
    );
    assert!(result.analysis.has_axes());

    let repair_request = last_user_message(&h.model, Stage::Repair);
    assert!(repair_request.contains("SyntaxError"));
    assert!(repair_request.contains("circle = Circle()"));

    let turn = h.pipeline.store().load_all().last().cloned().unwrap();
    assert!(turn.success());
    assert_eq!(turn.repairs, 1);
    assert_eq!(turn.final_artifact, AXES_SCENE.trim());
}

#[tokio::test]
async fn test_timeout_and_missing_output_feed_repair_loop() {
    let model = ScriptedModel::happy_path(CIRCLE_SCENE)
        .with_reply(Stage::Repair, code_reply(CIRCLE_SCENE))
        .with_reply(Stage::Repair, code_reply(CIRCLE_SCENE));
    let h = harness(model, vec![RenderStep::Timeout, RenderStep::NoOutput], RenderStep::Succeed);

    let result = h.pipeline.handle("draw a circle").await.unwrap();

    assert!(result.succeeded());
    assert_eq!(result.attempts, 3);
    let repairs: Vec<String> = h
        .model
        .calls()
        .into_iter()
        .filter(|c| c.stage == Stage::Repair)
        .map(|c| c.user)
        .collect();
    assert!(repairs[0].contains(TIMEOUT_MESSAGE));
    assert!(repairs[1].contains("produced no video"));
}

#[tokio::test]
async fn test_repair_failure_ends_loop_and_persists() {
    let model = ScriptedModel::happy_path(CIRCLE_SCENE).with_failure(Stage::Repair, "vendor down");
    let h = harness(model, vec![], RenderStep::fail("boom"));

    let result = h.pipeline.handle("draw a circle").await.unwrap();

    assert_eq!(result.attempts, 1);
    assert_eq!(result.repairs, 1);
    assert!(matches!(
        result.outcome,
        RunOutcome::Exhausted {
            failure: RenderFailure::Exited { exit_code: 1, .. }
        }
    ));
    assert_eq!(h.pipeline.store().load_all().len(), 1);
}

#[tokio::test]
async fn test_intent_failure_degrades() {
    let model = ScriptedModel::new()
        .with_failure(Stage::Intent, "timeout")
        .with_reply(Stage::Generator, code_reply(CIRCLE_SCENE))
        .with_reply(Stage::Critic, critique_reply("PASS"))
        .with_reply(Stage::Reviser, code_reply(CIRCLE_SCENE));
    let h = harness(model, vec![], RenderStep::Succeed);

    let result = h.pipeline.handle("draw a circle").await.unwrap();

    assert!(result.succeeded());
    assert!(result.intent.is_none());
    assert!(last_user_message(&h.model, Stage::Generator).contains(UNANALYZED));
    assert!(h.pipeline.store().load_all().last().unwrap().intent.is_none());
}

#[tokio::test]
async fn test_non_json_intent_degrades() {
    let model = ScriptedModel::new()
        .with_reply(Stage::Intent, "The user probably wants to CREATE something.")
        .with_reply(Stage::Generator, code_reply(CIRCLE_SCENE))
        .with_reply(Stage::Critic, critique_reply("PASS"))
        .with_reply(Stage::Reviser, code_reply(CIRCLE_SCENE));
    let h = harness(model, vec![], RenderStep::Succeed);

    let result = h.pipeline.handle("draw a circle").await.unwrap();

    assert!(result.intent.is_none());
    assert!(last_user_message(&h.model, Stage::Critic).contains(UNANALYZED));
}

#[tokio::test]
async fn test_generator_failure_is_fatal_without_turn() {
    let model = ScriptedModel::new()
        .with_reply(Stage::Intent, intent_reply("CREATE", &[]))
        .with_failure(Stage::Generator, "connection reset");
    let h = harness(model, vec![], RenderStep::Succeed);

    let failure = h.pipeline.handle("draw a circle").await.unwrap_err();

    assert_eq!(failure.error.stage(), Some(Stage::Generator));
    assert!(failure.intent.is_some());
    assert!(failure.critique.is_none());
    assert_eq!(h.renderer.attempts(), 0);
    assert!(h.pipeline.store().load_all().is_empty());
}

#[tokio::test]
async fn test_empty_generator_artifact_is_fatal() {
    let model = ScriptedModel::new()
        .with_reply(Stage::Intent, intent_reply("CREATE", &[]))
        .with_reply(Stage::Generator, "```python\n```");
    let h = harness(model, vec![], RenderStep::Succeed);

    let failure = h.pipeline.handle("draw a circle").await.unwrap_err();

    match failure.error {
        PipelineError::Stage(stage_failure) => {
            assert_eq!(stage_failure.stage, Stage::Generator);
            assert_eq!(stage_failure.reason, FailureReason::EmptyArtifact);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_reviser_failure_carries_critique() {
    let model = ScriptedModel::new()
        .with_reply(Stage::Intent, intent_reply("CREATE", &[]))
        .with_reply(Stage::Generator, code_reply(CIRCLE_SCENE))
        .with_reply(Stage::Critic, critique_reply("FAIL"))
        .with_failure(Stage::Reviser, "rate limited");
    let h = harness(model, vec![], RenderStep::Succeed);

    let failure = h.pipeline.handle("draw a circle").await.unwrap_err();

    assert_eq!(failure.error.stage(), Some(Stage::Reviser));
    assert!(failure.critique.unwrap().contains("[Overall Rating] FAIL"));
    assert!(h.pipeline.store().load_all().is_empty());
}

#[tokio::test]
async fn test_empty_instruction_is_rejected_before_any_stage() {
    let h = harness(ScriptedModel::happy_path(CIRCLE_SCENE), vec![], RenderStep::Succeed);

    let failure = h.pipeline.handle("   \n").await.unwrap_err();

    assert!(failure.error.is_client_error());
    assert!(h.model.calls().is_empty());
}

#[tokio::test]
async fn test_python_fence_wins_over_generic_fence() {
    let reply = "```\nprint('generic')\n```\nActually:\n```python\nx = 1\n```";
    let model = ScriptedModel::new()
        .with_reply(Stage::Intent, intent_reply("CREATE", &[]))
        .with_reply(Stage::Generator, reply)
        .with_reply(Stage::Critic, critique_reply("PASS"))
        .with_reply(Stage::Reviser, reply);
    let h = harness(model, vec![], RenderStep::Succeed);

    let result = h.pipeline.handle("set x").await.unwrap();

    assert_eq!(result.draft, "x = 1");
    assert_eq!(result.final_artifact, "x = 1");
}

#[tokio::test]
async fn test_lowercase_rating_is_recognized() {
    let model = ScriptedModel::new()
        .with_reply(Stage::Intent, intent_reply("MODIFY", &["circle"]))
        .with_reply(Stage::Generator, code_reply(CIRCLE_SCENE))
        .with_reply(Stage::Critic, "[Overall Rating] warn\nText overlaps the circle.")
        .with_reply(Stage::Reviser, code_reply(CIRCLE_SCENE));
    let h = harness(model, vec![], RenderStep::Succeed);

    let result = h.pipeline.handle("make it blue").await.unwrap();

    assert_eq!(result.rating, Rating::Warn);
    assert!(last_user_message(&h.model, Stage::Reviser).contains("[Rating]\nWARN"));
}

#[tokio::test]
async fn test_second_request_sees_previous_scene() {
    let model = ScriptedModel::happy_path(CIRCLE_SCENE)
        .with_reply(Stage::Intent, intent_reply("ADD", &["circle"]))
        .with_reply(Stage::Generator, code_reply(AXES_SCENE))
        .with_reply(Stage::Critic, critique_reply("PASS"))
        .with_reply(Stage::Reviser, code_reply(AXES_SCENE));
    let h = harness(model, vec![], RenderStep::Succeed);

    h.pipeline.handle("draw a circle").await.unwrap();
    let second = h.pipeline.handle("add a dot").await.unwrap();

    let generator_input = last_user_message(&h.model, Stage::Generator);
    assert!(generator_input.contains("circle = Circle()"));
    assert!(generator_input.contains("[Existing objects]\ncircle"));
    assert!(generator_input.contains("objects: circle"));
    assert_eq!(second.intent.map(|i| i.intent), Some(IntentKind::Add));

    let overview = h.pipeline.context_overview();
    assert_eq!(overview.history_len, 2);
    assert_eq!(overview.recent_turns.len(), 2);
    assert!(overview.snapshot.has_axes());
}

#[tokio::test]
async fn test_history_is_capped() {
    let mut model = ScriptedModel::new();
    for _ in 0..3 {
        model = model
            .with_reply(Stage::Intent, intent_reply("CREATE", &[]))
            .with_reply(Stage::Generator, code_reply(CIRCLE_SCENE))
            .with_reply(Stage::Critic, critique_reply("PASS"))
            .with_reply(Stage::Reviser, code_reply(CIRCLE_SCENE));
    }
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).with_history_capacity(2);
    let model = Arc::new(model);
    let renderer = Arc::new(ScriptedRenderer::always_succeed(&config.paths.work_dir));
    let pipeline = scripted_pipeline(config, &model, &renderer);

    for instruction in ["one", "two", "three"] {
        pipeline.handle(instruction).await.unwrap();
    }

    let names: Vec<String> = pipeline
        .store()
        .load_all()
        .iter()
        .map(|t| t.instruction.clone())
        .collect();
    assert_eq!(names, vec!["two".to_string(), "three".to_string()]);
}

#[tokio::test]
async fn test_concurrent_requests_are_serialized() {
    let mut model = ScriptedModel::new();
    for scene in [CIRCLE_SCENE, AXES_SCENE] {
        model = model
            .with_reply(Stage::Intent, intent_reply("CREATE", &[]))
            .with_reply(Stage::Generator, code_reply(scene))
            .with_reply(Stage::Critic, critique_reply("PASS"))
            .with_reply(Stage::Reviser, code_reply(scene));
    }
    let h = harness(model, vec![], RenderStep::Succeed);
    let pipeline = Arc::new(h.pipeline);

    let (a, b) = tokio::join!(pipeline.handle("first"), pipeline.handle("second"));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.succeeded() && b.succeeded());
    assert_ne!(a.request_id, b.request_id);

    let sequence = h.model.stage_sequence();
    assert_eq!(
        sequence,
        vec![
            Stage::Intent,
            Stage::Generator,
            Stage::Critic,
            Stage::Reviser,
            Stage::Intent,
            Stage::Generator,
            Stage::Critic,
            Stage::Reviser,
        ]
    );

    let history = pipeline.store().load_all();
    assert_eq!(history.len(), 2);
    for turn in history.iter() {
        assert!(turn.success());
    }
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let h = harness(ScriptedModel::happy_path(CIRCLE_SCENE), vec![], RenderStep::Succeed);
    let result = h.pipeline.handle("draw a circle").await.unwrap();
    assert!(result.succeeded());

    h.pipeline.reset().await.unwrap();

    assert_eq!(h.pipeline.current_code().unwrap(), None);
    let overview = h.pipeline.context_overview();
    assert_eq!(overview.history_len, 0);
    assert!(overview.digest.is_empty());
    let videos = std::fs::read_dir(h.pipeline.workspace().static_dir())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "mp4"))
        .count();
    assert_eq!(videos, 0);

    h.pipeline.reset().await.unwrap();
    assert_eq!(h.pipeline.context_overview().history_len, 0);
}

fn timed_harness(model: ScriptedModel) -> Harness {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path()).with_request_timeout(Duration::from_secs(1));
    let model = Arc::new(model);
    let renderer = Arc::new(ScriptedRenderer::always_succeed(&config.paths.work_dir));
    let pipeline = scripted_pipeline(config, &model, &renderer);
    Harness {
        _dir: dir,
        model,
        renderer,
        pipeline,
    }
}

#[tokio::test]
async fn test_hanging_generator_times_out_fatally() {
    let model = ScriptedModel::new()
        .with_reply(Stage::Intent, intent_reply("CREATE", &[]))
        .with_hang(Stage::Generator);
    let h = timed_harness(model);

    let started = std::time::Instant::now();
    let failure = h.pipeline.handle("draw a circle").await.unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    match failure.error {
        PipelineError::Stage(stage_failure) => {
            assert_eq!(stage_failure.stage, Stage::Generator);
            assert_eq!(stage_failure.reason, FailureReason::Timeout);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.renderer.attempts(), 0);
    assert!(h.pipeline.store().load_all().is_empty());
}

#[tokio::test]
async fn test_hanging_intent_stage_degrades() {
    let model = ScriptedModel::new()
        .with_hang(Stage::Intent)
        .with_reply(Stage::Generator, code_reply(CIRCLE_SCENE))
        .with_reply(Stage::Critic, critique_reply("PASS"))
        .with_reply(Stage::Reviser, code_reply(CIRCLE_SCENE));
    let h = timed_harness(model);

    let result = h.pipeline.handle("draw a circle").await.unwrap();

    assert!(result.succeeded());
    assert!(result.intent.is_none());
    assert!(last_user_message(&h.model, Stage::Generator).contains(UNANALYZED));
}
