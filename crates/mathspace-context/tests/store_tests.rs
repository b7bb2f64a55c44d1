use mathspace_artifact::{analyze, ContextRelation, IntentClassification, IntentKind, Rating};
use mathspace_context::{
    summarize, ConversationStore, CurrentArtifactInspector, CurrentArtifactSnapshot, Turn, Workspace,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const SCENE: &str = "class MathScene(Scene):\n    def construct(self):\n        circle = Circle()\n        self.play(Create(circle))\n";

fn rendered_turn() -> Turn {
    let intent = IntentClassification::new(IntentKind::Create, 0.9)
        .with_targets(vec!["circle".to_string()])
        .with_relation(ContextRelation::Independent);

    Turn::new("draw a red circle", SCENE)
        .with_draft("draft...")
        .with_critique("Looks fine.\n[Overall Rating] PASS", Rating::Pass)
        .with_intent(Some(intent))
        .with_analysis(analyze(SCENE), vec!["circle".to_string()])
        .with_repairs(1)
        .with_locator(Some("/static/video_0a1b2c3d.mp4".to_string()))
}

#[test]
fn test_turn_round_trips_field_equal() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::new(dir.path().join("conversation.json"), 15);
    let turn = rendered_turn();

    store.append(turn.clone()).unwrap();

    let history = store.read_history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.last(), Some(&turn));
}

#[test]
fn test_failed_turn_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::new(dir.path().join("conversation.json"), 15);
    let turn = Turn::new("broken", "class (").with_analysis(analyze("class ("), Vec::new());

    store.append(turn.clone()).unwrap();

    let stored = store.load_all();
    let last = stored.last().unwrap();
    assert!(!last.success());
    assert!(last.analysis.is_unparseable());
    assert_eq!(last, &turn);
}

#[test]
fn test_reset_twice_yields_same_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path().join("static"), dir.path().join("temp_gen"));
    workspace.ensure_layout().unwrap();
    workspace.write_scene(SCENE).unwrap();
    let store = ConversationStore::new(workspace.history_path(), 15);
    store.append(rendered_turn()).unwrap();

    let inspector = CurrentArtifactInspector::new(workspace.scene_path(), 500);

    workspace.reset().unwrap();
    let first = (inspector.inspect(), summarize(&store.load_all()));
    workspace.reset().unwrap();
    let second = (inspector.inspect(), summarize(&store.load_all()));

    assert_eq!(first, second);
    assert_eq!(first.0, CurrentArtifactSnapshot::NoArtifact);
    assert!(first.1.is_empty());
    assert_eq!(workspace.read_current_code().unwrap(), None);
}

#[test]
fn test_digest_follows_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = ConversationStore::new(dir.path().join("conversation.json"), 15);
    store.append(rendered_turn()).unwrap();
    store
        .append(Turn::new("add another square", "").with_analysis(analyze(""), vec!["sq".to_string()]))
        .unwrap();

    let digest = summarize(&store.load_all());
    assert_eq!(digest.objects, vec!["circle".to_string(), "sq".to_string()]);
    assert_eq!(digest.turns_considered, 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_history_never_exceeds_capacity(capacity in 1usize..6, appends in 0usize..12) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path().join("conversation.json"), capacity);

        for i in 0..appends {
            store.append(Turn::new(format!("turn {i}"), "")).unwrap();
        }

        let history = store.load_all();
        prop_assert_eq!(history.len(), appends.min(capacity));

        let expected: Vec<String> = (appends.saturating_sub(capacity)..appends)
            .map(|i| format!("turn {i}"))
            .collect();
        let actual: Vec<String> = history.iter().map(|t| t.instruction.clone()).collect();
        prop_assert_eq!(actual, expected);
    }
}
