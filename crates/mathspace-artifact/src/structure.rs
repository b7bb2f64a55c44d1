//! Grammar-level structural analysis of scene scripts
//!
//! Parses the script with tree-sitter's Python grammar and collects a
//! small fact sheet used as context for later turns. A source tree that
//! contains any syntax error collapses to [`StructuralAnalysis::Unparseable`];
//! a partially filled fact sheet is never returned.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

/// Base-class token that marks the primary scene class
pub const SCENE_BASE_MARKER: &str = "Scene";

/// Bare constructor name that signals a coordinate system
pub const AXES_CONSTRUCTOR: &str = "Axes";

/// Attribute names counted as animation operations
pub const KNOWN_ANIMATIONS: [&str; 6] = ["Create", "Play", "Transform", "FadeIn", "FadeOut", "Rotate"];

/// Error text carried by the unparseable marker
pub const UNPARSEABLE_MESSAGE: &str = "scene source could not be parsed";

/// Structural facts extracted from a parsed scene script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneStructure {
    /// First class deriving from a `Scene`-like base
    pub scene_class: Option<String>,
    /// Every function/method definition, any depth
    pub methods: Vec<String>,
    /// Assignment targets that are bare identifiers
    pub variables: Vec<String>,
    /// Known animation calls, in source order (duplicates kept)
    pub animations: Vec<String>,
    /// Whether an `Axes(...)` call appears anywhere
    pub has_axes: bool,
}

/// Result of [`analyze`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StructuralAnalysis {
    /// Source parsed cleanly
    Parsed(SceneStructure),
    /// Source has syntax errors
    Unparseable {
        /// Always [`UNPARSEABLE_MESSAGE`]
        error: String,
    },
}

impl StructuralAnalysis {
    /// The error marker
    #[inline]
    #[must_use]
    pub fn unparseable() -> Self {
        Self::Unparseable {
            error: UNPARSEABLE_MESSAGE.to_string(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_unparseable(&self) -> bool {
        matches!(self, Self::Unparseable { .. })
    }

    /// Parsed structure, if any
    #[inline]
    #[must_use]
    pub fn structure(&self) -> Option<&SceneStructure> {
        match self {
            Self::Parsed(structure) => Some(structure),
            Self::Unparseable { .. } => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn has_axes(&self) -> bool {
        self.structure().is_some_and(|s| s.has_axes)
    }
}

/// Analyze a scene script. Never panics.
#[must_use]
pub fn analyze(source: &str) -> StructuralAnalysis {
    match parse_structure(source) {
        Some(structure) => StructuralAnalysis::Parsed(structure),
        None => StructuralAnalysis::unparseable(),
    }
}

fn parse_structure(source: &str) -> Option<SceneStructure> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .ok()?;

    let tree = parser.parse(source, None)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let mut structure = SceneStructure::default();
    let bytes = source.as_bytes();

    // Explicit stack: deeply nested input must not exhaust the call stack.
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        record_node(node, bytes, &mut structure);

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    Some(structure)
}

fn record_node(node: Node<'_>, source: &[u8], structure: &mut SceneStructure) {
    match node.kind() {
        "class_definition" => {
            if structure.scene_class.is_some() {
                return;
            }
            let derives_scene = node
                .child_by_field_name("superclasses")
                .is_some_and(|bases| {
                    let mut cursor = bases.walk();
                    let found = bases
                        .named_children(&mut cursor)
                        .any(|base| node_text(base, source).contains(SCENE_BASE_MARKER));
                    found
                });
            if derives_scene {
                structure.scene_class = field_text(node, "name", source);
            }
        }
        "function_definition" => {
            if let Some(name) = field_text(node, "name", source) {
                structure.methods.push(name);
            }
        }
        "assignment" => {
            if let Some(target) = node.child_by_field_name("left") {
                if target.kind() == "identifier" {
                    structure.variables.push(node_text(target, source).to_string());
                }
            }
        }
        "call" => {
            let Some(callee) = node.child_by_field_name("function") else {
                return;
            };
            match callee.kind() {
                "attribute" => {
                    if let Some(attr) = field_text(callee, "attribute", source) {
                        if KNOWN_ANIMATIONS.contains(&attr.as_str()) {
                            structure.animations.push(attr);
                        }
                    }
                }
                "identifier" => {
                    if node_text(callee, source) == AXES_CONSTRUCTOR {
                        structure.has_axes = true;
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
}

fn node_text<'s>(node: Node<'_>, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

fn field_text(node: Node<'_>, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|child| node_text(child, source).to_string())
        .filter(|text| !text.is_empty())
}
