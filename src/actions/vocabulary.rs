//! The closed set of actions the inference service may request.
//!
//! Each action is an [`ActionSpec`]: a name, a description and argument
//! schema advertised to the service, and a parser from raw string arguments
//! to an [`ActionIntent`]. The registry is fixed once built but can be
//! extended at construction time.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use super::{ActionArgs, ActionCall, ActionIntent, RequestedAction};
use crate::llm::FunctionDeclaration;

/// Duration of the fixed-magnitude swipe behind `scroll`, and the default
/// for `swipe` when the service does not give one.
pub const DEFAULT_SWIPE_MS: u64 = 300;

/// Trait for actions the service can request.
pub trait ActionSpec: Send + Sync {
    /// The wire name of this action.
    fn name(&self) -> &str;

    /// A description of what this action does.
    fn description(&self) -> &str;

    /// JSON schema for the action's arguments.
    fn parameters_schema(&self) -> Value;

    /// Parse raw arguments into an intent.
    fn parse(&self, args: &ActionArgs) -> Result<ActionIntent, String>;
}

fn required<'a>(args: &'a ActionArgs, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .map(String::as_str)
        .ok_or_else(|| format!("Missing '{}' argument", key))
}

/// Parse an integer argument. Accepts `"500"` as well as `"500.0"`.
fn int_arg(args: &ActionArgs, key: &str) -> Result<i32, String> {
    let raw = required(args, key)?.trim();
    if let Ok(v) = raw.parse::<i32>() {
        return Ok(v);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= i32::MAX as f64)
        .map(|v| v.round() as i32)
        .ok_or_else(|| format!("Argument '{}' is not an integer: {}", key, raw))
}

/// Tap at a normalized position.
pub struct ClickAt;

impl ActionSpec for ClickAt {
    fn name(&self) -> &str {
        "click_at"
    }

    fn description(&self) -> &str {
        "Tap at a position on the screen. Coordinates are normalized to 0-1000 on each axis, (0,0) is top-left and (1000,1000) is bottom-right."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "x": { "type": "integer", "description": "Horizontal position, 0-1000" },
                "y": { "type": "integer", "description": "Vertical position, 0-1000" }
            },
            "required": ["x", "y"]
        })
    }

    fn parse(&self, args: &ActionArgs) -> Result<ActionIntent, String> {
        Ok(ActionIntent::Tap {
            x: int_arg(args, "x")?,
            y: int_arg(args, "y")?,
        })
    }
}

/// Scroll the content in a direction with a fixed-magnitude swipe.
///
/// The direction names where the content moves into view: `down` drags the
/// finger upwards so content further down the page appears.
pub struct Scroll;

impl ActionSpec for Scroll {
    fn name(&self) -> &str {
        "scroll"
    }

    fn description(&self) -> &str {
        "Scroll the screen content in a direction (up, down, left or right) by a fixed amount."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "direction": {
                    "type": "string",
                    "enum": ["up", "down", "left", "right"],
                    "description": "Direction to scroll"
                }
            },
            "required": ["direction"]
        })
    }

    fn parse(&self, args: &ActionArgs) -> Result<ActionIntent, String> {
        let direction = required(args, "direction")?;
        let ((x1, y1), (x2, y2)) = match direction.trim().to_lowercase().as_str() {
            "down" => ((500, 700), (500, 300)),
            "up" => ((500, 300), (500, 700)),
            "right" => ((700, 500), (300, 500)),
            "left" => ((300, 500), (700, 500)),
            other => return Err(format!("Invalid scroll direction: {}", other)),
        };
        Ok(ActionIntent::Swipe {
            x1,
            y1,
            x2,
            y2,
            duration_ms: DEFAULT_SWIPE_MS,
        })
    }
}

/// Inject text into the focused input.
pub struct TypeText;

impl ActionSpec for TypeText {
    fn name(&self) -> &str {
        "type_text"
    }

    fn description(&self) -> &str {
        "Type text into the currently focused input field. Tap the field first if nothing is focused."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to type" }
            },
            "required": ["text"]
        })
    }

    fn parse(&self, args: &ActionArgs) -> Result<ActionIntent, String> {
        Ok(ActionIntent::TypeText {
            text: required(args, "text")?.to_string(),
        })
    }
}

/// Explicit swipe between two normalized points. Identical endpoints with a
/// long duration act as a long-press.
pub struct Swipe;

impl ActionSpec for Swipe {
    fn name(&self) -> &str {
        "swipe"
    }

    fn description(&self) -> &str {
        "Swipe from one point to another (coordinates normalized to 0-1000). Use the same start and end point with a long duration for a long-press."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "x1": { "type": "integer", "description": "Start horizontal position, 0-1000" },
                "y1": { "type": "integer", "description": "Start vertical position, 0-1000" },
                "x2": { "type": "integer", "description": "End horizontal position, 0-1000" },
                "y2": { "type": "integer", "description": "End vertical position, 0-1000" },
                "duration_ms": { "type": "integer", "description": "Gesture duration in milliseconds (default: 300)" }
            },
            "required": ["x1", "y1", "x2", "y2"]
        })
    }

    fn parse(&self, args: &ActionArgs) -> Result<ActionIntent, String> {
        let duration_ms = match args.get("duration_ms") {
            Some(_) => {
                let ms = int_arg(args, "duration_ms")?;
                u64::try_from(ms).map_err(|_| format!("Negative duration: {}", ms))?
            }
            None => DEFAULT_SWIPE_MS,
        };
        Ok(ActionIntent::Swipe {
            x1: int_arg(args, "x1")?,
            y1: int_arg(args, "y1")?,
            x2: int_arg(args, "x2")?,
            y2: int_arg(args, "y2")?,
            duration_ms,
        })
    }
}

/// Registry of actions advertised to the inference service.
pub struct ActionVocabulary {
    actions: HashMap<String, Arc<dyn ActionSpec>>,
}

impl ActionVocabulary {
    /// Create the standard vocabulary: `click_at`, `scroll`, `type_text`, `swipe`.
    pub fn standard() -> Self {
        Self::empty()
            .with(ClickAt)
            .with(Scroll)
            .with(TypeText)
            .with(Swipe)
    }

    /// Create an empty vocabulary (no built-in actions).
    pub fn empty() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register an action, replacing any existing action with the same name.
    pub fn with(mut self, spec: impl ActionSpec + 'static) -> Self {
        self.actions.insert(spec.name().to_string(), Arc::new(spec));
        self
    }

    /// Action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Declarations in the service's function-calling format, sorted by name
    /// so that requests are stable.
    pub fn function_declarations(&self) -> Vec<FunctionDeclaration> {
        self.names()
            .into_iter()
            .filter_map(|name| self.actions.get(name))
            .map(|spec| FunctionDeclaration {
                name: spec.name().to_string(),
                description: spec.description().to_string(),
                parameters: spec.parameters_schema(),
            })
            .collect()
    }

    /// Resolve a raw call into a requested action.
    ///
    /// Unregistered names and arguments that fail to parse both become
    /// [`ActionIntent::Unknown`], which the dispatcher reports as failed.
    pub fn resolve(&self, call: &ActionCall) -> RequestedAction {
        let unknown = || ActionIntent::Unknown {
            name: call.name.clone(),
            args: call.args.clone(),
        };

        let intent = match self.actions.get(&call.name) {
            Some(spec) => match spec.parse(&call.args) {
                Ok(intent) => intent,
                Err(e) => {
                    tracing::warn!(action = %call.name, "Malformed action arguments: {}", e);
                    unknown()
                }
            },
            None => {
                tracing::warn!(action = %call.name, "Action not in vocabulary");
                unknown()
            }
        };

        RequestedAction {
            name: call.name.clone(),
            intent,
        }
    }
}

impl Default for ActionVocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_click_at() {
        let vocab = ActionVocabulary::standard();
        let call = ActionCall::new("click_at")
            .with_arg("x", "500")
            .with_arg("y", "250.4");
        let action = vocab.resolve(&call);
        assert_eq!(action.name, "click_at");
        assert_eq!(action.intent, ActionIntent::Tap { x: 500, y: 250 });
    }

    #[test]
    fn scroll_becomes_fixed_swipe() {
        let vocab = ActionVocabulary::standard();
        let action = vocab.resolve(&ActionCall::new("scroll").with_arg("direction", "down"));
        assert_eq!(action.name, "scroll");
        assert_eq!(
            action.intent,
            ActionIntent::Swipe {
                x1: 500,
                y1: 700,
                x2: 500,
                y2: 300,
                duration_ms: DEFAULT_SWIPE_MS
            }
        );
    }

    #[test]
    fn unknown_name_is_preserved() {
        let vocab = ActionVocabulary::standard();
        let call = ActionCall::new("open_app").with_arg("package", "com.example");
        let action = vocab.resolve(&call);
        assert_eq!(
            action.intent,
            ActionIntent::Unknown {
                name: "open_app".to_string(),
                args: call.args.clone()
            }
        );
    }

    #[test]
    fn malformed_arguments_become_unknown() {
        let vocab = ActionVocabulary::standard();
        let bad_scroll = vocab.resolve(&ActionCall::new("scroll").with_arg("direction", "sideways"));
        assert!(matches!(bad_scroll.intent, ActionIntent::Unknown { .. }));

        let missing_y = vocab.resolve(&ActionCall::new("click_at").with_arg("x", "10"));
        assert!(matches!(missing_y.intent, ActionIntent::Unknown { .. }));
    }

    #[test]
    fn out_of_range_coordinates_survive_parsing() {
        let vocab = ActionVocabulary::standard();
        let action = vocab.resolve(
            &ActionCall::new("click_at")
                .with_arg("x", "1500")
                .with_arg("y", "-3"),
        );
        assert_eq!(action.intent, ActionIntent::Tap { x: 1500, y: -3 });
        assert!(!action.intent.coordinates_in_range());
    }

    #[test]
    fn swipe_defaults_duration() {
        let vocab = ActionVocabulary::standard();
        let action = vocab.resolve(
            &ActionCall::new("swipe")
                .with_arg("x1", "100")
                .with_arg("y1", "100")
                .with_arg("x2", "100")
                .with_arg("y2", "100"),
        );
        assert_eq!(
            action.intent,
            ActionIntent::Swipe {
                x1: 100,
                y1: 100,
                x2: 100,
                y2: 100,
                duration_ms: DEFAULT_SWIPE_MS
            }
        );
    }

    #[test]
    fn declarations_are_sorted_and_complete() {
        let vocab = ActionVocabulary::standard();
        let names: Vec<String> = vocab
            .function_declarations()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["click_at", "scroll", "swipe", "type_text"]);
    }

    #[test]
    fn empty_vocabulary_resolves_everything_to_unknown() {
        let vocab = ActionVocabulary::empty();
        assert!(vocab.names().is_empty());
        let action = vocab.resolve(&ActionCall::new("click_at").with_arg("x", "1").with_arg("y", "1"));
        assert!(matches!(action.intent, ActionIntent::Unknown { .. }));
    }
}
