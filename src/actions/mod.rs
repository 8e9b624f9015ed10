//! Action vocabulary and dispatch.
//!
//! The inference service speaks in resolution-independent action intents:
//! every coordinate is normalized to `[0, 1000]` on its axis. The
//! [`ActionVocabulary`] turns raw named calls into [`ActionIntent`]s and the
//! [`ActionDispatcher`] maps them onto the physical surface.

mod dispatch;
mod vocabulary;

pub use dispatch::{scale_coordinate, ActionDispatcher};
pub use vocabulary::{ActionSpec, ActionVocabulary, ClickAt, Scroll, Swipe, TypeText};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Upper bound of the normalized coordinate space (inclusive).
pub const COORDINATE_MAX: i32 = 1000;

/// Arguments of a raw action call, as sent on the wire.
pub type ActionArgs = BTreeMap<String, String>;

/// An abstract instruction produced by the inference service.
///
/// Coordinates are kept as signed integers so out-of-range values survive
/// parsing and can be rejected by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionIntent {
    Tap {
        x: i32,
        y: i32,
    },
    Swipe {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    },
    TypeText {
        text: String,
    },
    Unknown {
        name: String,
        args: ActionArgs,
    },
}

impl ActionIntent {
    /// Check that every coordinate lies in `[0, COORDINATE_MAX]`.
    pub fn coordinates_in_range(&self) -> bool {
        let ok = |v: i32| (0..=COORDINATE_MAX).contains(&v);
        match self {
            Self::Tap { x, y } => ok(*x) && ok(*y),
            Self::Swipe { x1, y1, x2, y2, .. } => ok(*x1) && ok(*y1) && ok(*x2) && ok(*y2),
            Self::TypeText { .. } | Self::Unknown { .. } => true,
        }
    }

    /// Short human-readable description for logs and UI events.
    pub fn describe(&self) -> String {
        match self {
            Self::Tap { x, y } => format!("tap at ({}, {})", x, y),
            Self::Swipe {
                x1,
                y1,
                x2,
                y2,
                duration_ms,
            } => format!(
                "swipe ({}, {}) -> ({}, {}) over {}ms",
                x1, y1, x2, y2, duration_ms
            ),
            Self::TypeText { text } => format!("type {} chars", text.chars().count()),
            Self::Unknown { name, .. } => format!("unknown action '{}'", name),
        }
    }
}

/// A raw action call as it appears in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCall {
    pub name: String,
    #[serde(default)]
    pub args: ActionArgs,
}

impl ActionCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: ActionArgs::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}

/// An action the service asked for: the wire name plus its parsed intent.
///
/// The name is kept so the result can be reported back under the exact
/// name the service used (a `scroll` call becomes a swipe intent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAction {
    pub name: String,
    pub intent: ActionIntent,
}

/// Outcome of one dispatched action. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    intent_name: String,
    succeeded: bool,
}

impl ActionResult {
    pub fn success(intent_name: impl Into<String>) -> Self {
        Self {
            intent_name: intent_name.into(),
            succeeded: true,
        }
    }

    pub fn failure(intent_name: impl Into<String>) -> Self {
        Self {
            intent_name: intent_name.into(),
            succeeded: false,
        }
    }

    pub fn intent_name(&self) -> &str {
        &self.intent_name
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// Wire status string.
    pub fn status(&self) -> &'static str {
        if self.succeeded {
            "success"
        } else {
            "failed"
        }
    }
}
