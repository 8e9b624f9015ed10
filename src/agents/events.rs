//! Events reported upward while a session runs.

use serde::Serialize;

use super::LoopOutcome;
use crate::actions::{ActionResult, RequestedAction};

/// Session lifecycle events, the loop's only upward interface.
///
/// Emitted strictly in round order on a single channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new round passed the cancellation and round-limit checks.
    RoundStarted { index: u32 },
    /// The service asked for an action; it is about to be dispatched.
    ActionDispatched { action: RequestedAction },
    /// The dispatched action finished.
    ActionOutcome { result: ActionResult },
    /// Degraded continuation (e.g. a stale snapshot is being reused).
    Warning { message: String },
    Completed { text: String },
    Cancelled,
    RoundLimitExceeded,
    Failed { error: String },
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Cancelled | Self::RoundLimitExceeded | Self::Failed { .. }
        )
    }
}

impl From<&LoopOutcome> for SessionEvent {
    fn from(outcome: &LoopOutcome) -> Self {
        match outcome {
            LoopOutcome::Completed { final_text } => Self::Completed {
                text: final_text.clone(),
            },
            LoopOutcome::Cancelled => Self::Cancelled,
            LoopOutcome::RoundLimitExceeded => Self::RoundLimitExceeded,
            LoopOutcome::Failed { error } => Self::Failed {
                error: error.to_string(),
            },
        }
    }
}
