//! Core types for the execution loop.

use thiserror::Error;

use crate::llm::LlmError;

/// Terminal result of one execution session. Exactly one per session.
#[derive(Debug)]
pub enum LoopOutcome {
    /// The service answered with text instead of an action
    Completed { final_text: String },
    /// The user stopped the session between rounds
    Cancelled,
    /// `max_rounds` inference calls were made without a final answer
    RoundLimitExceeded,
    /// The inference service failed; the session stopped immediately
    Failed { error: InferError },
}

impl LoopOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

impl std::fmt::Display for LoopOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed { final_text } => write!(f, "completed: {}", final_text),
            Self::Cancelled => write!(f, "cancelled"),
            Self::RoundLimitExceeded => write!(f, "round limit exceeded"),
            Self::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Errors from a single inference round.
#[derive(Debug, Error)]
pub enum InferError {
    #[error("Inference service error: {0}")]
    Service(#[from] LlmError),

    #[error("Inference service returned neither an action nor text")]
    EmptyResponse,
}

/// Errors building or starting the execution loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("No actuator configured")]
    MissingActuator,

    #[error("No snapshot provider configured")]
    MissingSnapshotProvider,

    #[error("No inference backend configured")]
    MissingInferenceBackend,

    #[error("Another session is still running on this actuator")]
    SessionActive,
}
