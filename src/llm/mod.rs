//! Client layer for the action-inference service.
//!
//! This module provides a trait-based abstraction over the service transport,
//! with Gemini's `generateContent` API as the primary implementation.
//!
//! A conversation is an ordered list of [`ConversationTurn`]s. Each turn
//! carries ordered [`Part`]s: text, an image observation, an action request
//! made by the model, or the result of a dispatched action.

mod error;
mod gemini;

pub use error::{classify_http_status, LlmError, LlmErrorKind};
pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::actions::{ActionCall, ActionResult};
use crate::surface::Snapshot;

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One semantic payload within a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Plain text
    Text(String),
    /// Surface observation (sent inline, base64-encoded)
    Image(Snapshot),
    /// Action requested by the model
    ActionRequest(ActionCall),
    /// Result of the action dispatched after the previous request
    ActionResult(ActionResult),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_action_request(&self) -> Option<&ActionCall> {
        match self {
            Part::ActionRequest(call) => Some(call),
            _ => None,
        }
    }
}

/// A turn in the conversation with the inference service.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

/// Declaration of an action in the service's function-calling format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Token usage information (if provided by the service).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create a usage object ensuring `total_tokens` is consistent.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// A complete request to the inference service.
#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
    /// Standing instructions for the model
    pub system_instruction: &'a str,
    /// Full conversation, oldest turn first; the last turn is the new user turn
    pub contents: &'a [ConversationTurn],
    /// Actions the model may request
    pub actions: &'a [FunctionDeclaration],
}

/// Response from the inference service.
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    /// The model's turn, parts in the order the service returned them
    pub turn: ConversationTurn,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Trait for inference service transports.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Send one request. Implementations make a single attempt.
    async fn generate(&self, request: InferenceRequest<'_>) -> Result<InferenceResponse, LlmError>;
}
