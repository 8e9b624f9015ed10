//! One "what next?" exchange with the action-inference service.

use std::sync::Arc;

use crate::actions::{ActionResult, ActionVocabulary, RequestedAction};
use crate::agents::{ExecutionSession, InferError};
use crate::llm::{ConversationTurn, FunctionDeclaration, InferenceBackend, InferenceRequest, Part};

/// What the service decided for this round.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    ActionRequested { action: RequestedAction },
    TerminalText { text: String },
}

/// Builds round requests, calls the service once, and interprets the answer.
///
/// # Algorithm
/// 1. Round 1 sends the request and approved plan, then the snapshot
/// 2. Later rounds send the previous action's result, then the new snapshot
/// 3. Only the first part of the answer decides the turn: an action request
///    wins, otherwise text ends the session, otherwise the answer is empty
///
/// No retry is attempted; the caller decides what an error means.
pub struct InferenceClient {
    backend: Arc<dyn InferenceBackend>,
    vocabulary: ActionVocabulary,
    declarations: Vec<FunctionDeclaration>,
    system_instruction: String,
}

impl InferenceClient {
    pub fn new(backend: Arc<dyn InferenceBackend>, vocabulary: ActionVocabulary) -> Self {
        let declarations = vocabulary.function_declarations();
        let system_instruction = build_system_instruction(&declarations);
        Self {
            backend,
            vocabulary,
            declarations,
            system_instruction,
        }
    }

    pub fn vocabulary(&self) -> &ActionVocabulary {
        &self.vocabulary
    }

    /// Run one inference round against the session's latest snapshot.
    ///
    /// On success the new user turn and the model's turn are appended to the
    /// session history. On failure the history is left untouched.
    pub async fn infer(
        &self,
        session: &mut ExecutionSession,
        pending_action_result: Option<ActionResult>,
    ) -> Result<ModelTurn, InferError> {
        let user_turn = build_user_turn(session, pending_action_result);
        session.history_mut().push(user_turn);

        let request = InferenceRequest {
            system_instruction: &self.system_instruction,
            contents: session.history(),
            actions: &self.declarations,
        };

        let response = match self.backend.generate(request).await {
            Ok(response) => response,
            Err(e) => {
                session.history_mut().pop();
                return Err(InferError::Service(e));
            }
        };

        if let Some(usage) = response.usage {
            tracing::debug!(
                session_id = %session.id(),
                round = session.round_index(),
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Inference usage"
            );
        }

        let decided = match response.turn.parts.first() {
            Some(Part::ActionRequest(call)) => Some(ModelTurn::ActionRequested {
                action: self.vocabulary.resolve(call),
            }),
            Some(Part::Text(text)) => Some(ModelTurn::TerminalText { text: text.clone() }),
            _ => None,
        };

        let Some(turn) = decided else {
            tracing::warn!(
                session_id = %session.id(),
                finish_reason = ?response.finish_reason,
                "Inference response had no action and no text"
            );
            session.history_mut().pop();
            return Err(InferError::EmptyResponse);
        };

        session.history_mut().push(response.turn);
        Ok(turn)
    }
}

fn build_user_turn(
    session: &ExecutionSession,
    pending_action_result: Option<ActionResult>,
) -> ConversationTurn {
    let lead = match pending_action_result {
        Some(result) => Part::ActionResult(result),
        None => Part::Text(format!(
            "{}\n\nApproved plan:\n{}",
            session.original_request(),
            session.approved_plan()
        )),
    };
    ConversationTurn::user(vec![lead, Part::Image(session.latest_snapshot().clone())])
}

/// Build the standing instructions sent with every request.
fn build_system_instruction(declarations: &[FunctionDeclaration]) -> String {
    let action_descriptions = declarations
        .iter()
        .map(|d| format!("- **{}**: {}", d.name, d.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You operate a device screen on behalf of the user to carry out an approved plan.
Each turn you receive a screenshot of the current screen, and after the first turn the result of your previous action.

## Available Actions
{action_descriptions}

## Rules
1. Request exactly one action per turn
2. Coordinates are normalized: 0-1000 on each axis, (0,0) is the top-left corner
3. Tap an input field before typing into it
4. If an action failed, look at the new screenshot and adapt
5. When the plan is complete, or cannot be completed, reply with a short plain-text summary and no action"#,
        action_descriptions = action_descriptions
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionCall, ActionIntent};
    use crate::llm::{InferenceResponse, LlmError, Role};
    use crate::surface::Snapshot;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays one canned response and records the last turn of every request.
    struct CannedBackend {
        response: Mutex<Option<Result<InferenceResponse, LlmError>>>,
        seen: Mutex<Vec<ConversationTurn>>,
    }

    impl CannedBackend {
        fn new(response: Result<Vec<Part>, LlmError>) -> Self {
            Self {
                response: Mutex::new(Some(response.map(|parts| InferenceResponse {
                    turn: ConversationTurn::model(parts),
                    finish_reason: None,
                    usage: None,
                }))),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InferenceBackend for CannedBackend {
        async fn generate(
            &self,
            request: InferenceRequest<'_>,
        ) -> Result<InferenceResponse, LlmError> {
            if let Some(last) = request.contents.last() {
                self.seen.lock().unwrap().push(last.clone());
            }
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(LlmError::network_error("exhausted".to_string())))
        }
    }

    fn session() -> ExecutionSession {
        ExecutionSession::new("Turn on wifi", "1. Open settings", Snapshot::jpeg(vec![7]))
    }

    #[tokio::test]
    async fn first_round_sends_request_plan_then_image() {
        let backend = Arc::new(CannedBackend::new(Ok(vec![Part::text("Done")])));
        let client = InferenceClient::new(backend.clone(), ActionVocabulary::standard());
        let mut session = session();

        let turn = client.infer(&mut session, None).await.unwrap();
        assert_eq!(
            turn,
            ModelTurn::TerminalText {
                text: "Done".to_string()
            }
        );

        let seen = backend.seen.lock().unwrap();
        let sent = &seen[0];
        assert_eq!(sent.role, Role::User);
        assert_eq!(sent.parts.len(), 2);
        let text = sent.parts[0].as_text().unwrap();
        assert!(text.contains("Turn on wifi"));
        assert!(text.contains("1. Open settings"));
        assert_eq!(sent.parts[1], Part::Image(Snapshot::jpeg(vec![7])));
    }

    #[tokio::test]
    async fn later_rounds_send_result_then_image() {
        let backend = Arc::new(CannedBackend::new(Ok(vec![Part::text("Could not type")])));
        let client = InferenceClient::new(backend.clone(), ActionVocabulary::standard());
        let mut session = session();

        client
            .infer(&mut session, Some(ActionResult::failure("type_text")))
            .await
            .unwrap();

        let seen = backend.seen.lock().unwrap();
        assert_eq!(
            seen[0].parts,
            vec![
                Part::ActionResult(ActionResult::failure("type_text")),
                Part::Image(Snapshot::jpeg(vec![7])),
            ]
        );
    }

    #[tokio::test]
    async fn success_appends_user_and_model_turns() {
        let backend = Arc::new(CannedBackend::new(Ok(vec![Part::ActionRequest(
            ActionCall::new("click_at").with_arg("x", "500").with_arg("y", "500"),
        )])));
        let client = InferenceClient::new(backend, ActionVocabulary::standard());
        let mut session = session();

        let turn = client.infer(&mut session, None).await.unwrap();
        assert_eq!(
            turn,
            ModelTurn::ActionRequested {
                action: RequestedAction {
                    name: "click_at".to_string(),
                    intent: ActionIntent::Tap { x: 500, y: 500 },
                }
            }
        );
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].role, Role::User);
        assert_eq!(session.history()[1].role, Role::Model);
    }

    #[tokio::test]
    async fn action_in_first_part_wins_over_text() {
        let backend = Arc::new(CannedBackend::new(Ok(vec![
            Part::ActionRequest(ActionCall::new("scroll").with_arg("direction", "down")),
            Part::text("I will scroll down"),
        ])));
        let client = InferenceClient::new(backend, ActionVocabulary::standard());
        let mut session = session();

        let turn = client.infer(&mut session, None).await.unwrap();
        assert!(matches!(turn, ModelTurn::ActionRequested { .. }));
    }

    #[tokio::test]
    async fn service_error_leaves_history_untouched() {
        let backend = Arc::new(CannedBackend::new(Err(LlmError::from_status(
            401,
            "bad key".to_string(),
        ))));
        let client = InferenceClient::new(backend, ActionVocabulary::standard());
        let mut session = session();

        let err = client.infer(&mut session, None).await.unwrap_err();
        assert!(matches!(err, InferError::Service(_)));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn empty_response_is_a_protocol_error() {
        let backend = Arc::new(CannedBackend::new(Ok(vec![])));
        let client = InferenceClient::new(backend, ActionVocabulary::standard());
        let mut session = session();

        let err = client.infer(&mut session, None).await.unwrap_err();
        assert!(matches!(err, InferError::EmptyResponse));
        assert!(session.history().is_empty());
    }

    #[test]
    fn system_instruction_lists_actions() {
        let declarations = ActionVocabulary::standard().function_declarations();
        let instruction = build_system_instruction(&declarations);
        for name in ["click_at", "scroll", "type_text", "swipe"] {
            assert!(instruction.contains(name), "missing {}", name);
        }
    }
}
