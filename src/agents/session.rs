//! Per-run state of one plan execution.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::DEFAULT_MAX_ROUNDS;
use crate::llm::ConversationTurn;
use crate::surface::Snapshot;

/// Cancellation flag for a session, settable from any task.
///
/// The execution loop only reads it between rounds; setting it never
/// interrupts an inference call or action already in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// State of one execution of an approved plan.
///
/// # Invariants
/// - Owned by exactly one running loop; never reused for a second run.
/// - `round_index` starts at 1 and only grows, by one per action round.
/// - `history` is append-only.
#[derive(Debug)]
pub struct ExecutionSession {
    id: Uuid,
    original_request: String,
    approved_plan: String,
    history: Vec<ConversationTurn>,
    round_index: u32,
    max_rounds: u32,
    cancel: CancelHandle,
    latest_snapshot: Snapshot,
}

impl ExecutionSession {
    /// Create a fresh session from the user's request, the approved plan and
    /// the surface as it looked when the plan was approved.
    pub fn new(
        original_request: impl Into<String>,
        approved_plan: impl Into<String>,
        initial_snapshot: Snapshot,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_request: original_request.into(),
            approved_plan: approved_plan.into(),
            history: Vec::new(),
            round_index: 1,
            max_rounds: DEFAULT_MAX_ROUNDS,
            cancel: CancelHandle::new(),
            latest_snapshot: initial_snapshot,
        }
    }

    /// Override the round limit.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn original_request(&self) -> &str {
        &self.original_request
    }

    pub fn approved_plan(&self) -> &str {
        &self.approved_plan
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn round_index(&self) -> u32 {
        self.round_index
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    pub fn latest_snapshot(&self) -> &Snapshot {
        &self.latest_snapshot
    }

    /// A handle that can cancel this session from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn history_mut(&mut self) -> &mut Vec<ConversationTurn> {
        &mut self.history
    }

    pub(crate) fn advance_round(&mut self) {
        self.round_index += 1;
    }

    pub(crate) fn replace_snapshot(&mut self, snapshot: Snapshot) {
        self.latest_snapshot = snapshot;
    }
}
