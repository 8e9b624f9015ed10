//! Execution loop - drives one session from approved plan to terminal outcome.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::actions::{ActionDispatcher, ActionResult, ActionVocabulary};
use crate::agents::{
    CancelHandle, ExecutionSession, InferenceClient, LoopError, LoopOutcome, ModelTurn,
    SessionEvent,
};
use crate::config::DEFAULT_SETTLE_DELAY;
use crate::llm::InferenceBackend;
use crate::surface::{Actuator, SnapshotProvider};

/// Actuators with a session in progress, keyed by allocation address.
static ACTIVE_ACTUATORS: Mutex<BTreeSet<usize>> = Mutex::new(BTreeSet::new());

/// Drives rounds of inference and actuation for one surface.
///
/// # Algorithm
/// At the top of every round:
/// 1. If the session was cancelled, stop with `Cancelled`
/// 2. If `round_index > max_rounds`, stop with `RoundLimitExceeded`
/// 3. Ask the service what to do; an error stops with `Failed`
/// 4. For an action: dispatch it, wait the settle delay, capture a new
///    snapshot (keeping the old one if capture fails), advance the round
/// 5. For text: stop with `Completed`
///
/// # Invariants
/// - At most `max_rounds` inference calls per session
/// - Exactly one terminal outcome; nothing is inferred or dispatched after it
/// - At most one session runs at a time per actuator, across all loops
///   built on it
///
/// Events go out on an unbounded channel. A session emits at most four
/// events per round plus one terminal event, so the channel stays bounded
/// by the round limit and the loop never waits on a slow reader.
pub struct ExecutionLoop {
    inference: InferenceClient,
    dispatcher: ActionDispatcher,
    actuator: Arc<dyn Actuator>,
    snapshots: Arc<dyn SnapshotProvider>,
    settle_delay: Duration,
}

/// A session running in its own task.
pub struct RunningSession {
    pub session_id: Uuid,
    /// Lifecycle events, in round order, ending with one terminal event
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    /// Stops the session at the next round boundary
    pub cancel: CancelHandle,
    pub handle: JoinHandle<LoopOutcome>,
}

fn actuator_key(actuator: &Arc<dyn Actuator>) -> usize {
    Arc::as_ptr(actuator) as *const () as usize
}

fn active_actuators() -> std::sync::MutexGuard<'static, BTreeSet<usize>> {
    ACTIVE_ACTUATORS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Marks an actuator as busy until dropped.
struct ActiveLease(usize);

impl ActiveLease {
    fn acquire(actuator: &Arc<dyn Actuator>) -> Result<Self, LoopError> {
        let key = actuator_key(actuator);
        if !active_actuators().insert(key) {
            return Err(LoopError::SessionActive);
        }
        Ok(Self(key))
    }
}

impl Drop for ActiveLease {
    fn drop(&mut self) {
        active_actuators().remove(&self.0);
    }
}

impl ExecutionLoop {
    pub fn builder() -> ExecutionLoopBuilder {
        ExecutionLoopBuilder::default()
    }

    /// Whether any session, from this loop or another, is running on this
    /// loop's actuator.
    pub fn is_busy(&self) -> bool {
        active_actuators().contains(&actuator_key(&self.actuator))
    }

    /// Spawn the session on the current runtime.
    ///
    /// Rejected with [`LoopError::SessionActive`] while a previous session on
    /// the same actuator has not reached a terminal outcome.
    pub fn start(self: &Arc<Self>, session: ExecutionSession) -> Result<RunningSession, LoopError> {
        let lease = ActiveLease::acquire(&self.actuator)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = session.id();
        let cancel = session.cancel_handle();

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.drive(session, &tx, lease).await });

        Ok(RunningSession {
            session_id,
            events: rx,
            cancel,
            handle,
        })
    }

    /// Run the session to completion on the calling task.
    ///
    /// The receiver may be drained during or after the run.
    pub async fn run(
        &self,
        session: ExecutionSession,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<LoopOutcome, LoopError> {
        let lease = ActiveLease::acquire(&self.actuator)?;
        Ok(self.drive(session, &events, lease).await)
    }

    async fn drive(
        &self,
        mut session: ExecutionSession,
        events: &mpsc::UnboundedSender<SessionEvent>,
        lease: ActiveLease,
    ) -> LoopOutcome {
        let session_id = session.id();
        tracing::info!(
            session_id = %session_id,
            max_rounds = session.max_rounds(),
            "Execution session started"
        );

        let mut pending: Option<ActionResult> = None;

        let outcome = loop {
            if session.is_cancelled() {
                break LoopOutcome::Cancelled;
            }
            if session.round_index() > session.max_rounds() {
                break LoopOutcome::RoundLimitExceeded;
            }

            let round = session.round_index();
            tracing::debug!(session_id = %session_id, round = round, "Round started");
            emit(events, SessionEvent::RoundStarted { index: round });

            let turn = match self.inference.infer(&mut session, pending.take()).await {
                Ok(turn) => turn,
                Err(error) => {
                    tracing::error!(session_id = %session_id, round = round, "Inference failed: {}", error);
                    break LoopOutcome::Failed { error };
                }
            };

            let action = match turn {
                ModelTurn::TerminalText { text } => {
                    break LoopOutcome::Completed { final_text: text };
                }
                ModelTurn::ActionRequested { action } => action,
            };

            tracing::info!(
                session_id = %session_id,
                round = round,
                action = %action.name,
                "Dispatching {}",
                action.intent.describe()
            );
            emit(
                events,
                SessionEvent::ActionDispatched {
                    action: action.clone(),
                },
            );

            let result = self
                .dispatcher
                .dispatch(&action, self.actuator.surface_dimensions())
                .await;
            emit(
                events,
                SessionEvent::ActionOutcome {
                    result: result.clone(),
                },
            );

            tokio::time::sleep(self.settle_delay).await;

            match self.snapshots.capture().await {
                Ok(snapshot) => session.replace_snapshot(snapshot),
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        round = round,
                        "Snapshot capture failed, reusing previous snapshot: {}",
                        e
                    );
                    emit(
                        events,
                        SessionEvent::Warning {
                            message: format!("Snapshot capture failed, reusing previous snapshot: {}", e),
                        },
                    );
                }
            }

            pending = Some(result);
            session.advance_round();
        };

        tracing::info!(
            session_id = %session_id,
            rounds = session.round_index(),
            outcome = %outcome,
            "Execution session finished"
        );
        // Free the actuator before anyone can observe the terminal event
        drop(lease);
        emit(events, SessionEvent::from(&outcome));

        outcome
    }
}

fn emit(events: &mpsc::UnboundedSender<SessionEvent>, event: SessionEvent) {
    if events.send(event).is_err() {
        tracing::debug!("Session event receiver dropped");
    }
}

/// Builder for [`ExecutionLoop`]. Every collaborator must be supplied.
pub struct ExecutionLoopBuilder {
    backend: Option<Arc<dyn InferenceBackend>>,
    actuator: Option<Arc<dyn Actuator>>,
    snapshots: Option<Arc<dyn SnapshotProvider>>,
    vocabulary: ActionVocabulary,
    settle_delay: Duration,
}

impl Default for ExecutionLoopBuilder {
    fn default() -> Self {
        Self {
            backend: None,
            actuator: None,
            snapshots: None,
            vocabulary: ActionVocabulary::standard(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl ExecutionLoopBuilder {
    pub fn inference_backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn actuator(mut self, actuator: Arc<dyn Actuator>) -> Self {
        self.actuator = Some(actuator);
        self
    }

    pub fn snapshot_provider(mut self, snapshots: Arc<dyn SnapshotProvider>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn vocabulary(mut self, vocabulary: ActionVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Pause after each dispatch before re-observing. A heuristic, not a
    /// guarantee that the surface has finished updating.
    pub fn settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn build(self) -> Result<ExecutionLoop, LoopError> {
        let actuator = self.actuator.ok_or(LoopError::MissingActuator)?;
        let snapshots = self.snapshots.ok_or(LoopError::MissingSnapshotProvider)?;
        let backend = self.backend.ok_or(LoopError::MissingInferenceBackend)?;

        Ok(ExecutionLoop {
            inference: InferenceClient::new(backend, self.vocabulary),
            dispatcher: ActionDispatcher::new(Arc::clone(&actuator)),
            actuator,
            snapshots,
            settle_delay: self.settle_delay,
        })
    }
}
