//! Agents module - bounded-round plan execution.
//!
//! # Components
//! - **ExecutionSession**: per-run state (request, plan, history, round counter)
//! - **InferenceClient**: one request/response exchange with the service
//! - **ExecutionLoop**: the round state machine that ties inference, dispatch
//!   and observation together
//!
//! # Design Principles
//! - Every session ends in exactly one [`LoopOutcome`]
//! - Action failures are fed back to the service, never raised
//! - Cancellation is honored only between rounds
//! - Progress is reported through [`SessionEvent`]s, nothing else

mod events;
mod executor;
mod inference;
mod session;
mod types;

pub use events::SessionEvent;
pub use executor::{ExecutionLoop, ExecutionLoopBuilder, RunningSession};
pub use inference::{InferenceClient, ModelTurn};
pub use session::{CancelHandle, ExecutionSession};
pub use types::{InferError, LoopError, LoopOutcome};
