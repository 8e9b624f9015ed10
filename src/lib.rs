//! # Surface Agent
//!
//! Executes an approved, human-readable plan against a visual surface by
//! repeatedly asking an action-inference service what to do next.
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │          ExecutionLoop           │
//!        │  (round counter, cancellation)   │
//!        └───────┬──────────────┬───────────┘
//!                │              │
//!                ▼              ▼
//!     ┌─────────────────┐  ┌─────────────────┐
//!     │ InferenceClient │  │ ActionDispatcher│
//!     │  (Gemini API)   │  │  (0-1000 → px)  │
//!     └─────────────────┘  └────────┬────────┘
//!                                   ▼
//!                          ┌─────────────────┐
//!                          │ Actuator /      │
//!                          │ SnapshotProvider│
//!                          └─────────────────┘
//! ```
//!
//! ## Round Flow
//! 1. Send request, plan and snapshot (later: last action result and snapshot)
//! 2. Receive either an action request or final text
//! 3. Dispatch the action, let the surface settle, capture a new snapshot
//! 4. Repeat until text, cancellation, failure or the round limit
//!
//! ## Modules
//! - `agents`: execution session, inference client and loop
//! - `actions`: action vocabulary and coordinate dispatch
//! - `llm`: inference service transport
//! - `surface`: actuator and snapshot contracts, X11 desktop implementation

pub mod actions;
pub mod agents;
pub mod config;
pub mod llm;
pub mod surface;
pub mod util;

pub use agents::{ExecutionLoop, ExecutionSession, LoopOutcome, SessionEvent};
pub use config::Config;
