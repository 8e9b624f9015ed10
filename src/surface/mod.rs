//! Contracts for the controlled surface.
//!
//! The execution loop never talks to a concrete device. It drives an
//! [`Actuator`] (tap, swipe, type) and observes through a
//! [`SnapshotProvider`]. Both are injected when the loop is built.
//!
//! [`DesktopSurface`] implements both for an X11 display.

mod desktop;

pub use desktop::DesktopSurface;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Physical size of the controlled surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceDimensions {
    pub width: u32,
    pub height: u32,
}

impl SurfaceDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both extents must be positive for coordinates to map onto the surface.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for SurfaceDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An observation of the surface: an encoded image, opaque to the loop.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Snapshot {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

/// Failure reported by an actuator for a single action.
#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("No input target is focused")]
    NoFocusedInput,

    #[error("Actuator command failed: {0}")]
    CommandFailed(String),

    #[error("Actuator unavailable: {0}")]
    Unavailable(String),
}

/// Failure to observe the surface.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot capture failed: {0}")]
    CaptureFailed(String),

    #[error("Snapshot was empty")]
    Empty,

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Performs actions against the controlled surface.
///
/// Coordinates are absolute pixels; normalization is handled by the
/// dispatcher before an actuator is ever called.
///
/// # Invariants
/// - Exclusive control: at most one execution session drives an actuator at a time.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Current physical size of the surface.
    fn surface_dimensions(&self) -> SurfaceDimensions;

    /// Tap (click) at an absolute position.
    async fn tap(&self, x: u32, y: u32) -> Result<(), ActuationError>;

    /// Press at the start point, move to the end point over `duration`, release.
    async fn swipe(
        &self,
        from: (u32, u32),
        to: (u32, u32),
        duration: Duration,
    ) -> Result<(), ActuationError>;

    /// Inject text into the focused input.
    ///
    /// Returns [`ActuationError::NoFocusedInput`] when nothing can receive it.
    async fn type_text(&self, text: &str) -> Result<(), ActuationError>;
}

/// Captures the current state of the surface.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Capture one snapshot. Each call is an independent one-shot capture.
    async fn capture(&self) -> Result<Snapshot, SnapshotError>;
}
