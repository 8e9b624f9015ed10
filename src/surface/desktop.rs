//! X11 desktop surface driven through `xdotool` and captured with `scrot`.
//!
//! Requires: a running X server on the configured display (Xvfb works),
//! xdotool, and scrot (ImageMagick `import` is used as a capture fallback).

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{ActuationError, Actuator, Snapshot, SnapshotError, SnapshotProvider, SurfaceDimensions};
use crate::config::SurfaceConfig;

/// Intermediate pointer positions used to animate a swipe.
const SWIPE_STEPS: u32 = 12;

/// Timeout for a single xdotool invocation.
const INPUT_TIMEOUT_SECS: u64 = 10;

/// Timeout for a single capture command.
const CAPTURE_TIMEOUT_SECS: u64 = 30;

/// Run a command with DISPLAY environment variable set
async fn run_with_display(
    display: &str,
    program: &str,
    args: &[&str],
    timeout_secs: u64,
) -> Result<(String, String, i32), String> {
    let output = match tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        Command::new(program)
            .args(args)
            .env("DISPLAY", display)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output(),
    )
    .await
    {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(format!("Failed to execute {}: {}", program, e)),
        Err(_) => return Err(format!("Command {} timed out", program)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    Ok((stdout, stderr, exit_code))
}

/// A virtual or physical X11 display acting as the controlled surface.
#[derive(Debug, Clone)]
pub struct DesktopSurface {
    display: String,
    dimensions: SurfaceDimensions,
    jpeg_quality: u8,
    snapshot_dir: PathBuf,
    keep_snapshots: bool,
}

impl DesktopSurface {
    pub fn new(config: &SurfaceConfig) -> Self {
        Self {
            display: config.display.clone(),
            dimensions: config.dimensions,
            jpeg_quality: config.jpeg_quality,
            snapshot_dir: config.snapshot_dir.clone(),
            keep_snapshots: config.keep_snapshots,
        }
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    async fn xdotool(&self, args: &[&str]) -> Result<(), ActuationError> {
        let (_stdout, stderr, exit_code) =
            run_with_display(&self.display, "xdotool", args, INPUT_TIMEOUT_SECS)
                .await
                .map_err(ActuationError::Unavailable)?;

        if exit_code != 0 {
            return Err(ActuationError::CommandFailed(format!(
                "xdotool {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn mouse_move(&self, x: u32, y: u32) -> Result<(), ActuationError> {
        self.xdotool(&["mousemove", &x.to_string(), &y.to_string()])
            .await
    }

    fn snapshot_path(&self) -> PathBuf {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
        self.snapshot_dir
            .join(format!("snapshot_{}_{}.jpg", timestamp, suffix))
    }
}

#[async_trait]
impl Actuator for DesktopSurface {
    fn surface_dimensions(&self) -> SurfaceDimensions {
        self.dimensions
    }

    async fn tap(&self, x: u32, y: u32) -> Result<(), ActuationError> {
        tracing::info!(display = %self.display, x = x, y = y, "Tapping");

        self.mouse_move(x, y).await?;

        // Small delay to ensure move completes
        tokio::time::sleep(Duration::from_millis(50)).await;

        self.xdotool(&["click", "1"]).await
    }

    async fn swipe(
        &self,
        from: (u32, u32),
        to: (u32, u32),
        duration: Duration,
    ) -> Result<(), ActuationError> {
        tracing::info!(
            display = %self.display,
            from = ?from,
            to = ?to,
            duration_ms = duration.as_millis() as u64,
            "Swiping"
        );

        self.mouse_move(from.0, from.1).await?;
        self.xdotool(&["mousedown", "1"]).await?;

        let step_delay = duration / SWIPE_STEPS;
        let mut moved = Ok(());
        for (x, y) in swipe_path(from, to, SWIPE_STEPS) {
            tokio::time::sleep(step_delay).await;
            moved = self.mouse_move(x, y).await;
            if moved.is_err() {
                break;
            }
        }

        // Always release the button, even if a move failed midway
        let released = self.xdotool(&["mouseup", "1"]).await;
        moved.and(released)
    }

    async fn type_text(&self, text: &str) -> Result<(), ActuationError> {
        let (_stdout, _stderr, exit_code) =
            run_with_display(&self.display, "xdotool", &["getwindowfocus"], INPUT_TIMEOUT_SECS)
                .await
                .map_err(ActuationError::Unavailable)?;
        if exit_code != 0 {
            return Err(ActuationError::NoFocusedInput);
        }

        tracing::info!(display = %self.display, chars = text.chars().count(), "Typing text");

        self.xdotool(&type_args(text)).await
    }
}

#[async_trait]
impl SnapshotProvider for DesktopSurface {
    async fn capture(&self) -> Result<Snapshot, SnapshotError> {
        tokio::fs::create_dir_all(&self.snapshot_dir).await?;

        let filepath = self.snapshot_path();
        let path_str = filepath.to_string_lossy().to_string();
        let quality = self.jpeg_quality.to_string();

        tracing::debug!(display = %self.display, path = %filepath.display(), "Capturing snapshot");

        let scrot = run_with_display(
            &self.display,
            "scrot",
            &["-o", "-q", &quality, &path_str],
            CAPTURE_TIMEOUT_SECS,
        )
        .await;

        let scrot_error = match scrot {
            Ok((_, _, 0)) => None,
            Ok((_, stderr, _)) => Some(stderr.trim().to_string()),
            Err(e) => Some(e),
        };

        if let Some(scrot_error) = scrot_error {
            // Try import as fallback
            let import = run_with_display(
                &self.display,
                "import",
                &["-window", "root", "-quality", &quality, &path_str],
                CAPTURE_TIMEOUT_SECS,
            )
            .await;

            match import {
                Ok((_, _, 0)) => {}
                Ok((_, stderr, _)) => {
                    return Err(SnapshotError::CaptureFailed(format!(
                        "scrot error: {}. import error: {}",
                        scrot_error,
                        stderr.trim()
                    )))
                }
                Err(e) => {
                    return Err(SnapshotError::CaptureFailed(format!(
                        "scrot error: {}. import error: {}",
                        scrot_error, e
                    )))
                }
            }
        }

        read_snapshot_file(&filepath, self.keep_snapshots).await
    }
}

/// Read a captured JPEG from disk, removing it afterwards unless `keep` is set.
async fn read_snapshot_file(path: &Path, keep: bool) -> Result<Snapshot, SnapshotError> {
    let data = tokio::fs::read(path).await?;

    if !keep {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::debug!(path = %path.display(), "Could not remove snapshot file: {}", e);
        }
    }

    if data.is_empty() {
        return Err(SnapshotError::Empty);
    }
    Ok(Snapshot::jpeg(data))
}

/// xdotool arguments for typing `text` literally, even when it looks like an option.
fn type_args(text: &str) -> [&str; 5] {
    ["type", "--delay", "12", "--", text]
}

/// Evenly spaced pointer positions from `from` (exclusive) to `to` (inclusive).
fn swipe_path(from: (u32, u32), to: (u32, u32), steps: u32) -> Vec<(u32, u32)> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let lerp = |a: u32, b: u32| (a as f64 + (b as f64 - a as f64) * t).round() as u32;
            (lerp(from.0, to.0), lerp(from.1, to.1))
        })
        .collect()
}
