//! surface-agent - CLI Entry Point
//!
//! Runs one approved plan against the configured X11 display.
//!
//! Usage: `surface-agent <request> <plan>` (plan `-` reads it from stdin)

use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context};
use surface_agent::{
    agents::{ExecutionLoop, ExecutionSession, LoopOutcome, SessionEvent},
    config::Config,
    llm::GeminiClient,
    surface::{DesktopSurface, SnapshotProvider},
    util::preview,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surface_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (request, plan) = read_arguments()?;

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, max_rounds={}, display={} ({})",
        config.inference.model, config.max_rounds, config.surface.display, config.surface.dimensions
    );

    let surface = Arc::new(DesktopSurface::new(&config.surface));
    let backend = Arc::new(GeminiClient::new(&config.inference)?);

    let initial = surface
        .capture()
        .await
        .context("Failed to capture initial snapshot")?;

    let execution = Arc::new(
        ExecutionLoop::builder()
            .inference_backend(backend)
            .actuator(surface.clone())
            .snapshot_provider(surface)
            .settle_delay(config.settle_delay)
            .build()?,
    );

    let session = ExecutionSession::new(request, plan, initial).with_max_rounds(config.max_rounds);
    let mut running = execution.start(session)?;
    info!("Started session {}", running.session_id);

    let cancel = running.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current round");
            cancel.cancel();
        }
    });

    while let Some(event) = running.events.recv().await {
        log_event(&event);
    }

    match running.handle.await? {
        LoopOutcome::Completed { final_text } => {
            println!("{}", final_text);
            Ok(())
        }
        LoopOutcome::Failed { error } => bail!("Session failed: {}", error),
        outcome => {
            info!("Session ended: {}", outcome);
            Ok(())
        }
    }
}

fn read_arguments() -> anyhow::Result<(String, String)> {
    let mut args = std::env::args().skip(1);
    let (Some(request), Some(plan)) = (args.next(), args.next()) else {
        bail!("usage: surface-agent <request> <plan|->");
    };

    let plan = if plan == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read plan from stdin")?;
        buf
    } else {
        plan
    };

    if plan.trim().is_empty() {
        bail!("Approved plan is empty");
    }
    Ok((request, plan))
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::RoundStarted { index } => info!("Round {}", index),
        SessionEvent::ActionDispatched { action } => {
            info!("Action: {}", action.intent.describe())
        }
        SessionEvent::ActionOutcome { result } => {
            info!("Result: {} {}", result.intent_name(), result.status())
        }
        SessionEvent::Warning { message } => warn!("{}", message),
        SessionEvent::Completed { text } => info!("Completed: {}", preview(text, 200)),
        SessionEvent::Cancelled => warn!("Cancelled"),
        SessionEvent::RoundLimitExceeded => warn!("Round limit exceeded"),
        SessionEvent::Failed { error: e } => error!("Failed: {}", e),
    }
}
