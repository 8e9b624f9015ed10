//! Maps normalized action intents onto the physical surface.

use std::sync::Arc;
use std::time::Duration;

use super::{ActionIntent, ActionResult, RequestedAction, COORDINATE_MAX};
use crate::surface::{Actuator, SurfaceDimensions};

/// Scale a normalized coordinate onto an axis of `extent` pixels.
///
/// `0` maps to `0` and `COORDINATE_MAX` maps to `extent`.
pub fn scale_coordinate(value: i32, extent: u32) -> u32 {
    let scaled = (value as f64 / COORDINATE_MAX as f64 * extent as f64).round();
    scaled.clamp(0.0, extent as f64) as u32
}

/// Validates intents and performs them through an actuator.
///
/// # Invariants
/// - Never fails: every outcome, including actuator errors, is an [`ActionResult`].
/// - The actuator is never invoked for invalid or unknown intents.
pub struct ActionDispatcher {
    actuator: Arc<dyn Actuator>,
}

impl ActionDispatcher {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self { actuator }
    }

    pub async fn dispatch(
        &self,
        action: &RequestedAction,
        dimensions: SurfaceDimensions,
    ) -> ActionResult {
        let name = action.name.as_str();

        if !dimensions.is_valid() {
            tracing::warn!(action = %name, dimensions = %dimensions, "Rejecting action: surface has no area");
            return ActionResult::failure(name);
        }
        if !action.intent.coordinates_in_range() {
            tracing::warn!(action = %name, intent = ?action.intent, "Rejecting action: coordinates outside 0-1000");
            return ActionResult::failure(name);
        }

        let scale = |x: i32, y: i32| {
            (
                scale_coordinate(x, dimensions.width),
                scale_coordinate(y, dimensions.height),
            )
        };

        let outcome = match &action.intent {
            ActionIntent::Tap { x, y } => {
                let (px, py) = scale(*x, *y);
                self.actuator.tap(px, py).await
            }
            ActionIntent::Swipe {
                x1,
                y1,
                x2,
                y2,
                duration_ms,
            } => {
                self.actuator
                    .swipe(
                        scale(*x1, *y1),
                        scale(*x2, *y2),
                        Duration::from_millis(*duration_ms),
                    )
                    .await
            }
            ActionIntent::TypeText { text } => self.actuator.type_text(text).await,
            ActionIntent::Unknown { .. } => {
                tracing::warn!(action = %name, "Unknown action reported as failed");
                return ActionResult::failure(name);
            }
        };

        match outcome {
            Ok(()) => ActionResult::success(name),
            Err(e) => {
                tracing::warn!(action = %name, "Action failed: {}", e);
                ActionResult::failure(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionArgs;
    use crate::surface::ActuationError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingActuator {
        calls: Mutex<Vec<String>>,
        focused: bool,
    }

    #[async_trait]
    impl Actuator for RecordingActuator {
        fn surface_dimensions(&self) -> SurfaceDimensions {
            SurfaceDimensions::new(1080, 2400)
        }

        async fn tap(&self, x: u32, y: u32) -> Result<(), ActuationError> {
            self.calls.lock().unwrap().push(format!("tap {} {}", x, y));
            Ok(())
        }

        async fn swipe(
            &self,
            from: (u32, u32),
            to: (u32, u32),
            duration: Duration,
        ) -> Result<(), ActuationError> {
            self.calls.lock().unwrap().push(format!(
                "swipe {:?} {:?} {}",
                from,
                to,
                duration.as_millis()
            ));
            Ok(())
        }

        async fn type_text(&self, text: &str) -> Result<(), ActuationError> {
            if !self.focused {
                return Err(ActuationError::NoFocusedInput);
            }
            self.calls.lock().unwrap().push(format!("type {}", text));
            Ok(())
        }
    }

    fn action(name: &str, intent: ActionIntent) -> RequestedAction {
        RequestedAction {
            name: name.to_string(),
            intent,
        }
    }

    #[test]
    fn scales_midpoint_and_bounds() {
        assert_eq!(scale_coordinate(500, 1080), 540);
        assert_eq!(scale_coordinate(0, 1080), 0);
        assert_eq!(scale_coordinate(1000, 1080), 1080);
        assert_eq!(scale_coordinate(333, 2400), 799);
    }

    #[tokio::test]
    async fn tap_is_scaled_to_pixels() {
        let actuator = Arc::new(RecordingActuator::default());
        let dispatcher = ActionDispatcher::new(actuator.clone());

        let result = dispatcher
            .dispatch(
                &action("click_at", ActionIntent::Tap { x: 500, y: 500 }),
                SurfaceDimensions::new(1080, 2400),
            )
            .await;

        assert!(result.succeeded());
        assert_eq!(result.intent_name(), "click_at");
        assert_eq!(*actuator.calls.lock().unwrap(), vec!["tap 540 1200"]);
    }

    #[tokio::test]
    async fn identical_swipe_endpoints_pass_through() {
        let actuator = Arc::new(RecordingActuator::default());
        let dispatcher = ActionDispatcher::new(actuator.clone());

        let result = dispatcher
            .dispatch(
                &action(
                    "swipe",
                    ActionIntent::Swipe {
                        x1: 100,
                        y1: 100,
                        x2: 100,
                        y2: 100,
                        duration_ms: 1500,
                    },
                ),
                SurfaceDimensions::new(1000, 1000),
            )
            .await;

        assert!(result.succeeded());
        assert_eq!(
            *actuator.calls.lock().unwrap(),
            vec!["swipe (100, 100) (100, 100) 1500"]
        );
    }

    #[tokio::test]
    async fn out_of_range_never_reaches_actuator() {
        let actuator = Arc::new(RecordingActuator::default());
        let dispatcher = ActionDispatcher::new(actuator.clone());

        let result = dispatcher
            .dispatch(
                &action("click_at", ActionIntent::Tap { x: 1001, y: 5 }),
                SurfaceDimensions::new(1080, 2400),
            )
            .await;

        assert!(!result.succeeded());
        assert!(actuator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_sized_surface_is_rejected() {
        let actuator = Arc::new(RecordingActuator::default());
        let dispatcher = ActionDispatcher::new(actuator.clone());

        let result = dispatcher
            .dispatch(
                &action("click_at", ActionIntent::Tap { x: 10, y: 10 }),
                SurfaceDimensions::new(0, 2400),
            )
            .await;

        assert!(!result.succeeded());
        assert!(actuator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_intent_fails_without_actuator() {
        let actuator = Arc::new(RecordingActuator::default());
        let dispatcher = ActionDispatcher::new(actuator.clone());

        let result = dispatcher
            .dispatch(
                &action(
                    "open_app",
                    ActionIntent::Unknown {
                        name: "open_app".to_string(),
                        args: ActionArgs::new(),
                    },
                ),
                SurfaceDimensions::new(1080, 2400),
            )
            .await;

        assert!(!result.succeeded());
        assert_eq!(result.intent_name(), "open_app");
        assert!(actuator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn typing_without_focus_fails() {
        let actuator = Arc::new(RecordingActuator::default());
        let dispatcher = ActionDispatcher::new(actuator.clone());

        let result = dispatcher
            .dispatch(
                &action(
                    "type_text",
                    ActionIntent::TypeText {
                        text: "x".to_string(),
                    },
                ),
                SurfaceDimensions::new(1080, 2400),
            )
            .await;

        assert!(!result.succeeded());
    }

    #[tokio::test]
    async fn typing_with_focus_succeeds() {
        let actuator = Arc::new(RecordingActuator {
            focused: true,
            ..Default::default()
        });
        let dispatcher = ActionDispatcher::new(actuator.clone());

        let result = dispatcher
            .dispatch(
                &action(
                    "type_text",
                    ActionIntent::TypeText {
                        text: "hello".to_string(),
                    },
                ),
                SurfaceDimensions::new(1080, 2400),
            )
            .await;

        assert!(result.succeeded());
        assert_eq!(*actuator.calls.lock().unwrap(), vec!["type hello"]);
    }
}
