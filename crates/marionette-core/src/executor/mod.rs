//! Action Executor module
//!
//! The Executor is responsible for:
//! - Resolving a normalized action into an ordered list of primitive steps
//! - Applying those steps strictly sequentially through the avatar bridge
//!
//! A step failure aborts the remaining steps of that action (fail-fast
//! within one action). Isolation *between* actions is the scheduler's
//! concern, not the executor's.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::presets::{EmotePreset, GesturePreset, PresetConfig, ReactStep};
use crate::types::{Action, ParamUpdate, Step};

/// Errors surfaced by the model/render primitives.
#[derive(Debug, Clone, Error)]
pub enum PrimitiveError {
    #[error("primitive '{0}' is not supported by this bridge")]
    Unsupported(&'static str),

    #[error("primitive call failed: {0}")]
    Failed(String),
}

/// The three primitive calls the rendering/model runtime exposes.
///
/// `set_param_batch` has a default implementation that reports
/// `Unsupported`; bridges backing models without parameter access simply
/// leave it out.
#[async_trait]
pub trait AvatarBridge: Send + Sync {
    /// Apply a named facial expression.
    async fn set_expression(&self, name: &str) -> Result<(), PrimitiveError>;

    /// Play a motion from a group, optionally at a fixed index.
    async fn play_motion(&self, group: &str, index: Option<u32>) -> Result<(), PrimitiveError>;

    /// Apply a batch of runtime parameter updates.
    async fn set_param_batch(&self, _updates: &[ParamUpdate]) -> Result<(), PrimitiveError> {
        Err(PrimitiveError::Unsupported("set_param_batch"))
    }
}

/// Injected sleep source, so tests and the scheduler share one seam.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production clock backed by the tokio timer.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Execution errors
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("no {kind} preset named '{name}'")]
    NotFound { kind: &'static str, name: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("required primitive unavailable: {0}")]
    Unavailable(&'static str),

    #[error(transparent)]
    Primitive(#[from] PrimitiveError),
}

/// Resolves actions against the preset catalog and runs the resulting
/// steps through the avatar bridge.
pub struct ActionExecutor {
    presets: Arc<PresetConfig>,
    bridge: Arc<dyn AvatarBridge>,
    clock: Arc<dyn Clock>,
}

impl ActionExecutor {
    /// Create an executor with the production clock.
    pub fn new(presets: Arc<PresetConfig>, bridge: Arc<dyn AvatarBridge>) -> Self {
        Self::with_clock(presets, bridge, Arc::new(TokioClock))
    }

    /// Create an executor with a custom clock.
    pub fn with_clock(
        presets: Arc<PresetConfig>,
        bridge: Arc<dyn AvatarBridge>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            presets,
            bridge,
            clock,
        }
    }

    /// Resolve an action into its ordered execution plan without running it.
    pub fn resolve(&self, action: &Action) -> Result<Vec<Step>, ExecError> {
        match action {
            Action::Expression { name } => {
                require(name, "expression name")?;
                Ok(vec![Step::expression(name.clone())])
            }
            Action::Motion { group, index } => {
                require(group, "motion group")?;
                Ok(vec![Step::motion(group.clone(), *index)])
            }
            Action::Emote { name, intensity } => {
                require(name, "emote name")?;
                let preset = self
                    .presets
                    .emote(name, intensity)
                    .ok_or_else(|| not_found("emote", name))?;
                Ok(emote_steps(preset))
            }
            Action::Gesture { name } => {
                require(name, "gesture name")?;
                let preset = self
                    .presets
                    .gesture(name)
                    .ok_or_else(|| not_found("gesture", name))?;
                Ok(gesture_steps(preset))
            }
            Action::React { name } => {
                require(name, "react name")?;
                let entries = self
                    .presets
                    .react(name)
                    .ok_or_else(|| not_found("react", name))?;
                Ok(entries.iter().map(react_step).collect())
            }
        }
    }

    /// Resolve and execute one action. Steps run strictly sequentially;
    /// the first failing step aborts the rest of this action's plan.
    pub async fn execute(&self, action: &Action) -> Result<(), ExecError> {
        let steps = self.resolve(action)?;
        tracing::debug!(kind = action.kind(), steps = steps.len(), "executing action");
        for step in &steps {
            self.apply_step(step).await?;
        }
        Ok(())
    }

    async fn apply_step(&self, step: &Step) -> Result<(), ExecError> {
        match step {
            Step::Expression { name } => self.bridge.set_expression(name).await?,
            Step::Motion { group, index } => self.bridge.play_motion(group, *index).await?,
            Step::ParamBatch { updates } => {
                match self.bridge.set_param_batch(updates).await {
                    Err(PrimitiveError::Unsupported(which)) => {
                        return Err(ExecError::Unavailable(which))
                    }
                    other => other?,
                }
            }
            Step::Wait { ms } => self.clock.sleep(Duration::from_millis(*ms)).await,
        }
        Ok(())
    }
}

fn emote_steps(preset: &EmotePreset) -> Vec<Step> {
    let mut steps = Vec::new();
    if let Some(expression) = &preset.expression {
        steps.push(Step::expression(expression.clone()));
    }
    if !preset.params.is_empty() {
        steps.push(Step::param_batch(preset.params.clone()));
    }
    steps
}

fn gesture_steps(preset: &GesturePreset) -> Vec<Step> {
    let mut steps = Vec::new();
    if let Some(expression) = &preset.expression {
        steps.push(Step::expression(expression.clone()));
    }
    if let Some(motion) = &preset.motion {
        steps.push(Step::motion(motion.group.clone(), motion.index));
    }
    steps
}

fn react_step(entry: &ReactStep) -> Step {
    match entry {
        ReactStep::Wait { ms } => Step::wait(*ms),
        ReactStep::Expression { name } => Step::expression(name.clone()),
        ReactStep::Motion { group, index } => Step::motion(group.clone(), *index),
        ReactStep::ParamBatch { updates } => Step::param_batch(updates.clone()),
    }
}

fn require(value: &str, what: &str) -> Result<(), ExecError> {
    if value.trim().is_empty() {
        return Err(ExecError::BadRequest(format!("missing {what}")));
    }
    Ok(())
}

fn not_found(kind: &'static str, name: &str) -> ExecError {
    ExecError::NotFound {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Bridge that records every primitive call, optionally failing some.
    struct RecordingBridge {
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
        supports_params: bool,
    }

    impl RecordingBridge {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
                supports_params: true,
            }
        }

        fn failing_on(name: &str) -> Self {
            Self {
                fail_on: Some(name.to_string()),
                ..Self::new()
            }
        }

        fn without_params() -> Self {
            Self {
                supports_params: false,
                ..Self::new()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<(), PrimitiveError> {
            if self.fail_on.as_deref() == Some(call.as_str()) {
                return Err(PrimitiveError::Failed(format!("injected failure: {call}")));
            }
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    #[async_trait]
    impl AvatarBridge for RecordingBridge {
        async fn set_expression(&self, name: &str) -> Result<(), PrimitiveError> {
            self.record(format!("expression:{name}"))
        }

        async fn play_motion(&self, group: &str, index: Option<u32>) -> Result<(), PrimitiveError> {
            self.record(format!("motion:{group}:{index:?}"))
        }

        async fn set_param_batch(&self, updates: &[ParamUpdate]) -> Result<(), PrimitiveError> {
            if !self.supports_params {
                return Err(PrimitiveError::Unsupported("set_param_batch"));
            }
            let rendered = updates
                .iter()
                .map(|u| format!("{}={}", u.name, u.value))
                .collect::<Vec<_>>()
                .join(",");
            self.record(format!("params:{rendered}"))
        }
    }

    fn presets(value: serde_json::Value) -> Arc<PresetConfig> {
        Arc::new(serde_json::from_value(value).expect("preset config"))
    }

    fn executor(presets: Arc<PresetConfig>, bridge: Arc<RecordingBridge>) -> ActionExecutor {
        ActionExecutor::new(presets, bridge)
    }

    #[test]
    fn test_expression_and_motion_resolve_to_passthrough_steps() {
        let exec = executor(Arc::new(PresetConfig::empty()), Arc::new(RecordingBridge::new()));

        let steps = exec
            .resolve(&Action::Expression {
                name: "smile".to_string(),
            })
            .unwrap();
        assert_eq!(steps, vec![Step::expression("smile")]);

        let steps = exec
            .resolve(&Action::Motion {
                group: "TapBody".to_string(),
                index: Some(1),
            })
            .unwrap();
        assert_eq!(steps, vec![Step::motion("TapBody", Some(1))]);
    }

    #[test]
    fn test_emote_resolves_expression_then_param_batch() {
        let exec = executor(
            presets(json!({
                "emote": {
                    "happy": {
                        "low": {
                            "expression": "smile",
                            "params": [{"name": "ParamMouthForm", "value": 0.3}]
                        }
                    }
                }
            })),
            Arc::new(RecordingBridge::new()),
        );

        let steps = exec
            .resolve(&Action::Emote {
                name: "happy".to_string(),
                intensity: "low".to_string(),
            })
            .unwrap();
        assert_eq!(
            steps,
            vec![
                Step::expression("smile"),
                Step::param_batch(vec![ParamUpdate::new("ParamMouthForm", 0.3)]),
            ]
        );
    }

    #[test]
    fn test_emote_unknown_intensity_uses_medium_then_fails_not_found() {
        let exec = executor(
            presets(json!({
                "emote": {"happy": {"medium": {"expression": "smile"}}}
            })),
            Arc::new(RecordingBridge::new()),
        );

        let steps = exec
            .resolve(&Action::Emote {
                name: "happy".to_string(),
                intensity: "extreme".to_string(),
            })
            .unwrap();
        assert_eq!(steps, vec![Step::expression("smile")]);

        let err = exec
            .resolve(&Action::Emote {
                name: "angry".to_string(),
                intensity: "medium".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ExecError::NotFound { kind: "emote", .. }));
    }

    #[test]
    fn test_gesture_resolves_expression_then_motion() {
        let exec = executor(
            presets(json!({
                "gesture": {
                    "wave": {"expression": "smile", "motion": {"group": "Wave", "index": 0}}
                }
            })),
            Arc::new(RecordingBridge::new()),
        );

        let steps = exec
            .resolve(&Action::Gesture {
                name: "wave".to_string(),
            })
            .unwrap();
        assert_eq!(
            steps,
            vec![Step::expression("smile"), Step::motion("Wave", Some(0))]
        );

        let err = exec
            .resolve(&Action::Gesture {
                name: "bow".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ExecError::NotFound { kind: "gesture", .. }));
    }

    #[test]
    fn test_react_preserves_entry_order() {
        let exec = executor(
            presets(json!({
                "react": {
                    "surprise": [
                        {"type": "expression", "name": "shock"},
                        {"type": "wait", "ms": 80},
                        {"type": "motion", "group": "Flinch"},
                        {"type": "param_batch", "updates": [{"name": "ParamBrowLY", "value": 1.0}]}
                    ]
                }
            })),
            Arc::new(RecordingBridge::new()),
        );

        let steps = exec
            .resolve(&Action::React {
                name: "surprise".to_string(),
            })
            .unwrap();
        assert_eq!(
            steps,
            vec![
                Step::expression("shock"),
                Step::wait(80),
                Step::motion("Flinch", None),
                Step::param_batch(vec![ParamUpdate::new("ParamBrowLY", 1.0)]),
            ]
        );
    }

    #[test]
    fn test_execute_runs_steps_in_order() {
        tokio_test::block_on(async {
            let bridge = Arc::new(RecordingBridge::new());
            let exec = executor(
                presets(json!({
                    "gesture": {
                        "wave": {"expression": "smile", "motion": {"group": "Wave"}}
                    }
                })),
                bridge.clone(),
            );

            exec.execute(&Action::Gesture {
                name: "wave".to_string(),
            })
            .await
            .unwrap();

            assert_eq!(bridge.calls(), vec!["expression:smile", "motion:Wave:None"]);
        });
    }

    #[test]
    fn test_step_failure_aborts_remaining_steps_of_that_action() {
        tokio_test::block_on(async {
            let bridge = Arc::new(RecordingBridge::failing_on("expression:shock"));
            let exec = executor(
                presets(json!({
                    "react": {
                        "surprise": [
                            {"type": "motion", "group": "Flinch"},
                            {"type": "expression", "name": "shock"},
                            {"type": "motion", "group": "Recover"}
                        ]
                    }
                })),
                bridge.clone(),
            );

            let err = exec
                .execute(&Action::React {
                    name: "surprise".to_string(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ExecError::Primitive(_)));
            // The step after the failure never ran.
            assert_eq!(bridge.calls(), vec!["motion:Flinch:None"]);
        });
    }

    #[test]
    fn test_param_batch_without_bridge_support_is_unavailable() {
        tokio_test::block_on(async {
            let bridge = Arc::new(RecordingBridge::without_params());
            let exec = executor(
                presets(json!({
                    "emote": {
                        "happy": {
                            "medium": {"params": [{"name": "ParamMouthForm", "value": 0.5}]}
                        }
                    }
                })),
                bridge.clone(),
            );

            let err = exec
                .execute(&Action::Emote {
                    name: "happy".to_string(),
                    intensity: "medium".to_string(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ExecError::Unavailable("set_param_batch")));
        });
    }
}
