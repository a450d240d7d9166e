//! Routes plan steps to capability providers or the host command line
//!
//! Steps run strictly in plan order. A failing or unrecognized step becomes a
//! log line and execution moves on to the next one.

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::explode_tools::ExplodeTools;
use super::geometry_tools::GeometryTools;
use super::layer_tools::LayerTools;
use super::provider::ToolProvider;
use crate::error::Result;
use crate::geometry::{ConvergenceEngine, GeometricClassifier};
use crate::host::DrawingHost;
use crate::layers::LayerLifecycle;
use crate::plan::{NetCommand, Plan, ToolCall, Verb};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Ok,
    Message,
    Warning,
    Error,
}

/// Result of one dispatched plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based, counting only non-blank steps
    pub step: usize,
    pub command: String,
    pub status: StepStatus,
    pub detail: String,
    /// Provider that handled the step; `None` for messages, raw host commands and unrecognized verbs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            StepStatus::Ok | StepStatus::Message => write!(f, "Step {}: {}", self.step, self.detail),
            StepStatus::Warning => write!(f, "Step {}: WARNING {}", self.step, self.detail),
            StepStatus::Error => write!(f, "Step {}: ERROR {}", self.step, self.detail),
        }
    }
}

/// Ordered step results for one plan execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub steps: Vec<StepRecord>,
}

impl ExecutionLog {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.to_string()).collect()
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// One line per step, as shown to the validator
    pub fn render(&self) -> String {
        if self.steps.is_empty() {
            return "(no steps executed)".to_string();
        }
        self.lines().join("\n")
    }
}

/// Static registry of capability providers
pub struct ToolDispatcher {
    providers: Vec<Box<dyn ToolProvider>>,
}

impl Default for ToolDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    /// Dispatcher with the layer, geometry and explode providers registered
    pub fn standard(
        lifecycle: Arc<LayerLifecycle>,
        engine: Arc<ConvergenceEngine>,
        classifier: GeometricClassifier,
    ) -> Self {
        Self::new()
            .with_provider(LayerTools::new(lifecycle.clone()))
            .with_provider(GeometryTools::new(classifier, engine.clone(), lifecycle))
            .with_provider(ExplodeTools::new(engine))
    }

    pub fn with_provider(mut self, provider: impl ToolProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Providers usable against a host of `host_version`, in registration order
    pub fn eligible(&self, host_version: u32) -> impl Iterator<Item = &dyn ToolProvider> {
        self.providers
            .iter()
            .map(|p| p.as_ref())
            .filter(move |p| p.target_version() <= host_version)
    }

    /// Usage text of every eligible provider, for the planner's system prompt
    pub fn prompt_examples(&self, host_version: u32) -> String {
        let mut sections: Vec<&str> = self.eligible(host_version).map(|p| p.prompt_example()).collect();
        sections.push("- NET:MESSAGE:<text>  report progress without touching the drawing");
        sections.join("\n\n")
    }

    /// Execute every step of `plan` in order.
    ///
    /// Only a failure to read the host version is returned as an error; every
    /// per-step problem is recorded in the log instead.
    pub async fn execute_plan(&self, host: &dyn DrawingHost, plan: &Plan) -> Result<ExecutionLog> {
        let host_version = host.host_version().await?;
        let mut log = ExecutionLog::default();

        for call in plan.tool_calls.iter().filter(|c| !c.is_blank()) {
            let step = log.len() + 1;
            let record = self.execute_step(host, host_version, step, call).await;
            tracing::info!(
                step,
                status = ?record.status,
                command = %record.command,
                provider = record.provider.as_deref().unwrap_or("host"),
                "plan step"
            );
            log.steps.push(record);
        }

        Ok(log)
    }

    async fn execute_step(&self, host: &dyn DrawingHost, host_version: u32, step: usize, call: &ToolCall) -> StepRecord {
        let Some(command) = NetCommand::extract(call) else {
            return self.execute_raw(host, step, call).await;
        };

        if command.verb == Verb::Message {
            return StepRecord {
                step,
                command: command.raw.clone(),
                status: StepStatus::Message,
                detail: command.rest.trim().to_string(),
                provider: None,
            };
        }

        let Some(provider) = self.eligible(host_version).find(|p| p.can_execute(&command)) else {
            return StepRecord {
                step,
                command: command.raw.clone(),
                status: StepStatus::Warning,
                detail: format!("unrecognized command {}", command),
                provider: None,
            };
        };

        let name = provider.name().to_string();
        debug!("Step {} handled by {}", step, name);
        match provider.execute(host, &command).await {
            Ok(detail) => StepRecord {
                step,
                command: command.raw,
                status: StepStatus::Ok,
                detail,
                provider: Some(name),
            },
            Err(e) => StepRecord {
                step,
                detail: format!("{}: {}", command, e),
                command: command.raw,
                status: StepStatus::Error,
                provider: Some(name),
            },
        }
    }

    async fn execute_raw(&self, host: &dyn DrawingHost, step: usize, call: &ToolCall) -> StepRecord {
        let payload = call.payload().unwrap_or_default();
        let label = if call.command_name.trim().is_empty() {
            "LISP".to_string()
        } else {
            call.command_name.trim().to_string()
        };

        match host.execute_raw(payload).await {
            Ok(()) => StepRecord {
                step,
                command: payload.to_string(),
                status: StepStatus::Ok,
                detail: format!("Executed {}", label),
                provider: None,
            },
            Err(e) => StepRecord {
                step,
                command: payload.to_string(),
                status: StepStatus::Error,
                detail: format!("{}: {}", label, e),
                provider: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{DrawingSnapshot, EntityKind, EntitySpec, InMemoryHost};
    use crate::layers::{LayerMapping, LayerPolicy, MappingStore};

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::standard(
            Arc::new(LayerLifecycle::new(
                LayerPolicy::default(),
                MappingStore::in_memory(LayerMapping::new()),
            )),
            Arc::new(ConvergenceEngine::default()),
            GeometricClassifier::default(),
        )
    }

    fn host(version: u32) -> InMemoryHost {
        InMemoryHost::new(DrawingSnapshot {
            version,
            entities: vec![EntitySpec::new(EntityKind::MText, "notes")],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_log_length_skips_blank_steps() {
        let plan = Plan::new(vec![
            ToolCall::new("", ""),
            ToolCall::new("GET", "NET:GET_LAYERS:"),
            ToolCall::new(" ", " "),
            ToolCall::new("ZOOM", "(command \"ZOOM\" \"E\")"),
        ]);
        let log = dispatcher().execute_plan(&host(24), &plan).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.steps[0].step, 1);
        assert_eq!(log.steps[1].step, 2);
        assert_eq!(log.lines()[1], "Step 2: Executed ZOOM");
    }

    #[tokio::test]
    async fn test_raw_step_without_name() {
        let h = host(24);
        let plan = Plan::new(vec![ToolCall::new("", "(command \"REGEN\")")]);
        let log = dispatcher().execute_plan(&h, &plan).await.unwrap();
        assert_eq!(log.lines(), vec!["Step 1: Executed LISP"]);
        assert_eq!(h.raw_commands(), vec!["(command \"REGEN\")"]);
    }

    #[tokio::test]
    async fn test_unrecognized_is_warning_and_continues() {
        let plan = Plan::new(vec![
            ToolCall::new("x", "NET:FROBNICATE:1"),
            ToolCall::new("y", "NET:GET_LAYERS:"),
        ]);
        let log = dispatcher().execute_plan(&host(24), &plan).await.unwrap();
        assert_eq!(log.steps[0].status, StepStatus::Warning);
        assert_eq!(log.lines()[0], "Step 1: WARNING unrecognized command NET:FROBNICATE:1");
        assert_eq!(log.steps[1].status, StepStatus::Ok);
    }

    #[tokio::test]
    async fn test_version_gate_excludes_newer_providers() {
        let plan = Plan::new(vec![ToolCall::new("explode", "NET:QSELECT_EXPLODE:MTEXT")]);

        let old = host(18);
        let log = dispatcher().execute_plan(&old, &plan).await.unwrap();
        assert_eq!(log.steps[0].status, StepStatus::Warning);
        assert_eq!(old.explode_calls(), 0);

        let new = host(19);
        let log = dispatcher().execute_plan(&new, &plan).await.unwrap();
        assert_eq!(log.steps[0].status, StepStatus::Ok);
        assert_eq!(new.explode_calls(), 1);
    }

    #[tokio::test]
    async fn test_step_errors_do_not_abort() {
        let h = host(24).with_failing_raw("BAD");
        let plan = Plan::new(vec![
            ToolCall::new("bad", "BAD"),
            ToolCall::new("learn", "NET:LEARN_LAYER_MAPPING:only_source"),
            ToolCall::new("ok", "NET:GET_LAYERS:"),
        ]);
        let log = dispatcher().execute_plan(&h, &plan).await.unwrap();
        assert_eq!(log.count(StepStatus::Error), 2);
        assert_eq!(log.steps[2].status, StepStatus::Ok);
        assert!(log.lines()[1].starts_with("Step 2: ERROR NET:LEARN_LAYER_MAPPING:only_source"));
    }

    #[tokio::test]
    async fn test_message_is_inline() {
        let h = host(24);
        let plan = Plan::new(vec![ToolCall::new("MESSAGE", "NET:MESSAGE:Cleaning up: phase 1")]);
        let log = dispatcher().execute_plan(&h, &plan).await.unwrap();
        assert_eq!(log.lines(), vec!["Step 1: Cleaning up: phase 1"]);
        assert_eq!(log.steps[0].status, StepStatus::Message);
        assert!(h.raw_commands().is_empty());
    }

    #[tokio::test]
    async fn test_command_name_fallback() {
        let plan = Plan::new(vec![ToolCall::new("NET:GET_LAYERS:", "")]);
        let log = dispatcher().execute_plan(&host(24), &plan).await.unwrap();
        assert_eq!(log.lines(), vec!["Step 1: Layers found: 0, notes"]);
    }

    #[test]
    fn test_prompt_examples_filtered_by_version() {
        let d = dispatcher();
        assert!(!d.prompt_examples(18).contains("QSELECT_EXPLODE"));
        assert!(d.prompt_examples(19).contains("QSELECT_EXPLODE"));
        assert!(d.prompt_examples(15).contains("PREPARE_GEOMETRY"));
        assert!(!d.prompt_examples(14).contains("PREPARE_GEOMETRY"));
    }

    #[tokio::test]
    async fn test_records_handling_provider() {
        let plan = Plan::new(vec![
            ToolCall::new("layers", "NET:GET_LAYERS:"),
            ToolCall::new("boxes", "NET:SELECT_BOOTH_BOXES"),
            ToolCall::new("explode", "NET:QSELECT_EXPLODE:MTEXT"),
            ToolCall::new("note", "NET:MESSAGE:done"),
            ToolCall::new("regen", "(command \"REGEN\")"),
        ]);
        let log = dispatcher().execute_plan(&host(24), &plan).await.unwrap();
        let providers: Vec<Option<&str>> = log.steps.iter().map(|s| s.provider.as_deref()).collect();
        assert_eq!(
            providers,
            vec![Some("LayerTools"), Some("GeometryTools"), Some("ExplodeTools"), None, None]
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(ExecutionLog::default().render(), "(no steps executed)");
    }
}
