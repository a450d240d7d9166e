//! Survey, plan, execute, validate and retry
//!
//! One survey per run, then up to `max_attempts` plan/execute/validate rounds.
//! Validator feedback from a failed round is appended to the next plan context.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::agents::Agents;
use super::journal::RunJournal;
use super::verdict::ValidationVerdict;
use crate::error::{ProofError, Result};
use crate::host::DrawingHost;
use crate::layers::LayerLifecycle;
use crate::llm::{LlmClient, TokenUsage};
use crate::plan::parse_plan;
use crate::tools::{ExecutionLog, ToolDispatcher};

pub const FEEDBACK_HEADER: &str = "\n\nVALIDATOR FEEDBACK FROM PREVIOUS ATTEMPT:\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_attempts: u32,
    pub journal_dir: Option<PathBuf>,
    pub max_tokens: Option<u32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            journal_dir: None,
            max_tokens: None,
        }
    }
}

/// One plan/execute/validate round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub context: String,
    pub plan_document: String,
    pub log: ExecutionLog,
    /// None when the plan could not be decoded
    pub verdict: Option<ValidationVerdict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Done,
    Exhausted { reason: String },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Done => write!(f, "done"),
            RunOutcome::Exhausted { reason } => write!(f, "exhausted: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub survey: String,
    pub attempts: Vec<AttemptRecord>,
    pub total_tokens: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == RunOutcome::Done
    }

    pub fn last_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }
}

/// Plan context for `attempt`: the survey, plus the previous verdict's feedback after the first attempt
pub fn plan_context(survey: &str, feedback: Option<&str>) -> String {
    match feedback {
        Some(feedback) => format!("{}{}{}", survey, FEEDBACK_HEADER, feedback),
        None => survey.to_string(),
    }
}

pub struct Orchestrator {
    agents: Agents,
    dispatcher: ToolDispatcher,
    lifecycle: Arc<LayerLifecycle>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        dispatcher: ToolDispatcher,
        lifecycle: Arc<LayerLifecycle>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            agents: Agents::new(llm).with_max_tokens(config.max_tokens),
            dispatcher,
            lifecycle,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn open_journal(&self) -> Option<RunJournal> {
        let dir = self.config.journal_dir.as_ref()?;
        match RunJournal::create(dir) {
            Ok(journal) => Some(journal),
            Err(e) => {
                warn!("Run journal disabled, cannot create {}: {}", dir.display(), e);
                None
            }
        }
    }

    /// Drive one run to `Done` or `Exhausted`.
    ///
    /// Errors are reserved for an unreachable host and failed model calls;
    /// a bad plan or a failed validation is reported through the outcome.
    pub async fn run(&self, host: &dyn DrawingHost, objective: &str) -> Result<RunReport> {
        host.connect().await.map_err(|e| match e {
            ProofError::ConnectionFailure(_) => e,
            other => ProofError::ConnectionFailure(other.to_string()),
        })?;

        let host_version = host.host_version().await?;
        let layers = host.list_layers().await?;
        let mapping = self.lifecycle.mapping()?;
        info!(
            "Starting run against host version {} ({} layers, {} mappings)",
            host_version,
            layers.len(),
            mapping.len()
        );

        let mut usage = TokenUsage::default();
        let (survey, survey_usage) = self.agents.survey(objective, &layers, &mapping).await?;
        usage.add(&survey_usage);
        debug!("Survey: {}", survey);

        let catalogue = self.dispatcher.prompt_examples(host_version);
        let journal = self.open_journal();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempts = Vec::new();
        let mut feedback: Option<String> = None;

        for attempt in 1..=max_attempts {
            let context = plan_context(&survey, feedback.as_deref());
            let (plan_document, plan_usage) = self.agents.plan(objective, &context, &catalogue).await?;
            usage.add(&plan_usage);

            let plan = match parse_plan(&plan_document) {
                Ok(plan) => plan,
                Err(ProofError::MalformedPlan(reason)) => {
                    warn!("Attempt {} produced a malformed plan: {}", attempt, reason);
                    let record = AttemptRecord {
                        attempt,
                        context,
                        plan_document,
                        log: ExecutionLog::default(),
                        verdict: None,
                    };
                    self.journal(&journal, objective, &record);
                    attempts.push(record);
                    return Ok(RunReport {
                        outcome: RunOutcome::Exhausted {
                            reason: format!("attempt {} returned a malformed plan: {}", attempt, reason),
                        },
                        survey,
                        attempts,
                        total_tokens: usage.total_tokens,
                    });
                }
                Err(e) => return Err(e),
            };

            info!("Attempt {}: executing {} step(s)", attempt, plan.actionable_steps());
            let log = self.dispatcher.execute_plan(host, &plan).await?;

            let (verdict, validate_usage) = self.agents.validate(objective, &log).await?;
            usage.add(&validate_usage);
            tracing::info!(attempt, success = verdict.success, steps = log.len(), "validation verdict");

            let record = AttemptRecord {
                attempt,
                context,
                plan_document,
                log,
                verdict: Some(verdict.clone()),
            };
            self.journal(&journal, objective, &record);
            attempts.push(record);

            if verdict.success {
                return Ok(RunReport {
                    outcome: RunOutcome::Done,
                    survey,
                    attempts,
                    total_tokens: usage.total_tokens,
                });
            }
            warn!("Attempt {} failed validation: {}", attempt, verdict.feedback);
            feedback = Some(verdict.feedback);
        }

        let reason = format!(
            "retries exhausted after {} attempt(s); manual intervention or a refined objective is needed. Last feedback: {}",
            max_attempts,
            feedback.unwrap_or_default()
        );
        Ok(RunReport {
            outcome: RunOutcome::Exhausted { reason },
            survey,
            attempts,
            total_tokens: usage.total_tokens,
        })
    }

    fn journal(&self, journal: &Option<RunJournal>, objective: &str, record: &AttemptRecord) {
        let Some(journal) = journal else {
            return;
        };
        if let Err(e) = journal.record(objective, record) {
            warn!("Failed to journal attempt {}: {}", record.attempt, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ConvergenceEngine, GeometricClassifier};
    use crate::host::{DrawingSnapshot, EntityKind, EntitySpec, InMemoryHost};
    use crate::layers::{LayerMapping, LayerPolicy, MappingStore};
    use crate::llm::MockLlmClient;
    use tempfile::TempDir;

    fn orchestrator(mock: Arc<MockLlmClient>, config: OrchestratorConfig) -> Orchestrator {
        let lifecycle = Arc::new(LayerLifecycle::new(
            LayerPolicy::default(),
            MappingStore::in_memory(LayerMapping::new()),
        ));
        let dispatcher = ToolDispatcher::standard(
            lifecycle.clone(),
            Arc::new(ConvergenceEngine::default()),
            GeometricClassifier::default(),
        );
        Orchestrator::new(mock, dispatcher, lifecycle, config)
    }

    fn host() -> InMemoryHost {
        InMemoryHost::new(DrawingSnapshot {
            entities: vec![EntitySpec::new(EntityKind::Line, "walls")],
            ..Default::default()
        })
    }

    const PLAN: &str = r#"{"tool_calls":[{"command_name":"layers","lisp_code":"NET:GET_LAYERS:"}]}"#;

    #[test]
    fn test_plan_context() {
        assert_eq!(plan_context("survey", None), "survey");
        assert_eq!(
            plan_context("survey", Some("lock them")),
            "survey\n\nVALIDATOR FEEDBACK FROM PREVIOUS ATTEMPT:\nlock them"
        );
    }

    #[tokio::test]
    async fn test_first_attempt_passes() {
        let mock = Arc::new(MockLlmClient::new(["survey", PLAN, "PASS\nfine"]));
        let report = orchestrator(mock.clone(), OrchestratorConfig::default())
            .run(&host(), "list layers")
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].log.lines(), vec!["Step 1: Layers found: 0, walls"]);
        assert_eq!(report.total_tokens, 30);
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_retry_carries_feedback() {
        let mock = Arc::new(MockLlmClient::new([
            "survey",
            PLAN,
            "FAIL\nmove walls to Expo_Building",
            PLAN,
            "PASS",
        ]));
        let report = orchestrator(mock.clone(), OrchestratorConfig::default())
            .run(&host(), "proof")
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.attempts.len(), 2);
        let second_plan = &mock.requests()[3];
        assert!(second_plan.expect_structured);
        assert!(
            second_plan
                .user_prompt
                .ends_with("survey\n\nVALIDATOR FEEDBACK FROM PREVIOUS ATTEMPT:\nmove walls to Expo_Building")
        );
    }

    #[tokio::test]
    async fn test_exhausted_after_two_attempts() {
        let mock = Arc::new(MockLlmClient::new(["survey", PLAN, "FAIL a", PLAN, "FAIL b", PLAN, "PASS"]));
        let report = orchestrator(mock.clone(), OrchestratorConfig::default())
            .run(&host(), "proof")
            .await
            .unwrap();

        assert_eq!(report.attempts.len(), 2);
        match &report.outcome {
            RunOutcome::Exhausted { reason } => assert!(reason.contains("Last feedback: b")),
            other => panic!("expected exhausted, got {:?}", other),
        }
        assert_eq!(mock.remaining(), 2);
    }

    #[tokio::test]
    async fn test_malformed_plan_ends_run() {
        let mock = Arc::new(MockLlmClient::new(["survey", "not json", "PASS"]));
        let h = host();
        let report = orchestrator(mock.clone(), OrchestratorConfig::default())
            .run(&h, "proof")
            .await
            .unwrap();

        assert!(matches!(report.outcome, RunOutcome::Exhausted { .. }));
        assert_eq!(report.attempts.len(), 1);
        assert!(report.attempts[0].verdict.is_none());
        assert!(report.attempts[0].log.is_empty());
        assert_eq!(mock.remaining(), 1);
        assert!(h.raw_commands().is_empty());
    }

    #[tokio::test]
    async fn test_connection_failure_is_fatal() {
        let mock = Arc::new(MockLlmClient::new(["survey"]));
        let err = orchestrator(mock.clone(), OrchestratorConfig::default())
            .run(&InMemoryHost::disconnected(), "proof")
            .await
            .unwrap_err();
        assert!(matches!(err, ProofError::ConnectionFailure(_)));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_journal_written_per_attempt() {
        let temp = TempDir::new().unwrap();
        let config = OrchestratorConfig {
            journal_dir: Some(temp.path().to_path_buf()),
            ..Default::default()
        };
        let mock = Arc::new(MockLlmClient::new(["survey", PLAN, "FAIL x", PLAN, "FAIL y"]));
        orchestrator(mock, config).run(&host(), "proof").await.unwrap();

        let runs = std::fs::read_to_string(temp.path().join("runs.jsonl")).unwrap();
        assert_eq!(runs.lines().count(), 2);
        let plans = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with("plan.json"))
            .count();
        assert_eq!(plans, 2);
    }

    #[test]
    fn test_config_defaults() {
        let config: OrchestratorConfig = serde_yaml::from_str("journal_dir: /tmp/j").unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.journal_dir, Some(PathBuf::from("/tmp/j")));
    }
}
