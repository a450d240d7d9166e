//! The three model-backed roles: surveyor, planner and validator

use std::sync::Arc;

use crate::error::Result;
use crate::host::LayerInfo;
use crate::layers::LayerMapping;
use crate::llm::{CompletionRequest, LlmClient, TokenUsage};
use crate::tools::ExecutionLog;

use super::verdict::{ValidationVerdict, parse_verdict};

const SURVEYOR_PROMPT: &str = "\
You are the Surveyor for an exhibition-floor CAD proofing system.
Given the user's objective, the drawing's layer table and the known vendor-to-standard layer mappings,
write a short digest of the drawing: which layers exist, which already map to standard Expo_ layers,
which look like booth outlines, booth numbers, building walls, columns or utilities, and which are clutter.
Plain text only. Do not propose commands.";

const PLANNER_PROMPT: &str = "\
You are the Executor for an exhibition-floor CAD proofing system. Turn the objective and drawing survey
into an ordered list of drawing commands.

Reply with a JSON object and nothing else:
{\"tool_calls\": [{\"command_name\": \"<short label>\", \"lisp_code\": \"<command>\"}]}

Each lisp_code is either a reserved NET: command from the catalogue below or a raw command-line string
sent to the drawing editor as-is. Steps run in order, one after another.

AVAILABLE COMMANDS:
";

const VALIDATOR_PROMPT: &str = "\
You are the Validator for an exhibition-floor CAD proofing system. Judge whether the execution log
shows the objective was achieved. Steps marked WARNING or ERROR usually mean it was not.

The FIRST word of your reply must be PASS or FAIL. After a newline, explain briefly. On FAIL, say
exactly what the next attempt must do differently.";

/// Model calls for each stage of a run
pub struct Agents {
    llm: Arc<dyn LlmClient>,
    max_tokens: Option<u32>,
}

impl Agents {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, max_tokens: None }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    async fn ask(&self, system: String, user: String, structured: bool) -> Result<(String, TokenUsage)> {
        let request = CompletionRequest {
            system_prompt: system,
            user_prompt: user,
            expect_structured: structured,
            max_tokens: self.max_tokens,
        };
        let response = self.llm.complete(request).await?;
        Ok((response.content, response.usage))
    }

    /// Natural-language digest of the drawing
    pub async fn survey(
        &self,
        objective: &str,
        layers: &[LayerInfo],
        mapping: &LayerMapping,
    ) -> Result<(String, TokenUsage)> {
        let names: Vec<&str> = layers.iter().map(|l| l.name.as_str()).collect();
        let user = format!(
            "Objective: {}\n\nLayers ({}): {}\n\nKnown layer mappings:\n{}",
            objective,
            names.len(),
            names.join(", "),
            mapping.to_json()?
        );
        self.ask(SURVEYOR_PROMPT.to_string(), user, false).await
    }

    /// Raw plan document for `context` (survey plus any validator feedback)
    pub async fn plan(&self, objective: &str, context: &str, catalogue: &str) -> Result<(String, TokenUsage)> {
        let system = format!("{}{}", PLANNER_PROMPT, catalogue);
        let user = format!("Objective: {}\n\nDrawing survey:\n{}", objective, context);
        self.ask(system, user, true).await
    }

    pub async fn validate(&self, objective: &str, log: &ExecutionLog) -> Result<(ValidationVerdict, TokenUsage)> {
        let user = format!("Objective: {}\n\nExecution log:\n{}", objective, log.render());
        let (reply, usage) = self.ask(VALIDATOR_PROMPT.to_string(), user, false).await?;
        Ok((parse_verdict(&reply), usage))
    }
}
