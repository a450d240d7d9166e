//! Plan document decoding
//!
//! Canonical form is `{"tool_calls": [{"command_name": .., "lisp_code": ..}, ..]}`.
//! A bare `{"command_name": .., "lisp_code": ..}` object is accepted as a
//! one-step plan.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProofError, Result};
use crate::llm::strip_code_fence;

const TOOL_CALLS_KEY: &str = "tool_calls";
const COMMAND_NAME_KEY: &str = "command_name";
const LISP_CODE_KEY: &str = "lisp_code";

/// One plan step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub command_name: String,
    #[serde(default)]
    pub lisp_code: String,
}

impl ToolCall {
    pub fn new(command_name: impl Into<String>, lisp_code: impl Into<String>) -> Self {
        Self {
            command_name: command_name.into(),
            lisp_code: lisp_code.into(),
        }
    }

    /// Both fields empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.command_name.trim().is_empty() && self.lisp_code.trim().is_empty()
    }

    /// The text sent to the host: `lisp_code`, or `command_name` when there is no code
    pub fn payload(&self) -> Option<&str> {
        [&self.lisp_code, &self.command_name]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

/// Ordered sequence of tool calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub tool_calls: Vec<ToolCall>,
}

impl Plan {
    pub fn new(tool_calls: Vec<ToolCall>) -> Self {
        Self { tool_calls }
    }

    pub fn len(&self) -> usize {
        self.tool_calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty()
    }

    /// Steps that will produce a log line
    pub fn actionable_steps(&self) -> usize {
        self.tool_calls.iter().filter(|c| !c.is_blank()).count()
    }
}

/// Decode a plan document, tolerating a surrounding markdown fence
pub fn parse_plan(text: &str) -> Result<Plan> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(ProofError::MalformedPlan("empty plan document".to_string()));
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| ProofError::MalformedPlan(format!("not valid JSON: {}", e)))?;
    let Value::Object(root) = value else {
        return Err(ProofError::MalformedPlan("plan document must be a JSON object".to_string()));
    };

    let tool_calls = if let Some(entries) = root.get(TOOL_CALLS_KEY) {
        let Value::Array(entries) = entries else {
            return Err(ProofError::MalformedPlan(format!("'{}' must be an array", TOOL_CALLS_KEY)));
        };
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                Value::Object(fields) => decode_call(fields, i),
                _ => Err(ProofError::MalformedPlan(format!("tool call {} is not an object", i + 1))),
            })
            .collect::<Result<Vec<_>>>()?
    } else if root.contains_key(COMMAND_NAME_KEY) || root.contains_key(LISP_CODE_KEY) {
        vec![decode_call(&root, 0)?]
    } else {
        return Err(ProofError::MalformedPlan(format!(
            "expected a '{}' array or a single tool call",
            TOOL_CALLS_KEY
        )));
    };

    if !tool_calls.is_empty() && tool_calls.iter().all(ToolCall::is_blank) {
        return Err(ProofError::MalformedPlan(
            "every tool call is missing both command_name and lisp_code".to_string(),
        ));
    }

    Ok(Plan { tool_calls })
}

fn decode_call(fields: &Map<String, Value>, index: usize) -> Result<ToolCall> {
    let field = |key: &str| -> Result<String> {
        match fields.get(key) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(ProofError::MalformedPlan(format!(
                "tool call {}: '{}' must be a string",
                index + 1,
                key
            ))),
        }
    };
    Ok(ToolCall {
        command_name: field(COMMAND_NAME_KEY)?,
        lisp_code: field(LISP_CODE_KEY)?,
    })
}
