//! Reserved-namespace command grammar: `NET:<VERB>[:<ARG1>[:<ARG2>]]`

use std::fmt;

use super::schema::ToolCall;
use crate::error::{ProofError, Result};

/// Prefix that routes a step to the dispatcher instead of the host command line
pub const NAMESPACE: &str = "NET:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    SelectLayer,
    SelectOuter,
    SelectInner,
    SelectBoothBoxes,
    SelectBuildingLines,
    SelectColumns,
    SelectUtilities,
    GetLayers,
    ApplyLayerMappings,
    RenameDeletedLayers,
    DeleteLayersByPrefix,
    LockBoothLayers,
    LearnLayerMapping,
    PrepareGeometry,
    QselectExplode,
    DeleteNonStandard,
    Message,
    Other(String),
}

impl Verb {
    pub fn name(&self) -> &str {
        match self {
            Verb::SelectLayer => "SELECT_LAYER",
            Verb::SelectOuter => "SELECT_OUTER",
            Verb::SelectInner => "SELECT_INNER",
            Verb::SelectBoothBoxes => "SELECT_BOOTH_BOXES",
            Verb::SelectBuildingLines => "SELECT_BUILDING_LINES",
            Verb::SelectColumns => "SELECT_COLUMNS",
            Verb::SelectUtilities => "SELECT_UTILITIES",
            Verb::GetLayers => "GET_LAYERS",
            Verb::ApplyLayerMappings => "APPLY_LAYER_MAPPINGS",
            Verb::RenameDeletedLayers => "RENAME_DELETED_LAYERS",
            Verb::DeleteLayersByPrefix => "DELETE_LAYERS_BY_PREFIX",
            Verb::LockBoothLayers => "LOCK_BOOTH_LAYERS",
            Verb::LearnLayerMapping => "LEARN_LAYER_MAPPING",
            Verb::PrepareGeometry => "PREPARE_GEOMETRY",
            Verb::QselectExplode => "QSELECT_EXPLODE",
            Verb::DeleteNonStandard => "DELETE_NON_STANDARD",
            Verb::Message => "MESSAGE",
            Verb::Other(name) => name,
        }
    }
}

impl From<&str> for Verb {
    fn from(s: &str) -> Self {
        let name = s.trim().to_ascii_uppercase();
        match name.as_str() {
            "SELECT_LAYER" => Verb::SelectLayer,
            "SELECT_OUTER" => Verb::SelectOuter,
            "SELECT_INNER" => Verb::SelectInner,
            "SELECT_BOOTH_BOXES" => Verb::SelectBoothBoxes,
            "SELECT_BUILDING_LINES" => Verb::SelectBuildingLines,
            "SELECT_COLUMNS" => Verb::SelectColumns,
            "SELECT_UTILITIES" => Verb::SelectUtilities,
            "GET_LAYERS" => Verb::GetLayers,
            "APPLY_LAYER_MAPPINGS" => Verb::ApplyLayerMappings,
            "RENAME_DELETED_LAYERS" => Verb::RenameDeletedLayers,
            "DELETE_LAYERS_BY_PREFIX" => Verb::DeleteLayersByPrefix,
            "LOCK_BOOTH_LAYERS" => Verb::LockBoothLayers,
            "LEARN_LAYER_MAPPING" => Verb::LearnLayerMapping,
            "PREPARE_GEOMETRY" => Verb::PrepareGeometry,
            "QSELECT_EXPLODE" => Verb::QselectExplode,
            "DELETE_NON_STANDARD" => Verb::DeleteNonStandard,
            "MESSAGE" => Verb::Message,
            _ => Verb::Other(name),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reserved-namespace command pulled out of a plan step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetCommand {
    /// Cleaned command text starting at the namespace prefix
    pub raw: String,
    pub verb: Verb,
    /// Everything after `<VERB>:`, untrimmed of inner colons
    pub rest: String,
}

impl NetCommand {
    /// Look in `lisp_code` first, then `command_name`
    pub fn extract(call: &ToolCall) -> Option<Self> {
        Self::parse(&call.lisp_code).or_else(|| Self::parse(&call.command_name))
    }

    /// Find the namespace prefix anywhere in `text` and decode what follows
    pub fn parse(text: &str) -> Option<Self> {
        let start = text.find(NAMESPACE)?;
        let tail = &text[start..];
        let line = tail.lines().next().unwrap_or(tail);
        let raw = line.trim_end_matches(|c: char| matches!(c, ')' | '"' | '`' | '\'') || c.is_whitespace());

        let body = &raw[NAMESPACE.len()..];
        let (verb, rest) = match body.split_once(':') {
            Some((verb, rest)) => (verb, rest),
            None => (body, ""),
        };
        if verb.trim().is_empty() {
            return None;
        }

        Some(Self {
            raw: raw.to_string(),
            verb: Verb::from(verb),
            rest: rest.to_string(),
        })
    }

    /// Colon-separated arguments, each trimmed
    pub fn args(&self) -> Vec<&str> {
        if self.rest.trim().is_empty() {
            return Vec::new();
        }
        self.rest.split(':').map(str::trim).collect()
    }

    /// Argument `index`, if present and non-empty
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args().get(index).copied().filter(|a| !a.is_empty())
    }

    pub fn required_arg(&self, index: usize, what: &str) -> Result<&str> {
        self.arg(index)
            .ok_or_else(|| ProofError::InvalidCommand(format!("{} requires {}", self.verb, what)))
    }
}

impl fmt::Display for NetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
