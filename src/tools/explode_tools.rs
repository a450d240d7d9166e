//! Type-scoped explode, for hosts that support quick-select

use std::sync::Arc;

use async_trait::async_trait;

use super::provider::ToolProvider;
use crate::error::{ProofError, Result};
use crate::geometry::ConvergenceEngine;
use crate::host::{DrawingHost, EntityKind};
use crate::plan::{NetCommand, Verb};

const PROMPT_EXAMPLE: &str = "\
EXPLODE TOOLS:
- NET:QSELECT_EXPLODE:<entityType>  explode every entity of one DXF type once, e.g. NET:QSELECT_EXPLODE:MTEXT or NET:QSELECT_EXPLODE:INSERT";

pub struct ExplodeTools {
    engine: Arc<ConvergenceEngine>,
}

impl ExplodeTools {
    pub fn new(engine: Arc<ConvergenceEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ToolProvider for ExplodeTools {
    fn name(&self) -> &str {
        "ExplodeTools"
    }

    fn target_version(&self) -> u32 {
        19
    }

    fn prompt_example(&self) -> &str {
        PROMPT_EXAMPLE
    }

    fn can_execute(&self, command: &NetCommand) -> bool {
        command.verb == Verb::QselectExplode
    }

    async fn execute(&self, host: &dyn DrawingHost, command: &NetCommand) -> Result<String> {
        let kind: EntityKind = command
            .required_arg(0, "an entity type")?
            .parse()
            .map_err(ProofError::InvalidCommand)?;
        let (before, after) = self.engine.qselect_explode(host, &kind).await?;
        Ok(format!("Exploded {} {} entities, {} remain", before, kind, after))
    }
}
