//! Layer commands: selection, mapping, retirement, deletion and locking

use std::sync::Arc;

use async_trait::async_trait;

use super::provider::ToolProvider;
use crate::error::{ProofError, Result};
use crate::host::DrawingHost;
use crate::layers::{LayerLifecycle, get_layers, select_inner, select_layer, select_outer};
use crate::plan::{NetCommand, Verb};

const PROMPT_EXAMPLE: &str = "\
LAYER TOOLS:
- NET:GET_LAYERS:  list every layer
- NET:SELECT_LAYER:<layer>  highlight a layer's entities
- NET:SELECT_LAYER:<layer>:<targetLayer>  move a layer's entities onto another layer
- NET:SELECT_OUTER:<layer> / NET:SELECT_INNER:<layer>  highlight the outer boundary, or everything inside it
- NET:APPLY_LAYER_MAPPINGS  move entities from every known vendor layer onto its Expo_ layer
- NET:LEARN_LAYER_MAPPING:<sourceLayer>:<targetLayer>  remember a new vendor layer mapping
- NET:RENAME_DELETED_LAYERS  prefix every non-standard layer with Deleted_
- NET:DELETE_LAYERS_BY_PREFIX:Deleted_  erase and purge layers with a prefix
- NET:LOCK_BOOTH_LAYERS  lock Expo_BoothOutline and Expo_BoothNumber
Proofing order: PREPARE_GEOMETRY, APPLY_LAYER_MAPPINGS, SELECT_* for anything unmapped, RENAME_DELETED_LAYERS, DELETE_LAYERS_BY_PREFIX:Deleted_, LOCK_BOOTH_LAYERS.";

pub struct LayerTools {
    lifecycle: Arc<LayerLifecycle>,
}

impl LayerTools {
    pub fn new(lifecycle: Arc<LayerLifecycle>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl ToolProvider for LayerTools {
    fn name(&self) -> &str {
        "LayerTools"
    }

    fn target_version(&self) -> u32 {
        15
    }

    fn prompt_example(&self) -> &str {
        PROMPT_EXAMPLE
    }

    fn can_execute(&self, command: &NetCommand) -> bool {
        matches!(
            command.verb,
            Verb::SelectLayer
                | Verb::SelectOuter
                | Verb::SelectInner
                | Verb::GetLayers
                | Verb::ApplyLayerMappings
                | Verb::RenameDeletedLayers
                | Verb::DeleteLayersByPrefix
                | Verb::LockBoothLayers
                | Verb::LearnLayerMapping
        )
    }

    async fn execute(&self, host: &dyn DrawingHost, command: &NetCommand) -> Result<String> {
        match command.verb {
            Verb::GetLayers => get_layers(host).await,
            Verb::SelectLayer => {
                let layer = command.required_arg(0, "a layer name")?;
                select_layer(host, layer, command.arg(1)).await
            }
            Verb::SelectOuter => select_outer(host, command.required_arg(0, "a layer name")?).await,
            Verb::SelectInner => select_inner(host, command.required_arg(0, "a layer name")?).await,
            Verb::ApplyLayerMappings => Ok(self.lifecycle.apply_mappings(host).await?.to_string()),
            Verb::RenameDeletedLayers => {
                let renamed = self.lifecycle.rename_orphans(host).await?;
                Ok(format!(
                    "Renamed {} layer(s) with prefix {}",
                    renamed,
                    self.lifecycle.policy().retired_prefix
                ))
            }
            Verb::DeleteLayersByPrefix => {
                let prefix = command.required_arg(0, "a layer prefix")?;
                Ok(self.lifecycle.delete_by_prefix(host, prefix).await?.to_string())
            }
            Verb::LockBoothLayers => {
                let locked = self.lifecycle.lock_targets(host).await?;
                Ok(format!("Locked {} booth layer(s)", locked))
            }
            Verb::LearnLayerMapping => {
                let source = command.required_arg(0, "a source layer")?;
                let target = command.required_arg(1, "a target layer")?;
                let mapping = self.lifecycle.learn_mapping(source, target)?;
                Ok(format!(
                    "Learned mapping {} -> {} ({} total)",
                    source,
                    target,
                    mapping.len()
                ))
            }
            _ => Err(ProofError::InvalidCommand(format!("LayerTools does not handle {}", command.verb))),
        }
    }
}
