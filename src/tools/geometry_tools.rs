//! Shape-based selection and geometry preparation commands

use std::sync::Arc;

use async_trait::async_trait;

use super::provider::ToolProvider;
use crate::error::{ProofError, Result};
use crate::geometry::{ConvergenceEngine, Feature, GeometricClassifier, select_feature};
use crate::host::DrawingHost;
use crate::layers::LayerLifecycle;
use crate::plan::{NetCommand, Verb};

const PROMPT_EXAMPLE: &str = "\
GEOMETRY TOOLS (identify features by shape, not by layer name):
- NET:PREPARE_GEOMETRY  unlocks layers, shields booth output layers, flattens splines, explodes blocks until only ARC/LINE/CIRCLE/ELLIPSE/LWPOLYLINE/TEXT/SOLID remain, erases the rest. Run this FIRST.
- NET:SELECT_BOOTH_BOXES:Expo_BoothOutline  closed polylines with booth-sized area
- NET:SELECT_BUILDING_LINES:Expo_Building  the largest line/polyline outline
- NET:SELECT_COLUMNS:Expo_Column  small circles and blocks
- NET:SELECT_UTILITIES:Expo_Markings  hatches
- NET:DELETE_NON_STANDARD  erase anything outside the primitive whitelist
Omit the target layer to highlight matches instead of moving them.";

pub struct GeometryTools {
    classifier: GeometricClassifier,
    engine: Arc<ConvergenceEngine>,
    lifecycle: Arc<LayerLifecycle>,
}

impl GeometryTools {
    pub fn new(classifier: GeometricClassifier, engine: Arc<ConvergenceEngine>, lifecycle: Arc<LayerLifecycle>) -> Self {
        Self {
            classifier,
            engine,
            lifecycle,
        }
    }

    fn feature(verb: &Verb) -> Option<Feature> {
        match verb {
            Verb::SelectBoothBoxes => Some(Feature::BoothBoxes),
            Verb::SelectBuildingLines => Some(Feature::BuildingLines),
            Verb::SelectColumns => Some(Feature::Columns),
            Verb::SelectUtilities => Some(Feature::Utilities),
            _ => None,
        }
    }
}

#[async_trait]
impl ToolProvider for GeometryTools {
    fn name(&self) -> &str {
        "GeometryTools"
    }

    fn target_version(&self) -> u32 {
        15
    }

    fn prompt_example(&self) -> &str {
        PROMPT_EXAMPLE
    }

    fn can_execute(&self, command: &NetCommand) -> bool {
        Self::feature(&command.verb).is_some()
            || matches!(command.verb, Verb::PrepareGeometry | Verb::DeleteNonStandard)
    }

    async fn execute(&self, host: &dyn DrawingHost, command: &NetCommand) -> Result<String> {
        if let Some(feature) = Self::feature(&command.verb) {
            let outcome = select_feature(host, &self.classifier, feature, command.arg(0)).await?;
            return Ok(outcome.to_string());
        }
        match command.verb {
            Verb::PrepareGeometry => {
                let shielded = self.lifecycle.shielded_layers()?;
                let report = self.engine.prepare_geometry(host, &shielded).await?;
                Ok(report.to_string())
            }
            Verb::DeleteNonStandard => {
                let erased = self.engine.delete_non_standard(host).await?;
                Ok(format!("Erased {} non-standard entities", erased))
            }
            _ => Err(ProofError::InvalidCommand(format!(
                "GeometryTools does not handle {}",
                command.verb
            ))),
        }
    }
}
