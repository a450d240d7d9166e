//! Layer-scoped selection helpers

use log::debug;

use crate::error::{ProofError, Result};
use crate::host::{DrawingHost, EntityHandle, EntityQuery};

/// Comma-separated layer names, as reported to the planner
pub async fn get_layers(host: &dyn DrawingHost) -> Result<String> {
    let names: Vec<String> = host.list_layers().await?.into_iter().map(|l| l.name).collect();
    Ok(format!("Layers found: {}", names.join(", ")))
}

async fn entities_on(host: &dyn DrawingHost, layer: &str) -> Result<(String, Vec<EntityHandle>)> {
    let info = host
        .find_layer(layer)
        .await?
        .ok_or_else(|| ProofError::Host(format!("Layer '{}' not found", layer)))?;
    let entities = host.query_entities(&EntityQuery::on_layer(&info.name)).await?;
    Ok((info.name, entities))
}

/// Highlight a layer's entities, or move them onto `target` when one is given
pub async fn select_layer(host: &dyn DrawingHost, layer: &str, target: Option<&str>) -> Result<String> {
    let (layer, entities) = entities_on(host, layer).await?;
    match target {
        Some(target) => {
            host.create_layer(target).await?;
            host.set_layer_lock(&layer, false).await?;
            let mut moved = 0;
            for entity in &entities {
                match host.set_layer(*entity, target).await {
                    Ok(()) => moved += 1,
                    Err(e) => debug!("could not move {}: {}", entity, e),
                }
            }
            Ok(format!("Moved {} of {} entities from {} to {}", moved, entities.len(), layer, target))
        }
        None => {
            for entity in &entities {
                host.highlight(*entity, true).await?;
            }
            Ok(format!("Selected {} entities on {}", entities.len(), layer))
        }
    }
}

/// Entity with the largest bounding box among `entities`; first wins ties
async fn outermost(host: &dyn DrawingHost, entities: &[EntityHandle]) -> Result<Option<EntityHandle>> {
    let mut best: Option<(EntityHandle, f64)> = None;
    for entity in entities {
        let Ok(bbox) = host.bounding_box(*entity).await else {
            continue;
        };
        let area = bbox.area();
        if best.is_none_or(|(_, top)| area > top) {
            best = Some((*entity, area));
        }
    }
    Ok(best.map(|(h, _)| h))
}

/// Highlight the outer boundary of a layer
pub async fn select_outer(host: &dyn DrawingHost, layer: &str) -> Result<String> {
    let (layer, entities) = entities_on(host, layer).await?;
    match outermost(host, &entities).await? {
        Some(outer) => {
            host.highlight(outer, true).await?;
            Ok(format!("Selected outer boundary on {}", layer))
        }
        None => Ok(format!("No measurable entities on {}", layer)),
    }
}

/// Highlight everything on a layer except its outer boundary
pub async fn select_inner(host: &dyn DrawingHost, layer: &str) -> Result<String> {
    let (layer, entities) = entities_on(host, layer).await?;
    let outer = outermost(host, &entities).await?;
    let mut selected = 0;
    for entity in entities.iter().filter(|e| Some(**e) != outer) {
        host.highlight(*entity, true).await?;
        selected += 1;
    }
    Ok(format!("Selected {} inner entities on {}", selected, layer))
}
