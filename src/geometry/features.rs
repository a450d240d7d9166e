//! Feature selection against a live drawing
//!
//! Gathers metrics for candidate entities, runs the classifier, then either
//! relabels the matches onto a target layer or highlights them for review.

use std::fmt;

use log::debug;

use super::classifier::{Category, ClassificationResult, EntityMetrics, GeometricClassifier};
use crate::error::Result;
use crate::host::{DrawingHost, EntityHandle, EntityKind, EntityQuery};

/// Drawing feature a SELECT_* command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    BoothBoxes,
    BuildingLines,
    Columns,
    Utilities,
}

impl Feature {
    pub fn category(&self) -> Category {
        match self {
            Feature::BoothBoxes => Category::Booth,
            Feature::BuildingLines => Category::Building,
            Feature::Columns => Category::Column,
            Feature::Utilities => Category::Utility,
        }
    }

    fn candidate_kinds(&self) -> Vec<EntityKind> {
        match self {
            Feature::BoothBoxes => vec![EntityKind::LwPolyline, EntityKind::Polyline],
            Feature::BuildingLines => vec![EntityKind::Line, EntityKind::LwPolyline, EntityKind::Polyline],
            Feature::Columns => vec![EntityKind::Circle, EntityKind::Insert],
            Feature::Utilities => vec![EntityKind::Hatch, EntityKind::Insert],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Feature::BoothBoxes => "booth boxes",
            Feature::BuildingLines => "building lines",
            Feature::Columns => "columns",
            Feature::Utilities => "utilities",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOutcome {
    pub feature: Feature,
    pub matched: usize,
    pub relabeled: usize,
    pub highlighted: usize,
    /// Matches the host refused to touch
    pub skipped: usize,
    pub target_layer: Option<String>,
}

impl fmt::Display for SelectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target_layer {
            Some(target) => write!(
                f,
                "Found {} {}, moved {} to {}",
                self.matched,
                self.feature.label(),
                self.relabeled,
                target
            )?,
            None => write!(f, "Found {} {}, highlighted {}", self.matched, self.feature.label(), self.highlighted)?,
        }
        if self.skipped > 0 {
            write!(f, " ({} skipped)", self.skipped)?;
        }
        Ok(())
    }
}

/// Collect classifier input for one entity; missing area or extents stay `None`
pub async fn gather_metrics(host: &dyn DrawingHost, entity: EntityHandle) -> Result<EntityMetrics> {
    let kind = host.entity_kind(entity).await?;
    let closed = host.is_closed(entity).await.unwrap_or(false);
    let area = if closed { host.area(entity).await.ok() } else { None };
    let bbox = host.bounding_box(entity).await.ok();
    Ok(EntityMetrics { kind, closed, area, bbox })
}

/// Entities in model space that the classifier puts in `feature`'s category
pub async fn find_feature(
    host: &dyn DrawingHost,
    classifier: &GeometricClassifier,
    feature: Feature,
) -> Result<Vec<EntityHandle>> {
    let candidates = host
        .query_entities(&EntityQuery::of_kinds(feature.candidate_kinds()))
        .await?;

    let mut handles = Vec::with_capacity(candidates.len());
    let mut population = Vec::with_capacity(candidates.len());
    for entity in candidates {
        match gather_metrics(host, entity).await {
            Ok(metrics) => {
                handles.push(entity);
                population.push(metrics);
            }
            Err(e) => debug!("skipping {}: {}", entity, e),
        }
    }

    // the building outline only exists relative to its candidate population
    let categories = match feature {
        Feature::BuildingLines => classifier.classify_all(&population),
        _ => population.iter().map(|m| classifier.classify(m)).collect(),
    };

    let wanted = feature.category();
    Ok(handles
        .into_iter()
        .zip(categories)
        .filter(|(_, category)| *category == wanted)
        .map(|(h, _)| h)
        .collect())
}

/// Relabel every match onto `target_layer` (created if absent), or highlight them when no target is given
pub async fn select_feature(
    host: &dyn DrawingHost,
    classifier: &GeometricClassifier,
    feature: Feature,
    target_layer: Option<&str>,
) -> Result<SelectionOutcome> {
    let matches = find_feature(host, classifier, feature).await?;
    let result = ClassificationResult::new(feature.category(), target_layer);
    let mut outcome = SelectionOutcome {
        feature,
        matched: matches.len(),
        relabeled: 0,
        highlighted: 0,
        skipped: 0,
        target_layer: result.target_layer.clone(),
    };

    match result.target_layer.as_deref() {
        Some(target) => {
            host.create_layer(target).await?;
            for entity in matches {
                match host.set_layer(entity, target).await {
                    Ok(()) => outcome.relabeled += 1,
                    Err(e) => {
                        debug!("could not relabel {}: {}", entity, e);
                        outcome.skipped += 1;
                    }
                }
            }
        }
        None => {
            for entity in matches {
                match host.highlight(entity, true).await {
                    Ok(()) => outcome.highlighted += 1,
                    Err(e) => {
                        debug!("could not highlight {}: {}", entity, e);
                        outcome.skipped += 1;
                    }
                }
            }
        }
    }

    Ok(outcome)
}
