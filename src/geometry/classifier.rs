//! Shape-metric classification
//!
//! Decides what an entity *is* (booth outline, column, building shell,
//! utility) from its type, closure, area and extents. Layer names are never
//! consulted, so the same rules work on drawings nobody has mapped yet.

use serde::{Deserialize, Serialize};

use crate::host::{BoundingBox, EntityKind};

/// Area gates, in drawing units squared
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    pub booth_area_min: f64,
    pub booth_area_max: f64,
    /// Exclusive upper bound on a column's bounding-box area
    pub column_area_max: f64,
    /// Count block inserts as utilities too
    pub utility_includes_inserts: bool,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            booth_area_min: 90.0,
            booth_area_max: 150.0,
            column_area_max: 50.0,
            utility_includes_inserts: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Booth,
    Building,
    Column,
    Utility,
    Unclassified,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Booth => "booth",
            Category::Building => "building",
            Category::Column => "column",
            Category::Utility => "utility",
            Category::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}

/// What the classifier needs to know about one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetrics {
    pub kind: EntityKind,
    pub closed: bool,
    /// Enclosed area, when the host can compute one
    pub area: Option<f64>,
    pub bbox: Option<BoundingBox>,
}

impl EntityMetrics {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            closed: false,
            area: None,
            bbox: None,
        }
    }

    pub fn closed_with_area(mut self, area: f64) -> Self {
        self.closed = true;
        self.area = Some(area);
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    fn bbox_area(&self) -> Option<f64> {
        self.bbox.map(|b| b.area())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub category: Category,
    /// Layer to relabel onto; `None` means highlight only
    pub target_layer: Option<String>,
}

impl ClassificationResult {
    /// Unclassified entities never carry a target layer
    pub fn new(category: Category, target_layer: Option<&str>) -> Self {
        let target_layer = match category {
            Category::Unclassified => None,
            _ => target_layer.map(str::to_string),
        };
        Self { category, target_layer }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeometricClassifier {
    thresholds: ClassifierThresholds,
}

impl GeometricClassifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    /// Closed polyline whose area lies in `[booth_area_min, booth_area_max]`
    pub fn is_booth(&self, m: &EntityMetrics) -> bool {
        m.kind.is_polyline()
            && m.closed
            && m.area
                .is_some_and(|a| a >= self.thresholds.booth_area_min && a <= self.thresholds.booth_area_max)
    }

    /// Circle or insert whose bounding-box area lies in `(0, column_area_max)`
    pub fn is_column(&self, m: &EntityMetrics) -> bool {
        matches!(m.kind, EntityKind::Circle | EntityKind::Insert)
            && m.bbox_area().is_some_and(|a| a > 0.0 && a < self.thresholds.column_area_max)
    }

    pub fn is_utility(&self, m: &EntityMetrics) -> bool {
        match m.kind {
            EntityKind::Hatch => true,
            EntityKind::Insert => self.thresholds.utility_includes_inserts,
            _ => false,
        }
    }

    pub fn is_building_candidate(m: &EntityMetrics) -> bool {
        (m.kind == EntityKind::Line || m.kind.is_polyline()) && m.bbox.is_some()
    }

    /// Index of the building outline: the line/polyline with the largest
    /// bounding box. Ties go to the first one seen.
    pub fn building_outline(&self, population: &[EntityMetrics]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, m) in population.iter().enumerate() {
            if !Self::is_building_candidate(m) {
                continue;
            }
            let area = m.bbox_area().unwrap_or(0.0);
            if best.is_none_or(|(_, top)| area > top) {
                best = Some((i, area));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Category of a single entity, without population context
    pub fn classify(&self, m: &EntityMetrics) -> Category {
        if self.is_booth(m) {
            Category::Booth
        } else if self.is_column(m) {
            Category::Column
        } else if self.is_utility(m) {
            Category::Utility
        } else {
            Category::Unclassified
        }
    }

    /// Categories for a whole population, including the single building outline
    pub fn classify_all(&self, population: &[EntityMetrics]) -> Vec<Category> {
        let mut categories: Vec<Category> = population.iter().map(|m| self.classify(m)).collect();
        if let Some(i) = self.building_outline(population) {
            categories[i] = Category::Building;
        }
        categories
    }
}
