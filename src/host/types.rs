//! Value types exchanged with the drawing host

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque handle to one entity in the live drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:X}", self.0)
    }
}

/// Entity type, named after the DXF type code the host reports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityKind {
    Arc,
    Line,
    Circle,
    Ellipse,
    LwPolyline,
    /// Legacy heavy polyline; also how meshes are stored
    Polyline,
    Text,
    MText,
    Solid,
    Insert,
    Hatch,
    Spline,
    Dimension,
    Face3d,
    Other(String),
}

impl EntityKind {
    pub fn dxf_name(&self) -> &str {
        match self {
            EntityKind::Arc => "ARC",
            EntityKind::Line => "LINE",
            EntityKind::Circle => "CIRCLE",
            EntityKind::Ellipse => "ELLIPSE",
            EntityKind::LwPolyline => "LWPOLYLINE",
            EntityKind::Polyline => "POLYLINE",
            EntityKind::Text => "TEXT",
            EntityKind::MText => "MTEXT",
            EntityKind::Solid => "SOLID",
            EntityKind::Insert => "INSERT",
            EntityKind::Hatch => "HATCH",
            EntityKind::Spline => "SPLINE",
            EntityKind::Dimension => "DIMENSION",
            EntityKind::Face3d => "3DFACE",
            EntityKind::Other(name) => name,
        }
    }

    /// Polyline-like shapes that can enclose an area
    pub fn is_polyline(&self) -> bool {
        matches!(self, EntityKind::LwPolyline | EntityKind::Polyline)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dxf_name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase();
        if name.is_empty() {
            return Err("entity type name cannot be empty".to_string());
        }
        Ok(match name.as_str() {
            "ARC" => EntityKind::Arc,
            "LINE" => EntityKind::Line,
            "CIRCLE" => EntityKind::Circle,
            "ELLIPSE" => EntityKind::Ellipse,
            "LWPOLYLINE" => EntityKind::LwPolyline,
            "POLYLINE" => EntityKind::Polyline,
            "TEXT" => EntityKind::Text,
            "MTEXT" => EntityKind::MText,
            "SOLID" => EntityKind::Solid,
            "INSERT" => EntityKind::Insert,
            "HATCH" => EntityKind::Hatch,
            "SPLINE" => EntityKind::Spline,
            "DIMENSION" => EntityKind::Dimension,
            "3DFACE" => EntityKind::Face3d,
            _ => EntityKind::Other(name),
        })
    }
}

impl TryFrom<String> for EntityKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.dxf_name().to_string()
    }
}

/// Axis-aligned bounding box in drawing units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl BoundingBox {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f64 {
        (self.max[0] - self.min[0]).abs()
    }

    pub fn height(&self) -> f64 {
        (self.max[1] - self.min[1]).abs()
    }

    /// `width * height` of the box
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

/// Which entity types a query selects
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    Any,
    Only(Vec<EntityKind>),
    Not(Vec<EntityKind>),
}

impl KindFilter {
    pub fn matches(&self, kind: &EntityKind) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Only(kinds) => kinds.contains(kind),
            KindFilter::Not(kinds) => !kinds.contains(kind),
        }
    }
}

/// Selection criteria for `DrawingHost::query_entities`
#[derive(Debug, Clone, Default)]
pub struct EntityQuery {
    pub kinds: KindFilter,
    /// Layer name, compared case-insensitively
    pub layer: Option<String>,
    /// Also select members of block definitions, not just model space
    pub include_block_members: bool,
}

impl EntityQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_kinds(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            kinds: KindFilter::Only(kinds.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn excluding(kinds: impl IntoIterator<Item = EntityKind>) -> Self {
        Self {
            kinds: KindFilter::Not(kinds.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn on_layer(layer: impl Into<String>) -> Self {
        Self {
            layer: Some(layer.into()),
            ..Default::default()
        }
    }

    pub fn with_block_members(mut self) -> Self {
        self.include_block_members = true;
        self
    }
}

/// Layer table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub name: String,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default = "default_on")]
    pub on: bool,
}

fn default_on() -> bool {
    true
}

impl LayerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locked: false,
            frozen: false,
            on: true,
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

/// What a purge pass is allowed to remove
///
/// Unreferenced block definitions always go. Layers go only when named here and empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeScope {
    pub layers: Vec<String>,
}

impl PurgeScope {
    pub fn of_layers<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            layers: names.into_iter().map(Into::into).collect(),
        }
    }

    /// True when `name` is one of the scoped layers (case-insensitive)
    pub fn covers(&self, name: &str) -> bool {
        self.layers.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}
