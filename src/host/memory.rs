//! In-memory drawing host
//!
//! Holds a whole drawing behind a mutex and applies the same layer-lock
//! rules a native host does. Drawings are loaded from and saved to a JSON
//! [`DrawingSnapshot`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::DrawingHost;
use super::types::{BoundingBox, EntityHandle, EntityKind, EntityQuery, LayerInfo, PurgeScope};
use crate::error::{ProofError, Result};

const DEFAULT_HOST_VERSION: u32 = 24;

/// Layers a purge never removes
const UNPURGEABLE: [&str; 2] = ["0", "Defpoints"];

/// One entity as stored in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub kind: EntityKind,

    /// Empty means "inherit the parent's layer" for explode children
    #[serde(default)]
    pub layer: String,

    #[serde(default)]
    pub closed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,

    /// What one explode pass turns this entity into; `None` means it cannot be exploded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explodes_into: Option<Vec<EntitySpec>>,

    /// Name of the block definition this entity belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_of: Option<String>,

    /// Block definition an INSERT references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_ref: Option<String>,
}

impl EntitySpec {
    pub fn new(kind: EntityKind, layer: impl Into<String>) -> Self {
        Self {
            kind,
            layer: layer.into(),
            closed: false,
            area: None,
            bbox: None,
            explodes_into: None,
            member_of: None,
            block_ref: None,
        }
    }

    /// Closed LWPOLYLINE with the given enclosed area
    pub fn closed_polyline(layer: impl Into<String>, area: f64) -> Self {
        let side = area.sqrt();
        Self {
            closed: true,
            area: Some(area),
            bbox: Some(BoundingBox::new([0.0, 0.0], [side, side])),
            ..Self::new(EntityKind::LwPolyline, layer)
        }
    }

    pub fn with_bbox(mut self, width: f64, height: f64) -> Self {
        self.bbox = Some(BoundingBox::new([0.0, 0.0], [width, height]));
        self
    }

    pub fn exploding_into(mut self, children: Vec<EntitySpec>) -> Self {
        self.explodes_into = Some(children);
        self
    }

    pub fn in_block(mut self, block: impl Into<String>) -> Self {
        self.member_of = Some(block.into());
        self
    }

    pub fn referencing(mut self, block: impl Into<String>) -> Self {
        self.block_ref = Some(block.into());
        self
    }
}

/// Serializable form of a whole drawing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_current_layer")]
    pub current_layer: String,

    #[serde(default)]
    pub layers: Vec<LayerInfo>,

    #[serde(default)]
    pub entities: Vec<EntitySpec>,
}

fn default_version() -> u32 {
    DEFAULT_HOST_VERSION
}

fn default_current_layer() -> String {
    "0".to_string()
}

impl Default for DrawingSnapshot {
    fn default() -> Self {
        Self {
            version: DEFAULT_HOST_VERSION,
            current_layer: default_current_layer(),
            layers: Vec::new(),
            entities: Vec::new(),
        }
    }
}

impl DrawingSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[derive(Debug)]
struct State {
    version: u32,
    current_layer: String,
    layers: Vec<LayerInfo>,
    entities: BTreeMap<u64, EntitySpec>,
    next_handle: u64,
    highlighted: BTreeSet<u64>,
    raw_commands: Vec<String>,
    explode_calls: usize,
    erase_calls: usize,
}

impl State {
    fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name.eq_ignore_ascii_case(name))
    }

    fn layer(&self, name: &str) -> Option<&LayerInfo> {
        self.layer_index(name).map(|i| &self.layers[i])
    }

    fn layer_mut(&mut self, name: &str) -> Result<&mut LayerInfo> {
        match self.layer_index(name) {
            Some(i) => Ok(&mut self.layers[i]),
            None => Err(ProofError::Host(format!("no layer named '{}'", name))),
        }
    }

    fn ensure_layer(&mut self, name: &str) {
        if self.layer_index(name).is_none() {
            self.layers.push(LayerInfo::new(name));
        }
    }

    /// Entity sits on a layer that blocks editing
    fn is_shielded(&self, spec: &EntitySpec) -> bool {
        self.layer(&spec.layer).map(|l| l.locked || l.frozen).unwrap_or(false)
    }

    fn entity(&self, handle: EntityHandle) -> Result<&EntitySpec> {
        self.entities
            .get(&handle.0)
            .ok_or_else(|| ProofError::Host(format!("no entity {}", handle)))
    }

    fn insert(&mut self, mut spec: EntitySpec) -> u64 {
        if spec.layer.is_empty() {
            spec.layer = "0".to_string();
        }
        self.ensure_layer(&spec.layer);
        let handle = self.next_handle;
        self.next_handle += 1;
        self.entities.insert(handle, spec);
        handle
    }

    fn layer_in_use(&self, name: &str) -> bool {
        self.entities.values().any(|e| e.layer.eq_ignore_ascii_case(name))
    }

    fn purgeable(&self, layer: &LayerInfo) -> bool {
        !UNPURGEABLE.iter().any(|p| p.eq_ignore_ascii_case(&layer.name))
            && !layer.name.eq_ignore_ascii_case(&self.current_layer)
            && !self.layer_in_use(&layer.name)
    }
}

/// Complete in-memory drawing implementing [`DrawingHost`]
#[derive(Debug)]
pub struct InMemoryHost {
    state: Mutex<State>,
    reachable: bool,
    failing_raw: Option<String>,
}

impl InMemoryHost {
    pub fn new(snapshot: DrawingSnapshot) -> Self {
        let mut state = State {
            version: snapshot.version,
            current_layer: snapshot.current_layer,
            layers: Vec::new(),
            entities: BTreeMap::new(),
            next_handle: 1,
            highlighted: BTreeSet::new(),
            raw_commands: Vec::new(),
            explode_calls: 0,
            erase_calls: 0,
        };
        state.ensure_layer("0");
        for layer in snapshot.layers {
            match state.layer_index(&layer.name) {
                Some(i) => state.layers[i] = layer,
                None => state.layers.push(layer),
            }
        }
        let current = state.current_layer.clone();
        state.ensure_layer(&current);
        for entity in snapshot.entities {
            state.insert(entity);
        }
        Self {
            state: Mutex::new(state),
            reachable: true,
            failing_raw: None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(DrawingSnapshot::load(path)?))
    }

    /// A host that refuses every connection attempt
    pub fn disconnected() -> Self {
        Self {
            reachable: false,
            ..Self::new(DrawingSnapshot::default())
        }
    }

    /// Raw commands containing `pattern` fail with a host error
    pub fn with_failing_raw(mut self, pattern: impl Into<String>) -> Self {
        self.failing_raw = Some(pattern.into());
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| ProofError::Host("drawing state poisoned".to_string()))
    }

    /// Current drawing, in snapshot form
    pub fn snapshot(&self) -> Result<DrawingSnapshot> {
        let state = self.state()?;
        Ok(DrawingSnapshot {
            version: state.version,
            current_layer: state.current_layer.clone(),
            layers: state.layers.clone(),
            entities: state.entities.values().cloned().collect(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.snapshot()?.save(path)
    }

    pub fn layer(&self, name: &str) -> Option<LayerInfo> {
        self.state().ok().and_then(|s| s.layer(name).cloned())
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.state()
            .map(|s| s.layers.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Entities on a layer, block members included
    pub fn entities_on(&self, layer: &str) -> usize {
        self.state()
            .map(|s| s.entities.values().filter(|e| e.layer.eq_ignore_ascii_case(layer)).count())
            .unwrap_or(0)
    }

    pub fn entity_count(&self) -> usize {
        self.state().map(|s| s.entities.len()).unwrap_or(0)
    }

    pub fn kinds(&self) -> Vec<EntityKind> {
        self.state()
            .map(|s| s.entities.values().map(|e| e.kind.clone()).collect())
            .unwrap_or_default()
    }

    pub fn highlighted(&self) -> Vec<EntityHandle> {
        self.state()
            .map(|s| s.highlighted.iter().copied().map(EntityHandle).collect())
            .unwrap_or_default()
    }

    pub fn raw_commands(&self) -> Vec<String> {
        self.state().map(|s| s.raw_commands.clone()).unwrap_or_default()
    }

    pub fn explode_calls(&self) -> usize {
        self.state().map(|s| s.explode_calls).unwrap_or(0)
    }

    pub fn erase_calls(&self) -> usize {
        self.state().map(|s| s.erase_calls).unwrap_or(0)
    }

    pub fn current_layer(&self) -> String {
        self.state().map(|s| s.current_layer.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DrawingHost for InMemoryHost {
    async fn connect(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(ProofError::ConnectionFailure("no running drawing session".to_string()))
        }
    }

    async fn host_version(&self) -> Result<u32> {
        Ok(self.state()?.version)
    }

    async fn list_layers(&self) -> Result<Vec<LayerInfo>> {
        Ok(self.state()?.layers.clone())
    }

    async fn query_entities(&self, query: &EntityQuery) -> Result<Vec<EntityHandle>> {
        let state = self.state()?;
        Ok(state
            .entities
            .iter()
            .filter(|(_, e)| query.include_block_members || e.member_of.is_none())
            .filter(|(_, e)| query.kinds.matches(&e.kind))
            .filter(|(_, e)| {
                query
                    .layer
                    .as_ref()
                    .is_none_or(|layer| e.layer.eq_ignore_ascii_case(layer))
            })
            .map(|(h, _)| EntityHandle(*h))
            .collect())
    }

    async fn entity_kind(&self, entity: EntityHandle) -> Result<EntityKind> {
        Ok(self.state()?.entity(entity)?.kind.clone())
    }

    async fn is_closed(&self, entity: EntityHandle) -> Result<bool> {
        Ok(self.state()?.entity(entity)?.closed)
    }

    async fn bounding_box(&self, entity: EntityHandle) -> Result<BoundingBox> {
        self.state()?
            .entity(entity)?
            .bbox
            .ok_or_else(|| ProofError::Host(format!("entity {} has no extents", entity)))
    }

    async fn area(&self, entity: EntityHandle) -> Result<f64> {
        let state = self.state()?;
        let spec = state.entity(entity)?;
        match spec.area {
            Some(area) if spec.closed => Ok(area),
            _ => Err(ProofError::Host(format!("entity {} does not enclose an area", entity))),
        }
    }

    async fn set_layer(&self, entity: EntityHandle, layer: &str) -> Result<()> {
        let mut state = self.state()?;
        let target = state
            .layer(layer)
            .map(|l| l.name.clone())
            .ok_or_else(|| ProofError::Host(format!("no layer named '{}'", layer)))?;
        let spec = state.entity(entity)?;
        if state.is_shielded(spec) {
            return Err(ProofError::Host(format!("entity {} is on a locked layer", entity)));
        }
        if let Some(spec) = state.entities.get_mut(&entity.0) {
            spec.layer = target;
        }
        Ok(())
    }

    async fn highlight(&self, entity: EntityHandle, on: bool) -> Result<()> {
        let mut state = self.state()?;
        state.entity(entity)?;
        if on {
            state.highlighted.insert(entity.0);
        } else {
            state.highlighted.remove(&entity.0);
        }
        Ok(())
    }

    async fn create_layer(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(ProofError::Host("layer name cannot be empty".to_string()));
        }
        self.state()?.ensure_layer(name);
        Ok(())
    }

    async fn set_layer_lock(&self, name: &str, locked: bool) -> Result<()> {
        self.state()?.layer_mut(name)?.locked = locked;
        Ok(())
    }

    async fn set_layer_freeze(&self, name: &str, frozen: bool) -> Result<()> {
        let mut state = self.state()?;
        if frozen && state.current_layer.eq_ignore_ascii_case(name) {
            return Err(ProofError::Host(format!("cannot freeze the current layer '{}'", name)));
        }
        state.layer_mut(name)?.frozen = frozen;
        Ok(())
    }

    async fn set_layer_visibility(&self, name: &str, on: bool) -> Result<()> {
        self.state()?.layer_mut(name)?.on = on;
        Ok(())
    }

    async fn rename_layer(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut state = self.state()?;
        if old_name == "0" {
            return Err(ProofError::Host("layer 0 cannot be renamed".to_string()));
        }
        if old_name.contains('|') {
            return Err(ProofError::Host(format!("xref-dependent layer '{}' cannot be renamed", old_name)));
        }
        if new_name.trim().is_empty() {
            return Err(ProofError::Host("layer name cannot be empty".to_string()));
        }
        if !old_name.eq_ignore_ascii_case(new_name) && state.layer(new_name).is_some() {
            return Err(ProofError::Host(format!("layer '{}' already exists", new_name)));
        }
        let layer = state.layer_mut(old_name)?;
        let previous = std::mem::replace(&mut layer.name, new_name.to_string());
        for spec in state.entities.values_mut() {
            if spec.layer.eq_ignore_ascii_case(&previous) {
                spec.layer = new_name.to_string();
            }
        }
        if state.current_layer.eq_ignore_ascii_case(&previous) {
            state.current_layer = new_name.to_string();
        }
        Ok(())
    }

    async fn set_current_layer(&self, name: &str) -> Result<()> {
        let mut state = self.state()?;
        let layer = state
            .layer(name)
            .ok_or_else(|| ProofError::Host(format!("no layer named '{}'", name)))?;
        if layer.frozen {
            return Err(ProofError::Host(format!("layer '{}' is frozen", name)));
        }
        let resolved = layer.name.clone();
        state.current_layer = resolved;
        Ok(())
    }

    async fn explode_selection(&self, entities: &[EntityHandle]) -> Result<()> {
        let mut state = self.state()?;
        state.explode_calls += 1;
        for handle in entities {
            let Some(spec) = state.entities.get(&handle.0) else {
                continue;
            };
            if state.is_shielded(spec) {
                continue;
            }
            let Some(children) = spec.explodes_into.clone() else {
                continue;
            };
            let parent_layer = spec.layer.clone();
            let parent_block = spec.member_of.clone();
            state.entities.remove(&handle.0);
            state.highlighted.remove(&handle.0);
            for mut child in children {
                if child.layer.is_empty() {
                    child.layer = parent_layer.clone();
                }
                if child.member_of.is_none() {
                    child.member_of = parent_block.clone();
                }
                state.insert(child);
            }
        }
        Ok(())
    }

    async fn erase_selection(&self, entities: &[EntityHandle]) -> Result<usize> {
        let mut state = self.state()?;
        state.erase_calls += 1;
        let mut erased = 0;
        for handle in entities {
            let shielded = match state.entities.get(&handle.0) {
                Some(spec) => state.is_shielded(spec),
                None => continue,
            };
            if shielded {
                continue;
            }
            state.entities.remove(&handle.0);
            state.highlighted.remove(&handle.0);
            erased += 1;
        }
        Ok(erased)
    }

    async fn flatten_selection(&self, entities: &[EntityHandle]) -> Result<usize> {
        let mut state = self.state()?;
        let mut flattened = 0;
        for handle in entities {
            let eligible = match state.entities.get(&handle.0) {
                Some(spec) => spec.kind == EntityKind::Spline && !state.is_shielded(spec),
                None => false,
            };
            if !eligible {
                continue;
            }
            if let Some(spec) = state.entities.get_mut(&handle.0) {
                spec.kind = EntityKind::LwPolyline;
                spec.closed = false;
                spec.area = None;
                spec.explodes_into = None;
                flattened += 1;
            }
        }
        Ok(flattened)
    }

    async fn purge(&self, scope: &PurgeScope) -> Result<usize> {
        let mut state = self.state()?;
        // Layers are judged before block definitions go, so members of an
        // unreferenced block only free their layer on the next pass.
        let doomed: HashSet<String> = state
            .layers
            .iter()
            .filter(|l| scope.covers(&l.name))
            .filter(|l| state.purgeable(l))
            .map(|l| l.name.clone())
            .collect();
        state.layers.retain(|l| !doomed.contains(&l.name));

        let referenced: HashSet<String> = state
            .entities
            .values()
            .filter(|e| e.member_of.is_none())
            .filter_map(|e| e.block_ref.clone())
            .collect();
        state
            .entities
            .retain(|_, e| e.member_of.as_ref().is_none_or(|b| referenced.contains(b)));
        Ok(doomed.len())
    }

    async fn execute_raw(&self, command: &str) -> Result<()> {
        let mut state = self.state()?;
        state.raw_commands.push(command.to_string());
        match &self.failing_raw {
            Some(pattern) if command.contains(pattern.as_str()) => {
                Err(ProofError::Host(format!("command rejected: {}", command)))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawing() -> InMemoryHost {
        InMemoryHost::new(DrawingSnapshot {
            layers: vec![LayerInfo::new("walls"), LayerInfo::new("frozen_stuff")],
            entities: vec![
                EntitySpec::new(EntityKind::Line, "walls").with_bbox(10.0, 0.0),
                EntitySpec::closed_polyline("booths", 100.0),
                EntitySpec::new(EntityKind::Insert, "walls")
                    .exploding_into(vec![
                        EntitySpec::new(EntityKind::Line, ""),
                        EntitySpec::new(EntityKind::Arc, "detail"),
                    ]),
            ],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_unknown_entity_layers_are_created() {
        let host = drawing();
        let names = host.layer_names();
        assert!(names.contains(&"0".to_string()));
        assert!(names.contains(&"booths".to_string()));
    }

    #[tokio::test]
    async fn test_query_filters() {
        let host = drawing();
        let all = host.query_entities(&EntityQuery::all()).await.unwrap();
        assert_eq!(all.len(), 3);

        let on_walls = host.query_entities(&EntityQuery::on_layer("WALLS")).await.unwrap();
        assert_eq!(on_walls.len(), 2);

        let inserts = host
            .query_entities(&EntityQuery::of_kinds([EntityKind::Insert]))
            .await
            .unwrap();
        assert_eq!(inserts.len(), 1);
    }

    #[tokio::test]
    async fn test_explode_inherits_layer() {
        let host = drawing();
        let inserts = host
            .query_entities(&EntityQuery::of_kinds([EntityKind::Insert]))
            .await
            .unwrap();
        host.explode_selection(&inserts).await.unwrap();

        assert_eq!(host.entity_count(), 4);
        assert_eq!(host.entities_on("walls"), 2);
        assert_eq!(host.entities_on("detail"), 1);
        assert_eq!(host.explode_calls(), 1);
    }

    #[tokio::test]
    async fn test_locked_layer_blocks_explode_and_erase() {
        let host = drawing();
        host.set_layer_lock("walls", true).await.unwrap();
        let all = host.query_entities(&EntityQuery::all()).await.unwrap();

        host.explode_selection(&all).await.unwrap();
        assert_eq!(host.entity_count(), 3);

        let erased = host.erase_selection(&all).await.unwrap();
        assert_eq!(erased, 1);
        assert_eq!(host.entity_count(), 2);
    }

    #[tokio::test]
    async fn test_set_layer_on_locked_fails() {
        let host = drawing();
        host.set_layer_lock("walls", true).await.unwrap();
        let walls = host.query_entities(&EntityQuery::on_layer("walls")).await.unwrap();
        let err = host.set_layer(walls[0], "booths").await.unwrap_err();
        assert!(matches!(err, ProofError::Host(_)));
    }

    #[tokio::test]
    async fn test_set_layer_requires_target() {
        let host = drawing();
        let walls = host.query_entities(&EntityQuery::on_layer("walls")).await.unwrap();
        assert!(host.set_layer(walls[0], "nowhere").await.is_err());
        host.create_layer("nowhere").await.unwrap();
        host.set_layer(walls[0], "nowhere").await.unwrap();
        assert_eq!(host.entities_on("nowhere"), 1);
    }

    #[tokio::test]
    async fn test_area_requires_closed_shape() {
        let host = drawing();
        let handles = host.query_entities(&EntityQuery::all()).await.unwrap();
        assert!(host.area(handles[0]).await.is_err());
        assert_eq!(host.area(handles[1]).await.unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_flatten_spline() {
        let host = InMemoryHost::new(DrawingSnapshot {
            entities: vec![EntitySpec::new(EntityKind::Spline, "curves")],
            ..Default::default()
        });
        let splines = host
            .query_entities(&EntityQuery::of_kinds([EntityKind::Spline]))
            .await
            .unwrap();
        assert_eq!(host.flatten_selection(&splines).await.unwrap(), 1);
        assert_eq!(host.kinds(), vec![EntityKind::LwPolyline]);
        assert!(!host.is_closed(splines[0]).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_layer_moves_entities() {
        let host = drawing();
        host.rename_layer("walls", "Deleted_walls").await.unwrap();
        assert_eq!(host.entities_on("Deleted_walls"), 2);
        assert!(host.layer("walls").is_none());
        assert!(host.rename_layer("0", "zero").await.is_err());
        assert!(host.rename_layer("booths", "DELETED_WALLS").await.is_err());

        let xref = InMemoryHost::new(DrawingSnapshot {
            layers: vec![LayerInfo::new("site|walls")],
            ..Default::default()
        });
        assert!(xref.rename_layer("site|walls", "Deleted_site|walls").await.is_err());
        assert!(xref.layer("site|walls").is_some());
    }

    #[tokio::test]
    async fn test_purge_needs_two_passes_for_block_layers() {
        let host = InMemoryHost::new(DrawingSnapshot {
            entities: vec![EntitySpec::new(EntityKind::Line, "hidden").in_block("LOGO")],
            ..Default::default()
        });
        let scope = PurgeScope::of_layers(["hidden"]);
        assert_eq!(host.purge(&scope).await.unwrap(), 0);
        assert!(host.layer("hidden").is_some());
        assert_eq!(host.entity_count(), 0);
        assert_eq!(host.purge(&scope).await.unwrap(), 1);
        assert!(host.layer("hidden").is_none());
    }

    #[tokio::test]
    async fn test_purge_keeps_referenced_blocks() {
        let host = InMemoryHost::new(DrawingSnapshot {
            entities: vec![
                EntitySpec::new(EntityKind::Line, "logo").in_block("LOGO"),
                EntitySpec::new(EntityKind::Insert, "0").referencing("LOGO"),
            ],
            ..Default::default()
        });
        host.purge(&PurgeScope::of_layers(["logo"])).await.unwrap();
        assert_eq!(host.entity_count(), 2);
        assert!(host.layer("logo").is_some());
    }

    #[tokio::test]
    async fn test_purge_never_removes_current_or_zero() {
        let host = InMemoryHost::new(DrawingSnapshot {
            current_layer: "work".to_string(),
            layers: vec![LayerInfo::new("work"), LayerInfo::new("Defpoints"), LayerInfo::new("empty")],
            ..Default::default()
        });
        let scope = PurgeScope::of_layers(["0", "work", "defpoints", "empty"]);
        assert_eq!(host.purge(&scope).await.unwrap(), 1);
        assert_eq!(host.layer_names(), vec!["0", "work", "Defpoints"]);
    }

    #[tokio::test]
    async fn test_purge_leaves_unscoped_empty_layers() {
        let host = InMemoryHost::new(DrawingSnapshot {
            layers: vec![LayerInfo::new("Expo_Markings"), LayerInfo::new("Deleted_x"), LayerInfo::new("notes")],
            entities: vec![EntitySpec::new(EntityKind::Line, "scrap").in_block("SCRAP")],
            ..Default::default()
        });
        assert_eq!(host.purge(&PurgeScope::of_layers(["DELETED_X"])).await.unwrap(), 1);
        assert_eq!(host.entity_count(), 0);
        assert_eq!(host.layer_names(), vec!["0", "Expo_Markings", "notes", "scrap"]);
        assert_eq!(host.purge(&PurgeScope::default()).await.unwrap(), 0);
        assert!(host.layer("scrap").is_some());
    }

    #[tokio::test]
    async fn test_cannot_freeze_current_layer() {
        let host = drawing();
        assert!(host.set_layer_freeze("0", true).await.is_err());
        host.set_layer_freeze("frozen_stuff", true).await.unwrap();
        assert!(host.layer("frozen_stuff").unwrap().frozen);
    }

    #[tokio::test]
    async fn test_disconnected() {
        let err = InMemoryHost::disconnected().connect().await.unwrap_err();
        assert!(matches!(err, ProofError::ConnectionFailure(_)));
    }

    #[tokio::test]
    async fn test_execute_raw_records_and_fails() {
        let host = drawing().with_failing_raw("BOOM");
        host.execute_raw("(command \"ZOOM\" \"E\")").await.unwrap();
        assert!(host.execute_raw("BOOM").await.is_err());
        assert_eq!(host.raw_commands().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_round_trips_through_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("drawing.json");
        let host = drawing();
        host.save(&path).unwrap();

        let reloaded = InMemoryHost::from_path(&path).unwrap();
        assert_eq!(reloaded.entity_count(), 3);
        assert_eq!(reloaded.layer_names(), host.layer_names());
    }
}
