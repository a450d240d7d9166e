//! Layer lifecycle: map, retire, delete and lock layers against a fixed schema
//!
//! Every operation is idempotent and never renames or deletes a layer on the
//! allow-list, whatever the mapping says.

use std::fmt;
use std::path::PathBuf;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::mapping::{LayerMapping, MappingStore};
use crate::error::{ProofError, Result};
use crate::host::{DrawingHost, EntityQuery, PurgeScope};

/// Target schema and naming rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerPolicy {
    /// Layers that are never renamed or deleted
    pub allow_list: Vec<String>,
    /// Marker prepended to layers that fall outside the schema
    pub retired_prefix: String,
    /// Output layers locked at the end of a proof
    pub protected_targets: Vec<String>,
    pub mapping_path: PathBuf,
}

impl Default for LayerPolicy {
    fn default() -> Self {
        Self {
            allow_list: [
                "0",
                "Defpoints",
                "Expo_BoothNumber",
                "Expo_BoothOutline",
                "Expo_MaxBoothNumber",
                "Expo_MaxBoothOutline",
                "Expo_Building",
                "Expo_Column",
                "Expo_Markings",
                "Expo_NES",
                "Expo_View2",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            retired_prefix: "Deleted_".to_string(),
            protected_targets: vec!["Expo_BoothOutline".to_string(), "Expo_BoothNumber".to_string()],
            mapping_path: PathBuf::from("layer_mappings.json"),
        }
    }
}

impl LayerPolicy {
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allow_list.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub fn is_retired(&self, name: &str) -> bool {
        starts_with_ignore_case(name, &self.retired_prefix)
    }

    pub fn retired_name(&self, name: &str) -> String {
        format!("{}{}", self.retired_prefix, name)
    }
}

pub(crate) fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    name.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Mappings whose source layer was present
    pub applied: usize,
    pub moved: usize,
    /// Entities the host refused to relabel
    pub skipped: usize,
    pub missing_sources: Vec<String>,
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Applied {} layer mapping(s), moved {} entities",
            self.applied, self.moved
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if !self.missing_sources.is_empty() {
            write!(f, "; not in drawing: {}", self.missing_sources.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub matched_layers: Vec<String>,
    pub erased: usize,
    pub purged: usize,
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deleted {} layer(s), erased {} entities, purged {}",
            self.matched_layers.len(),
            self.erased,
            self.purged
        )
    }
}

/// Owns the mapping store and applies the policy to a drawing
pub struct LayerLifecycle {
    policy: LayerPolicy,
    store: MappingStore,
}

impl LayerLifecycle {
    pub fn new(policy: LayerPolicy, store: MappingStore) -> Self {
        Self { policy, store }
    }

    /// Store backed by `policy.mapping_path`
    pub fn from_policy(policy: LayerPolicy) -> Self {
        let store = MappingStore::new(&policy.mapping_path);
        Self { policy, store }
    }

    pub fn policy(&self) -> &LayerPolicy {
        &self.policy
    }

    pub fn mapping(&self) -> Result<LayerMapping> {
        self.store.load()
    }

    /// Protected targets plus every source mapped onto one of them
    pub fn shielded_layers(&self) -> Result<Vec<String>> {
        let mapping = self.store.load()?;
        let mut shielded = self.policy.protected_targets.clone();
        shielded.extend(
            mapping
                .sources_targeting(&self.policy.protected_targets)
                .map(str::to_string),
        );
        Ok(shielded)
    }

    /// Move every entity on each mapped source layer onto its target
    pub async fn apply_mappings(&self, host: &dyn DrawingHost) -> Result<ApplyOutcome> {
        let mapping = self.store.load()?;
        let mut outcome = ApplyOutcome::default();

        for (source, target) in mapping.iter() {
            let Some(source_layer) = host.find_layer(source).await? else {
                outcome.missing_sources.push(source.to_string());
                continue;
            };
            host.create_layer(target).await?;
            host.set_layer_lock(&source_layer.name, false).await?;
            host.set_layer_lock(target, false).await?;

            let entities = host.query_entities(&EntityQuery::on_layer(&source_layer.name)).await?;
            for entity in entities {
                match host.set_layer(entity, target).await {
                    Ok(()) => outcome.moved += 1,
                    Err(e) => {
                        debug!("could not move {} to {}: {}", entity, target, e);
                        outcome.skipped += 1;
                    }
                }
            }
            outcome.applied += 1;
        }

        info!("{}", outcome);
        Ok(outcome)
    }

    /// Prefix every layer outside the schema with the retired marker; returns how many were renamed
    pub async fn rename_orphans(&self, host: &dyn DrawingHost) -> Result<usize> {
        let mapping = self.store.load()?;
        let mut renamed = 0;

        for layer in host.list_layers().await? {
            let name = &layer.name;
            if self.policy.is_allowed(name) || mapping.is_target(name) || self.policy.is_retired(name) {
                continue;
            }
            let new_name = self.policy.retired_name(name);
            if host.find_layer(&new_name).await?.is_some() {
                warn!("Cannot retire layer {}: {} already exists", name, new_name);
                continue;
            }
            if let Err(e) = host.rename_layer(name, &new_name).await {
                warn!("Cannot retire layer {}: {}", name, e);
                continue;
            }
            renamed += 1;
        }

        info!("Renamed {} layer(s) with prefix {}", renamed, self.policy.retired_prefix);
        Ok(renamed)
    }

    /// Erase and purge every layer starting with `prefix` (case-insensitive), sparing the allow-list
    pub async fn delete_by_prefix(&self, host: &dyn DrawingHost, prefix: &str) -> Result<DeleteOutcome> {
        if prefix.trim().is_empty() {
            return Err(ProofError::InvalidCommand(
                "DELETE_LAYERS_BY_PREFIX requires a non-empty prefix".to_string(),
            ));
        }

        host.set_current_layer("0").await?;

        let matched: Vec<String> = host
            .list_layers()
            .await?
            .into_iter()
            .filter(|l| starts_with_ignore_case(&l.name, prefix))
            .filter(|l| !self.policy.is_allowed(&l.name))
            .map(|l| l.name)
            .collect();

        let mut outcome = DeleteOutcome {
            matched_layers: matched.clone(),
            ..Default::default()
        };
        if matched.is_empty() {
            return Ok(outcome);
        }

        for name in &matched {
            host.set_layer_lock(name, false).await?;
            host.set_layer_freeze(name, false).await?;
            host.set_layer_visibility(name, true).await?;
        }

        for name in &matched {
            let entities = host
                .query_entities(&EntityQuery::on_layer(name).with_block_members())
                .await?;
            if !entities.is_empty() {
                outcome.erased += host.erase_selection(&entities).await?;
            }
        }

        // block purges only empty a layer on the following pass
        let scope = PurgeScope::of_layers(matched);
        outcome.purged += host.purge(&scope).await?;
        outcome.purged += host.purge(&scope).await?;

        info!("{}", outcome);
        Ok(outcome)
    }

    /// Lock the protected output layers that exist; returns how many were locked
    pub async fn lock_targets(&self, host: &dyn DrawingHost) -> Result<usize> {
        let mut locked = 0;
        for target in &self.policy.protected_targets {
            match host.find_layer(target).await? {
                Some(layer) => {
                    host.set_layer_lock(&layer.name, true).await?;
                    locked += 1;
                }
                None => debug!("Protected layer {} not present, nothing to lock", target),
            }
        }
        Ok(locked)
    }

    pub fn learn_mapping(&self, source: &str, target: &str) -> Result<LayerMapping> {
        self.store.learn(source, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{DrawingSnapshot, EntityKind, EntitySpec, InMemoryHost, LayerInfo};

    fn lifecycle(mapping: LayerMapping) -> LayerLifecycle {
        LayerLifecycle::new(LayerPolicy::default(), MappingStore::in_memory(mapping))
    }

    fn host_with(layers: &[&str]) -> InMemoryHost {
        InMemoryHost::new(DrawingSnapshot {
            layers: layers.iter().map(|n| LayerInfo::new(*n)).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn test_starts_with_ignore_case() {
        assert!(starts_with_ignore_case("DELETED_walls", "Deleted_"));
        assert!(!starts_with_ignore_case("Del", "Deleted_"));
        assert!(!starts_with_ignore_case("ü", "uu"));
    }

    #[tokio::test]
    async fn test_apply_mappings_creates_target_and_moves() {
        let host = InMemoryHost::new(DrawingSnapshot {
            layers: vec![LayerInfo::new("outlines").locked()],
            entities: vec![
                EntitySpec::closed_polyline("outlines", 100.0),
                EntitySpec::closed_polyline("outlines", 120.0),
            ],
            ..Default::default()
        });
        let lc = lifecycle([("outlines", "Expo_BoothOutline"), ("ghost", "Expo_NES")].into_iter().collect());

        let outcome = lc.apply_mappings(&host).await.unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.moved, 2);
        assert_eq!(outcome.missing_sources, vec!["ghost".to_string()]);
        assert_eq!(host.entities_on("outlines"), 0);
        assert_eq!(host.entities_on("Expo_BoothOutline"), 2);
        assert!(host.layer("Expo_NES").is_none());
    }

    #[tokio::test]
    async fn test_apply_mappings_idempotent() {
        let host = InMemoryHost::new(DrawingSnapshot {
            entities: vec![EntitySpec::new(EntityKind::Text, "nums")],
            ..Default::default()
        });
        let lc = lifecycle([("nums", "Expo_BoothNumber")].into_iter().collect());
        lc.apply_mappings(&host).await.unwrap();
        let again = lc.apply_mappings(&host).await.unwrap();
        assert_eq!(again.moved, 0);
        assert_eq!(host.entities_on("Expo_BoothNumber"), 1);
    }

    #[tokio::test]
    async fn test_rename_orphans_respects_allow_list_casing() {
        let host = host_with(&["EXPO_BUILDING", "defpoints", "walls", "Deleted_old", "DELETED_older"]);
        let lc = lifecycle(LayerMapping::new());

        let renamed = lc.rename_orphans(&host).await.unwrap();
        assert_eq!(renamed, 1);
        let names = host.layer_names();
        assert!(names.contains(&"EXPO_BUILDING".to_string()));
        assert!(names.contains(&"defpoints".to_string()));
        assert!(names.contains(&"Deleted_walls".to_string()));
        assert!(names.contains(&"Deleted_old".to_string()));
        assert!(names.contains(&"DELETED_older".to_string()));
    }

    #[tokio::test]
    async fn test_rename_orphans_spares_mapping_targets() {
        let host = host_with(&["Vendor_Target", "stray"]);
        let lc = lifecycle([("stray_src", "Vendor_Target")].into_iter().collect());
        assert_eq!(lc.rename_orphans(&host).await.unwrap(), 1);
        assert!(host.layer("Vendor_Target").is_some());
        assert!(host.layer("Deleted_stray").is_some());
    }

    #[tokio::test]
    async fn test_rename_orphans_idempotent() {
        let host = host_with(&["a", "b"]);
        let lc = lifecycle(LayerMapping::new());
        assert_eq!(lc.rename_orphans(&host).await.unwrap(), 2);
        assert_eq!(lc.rename_orphans(&host).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rename_orphans_skips_collisions() {
        let host = host_with(&["walls", "Deleted_walls"]);
        let lc = lifecycle(LayerMapping::new());
        assert_eq!(lc.rename_orphans(&host).await.unwrap(), 0);
        assert!(host.layer("walls").is_some());
    }

    #[tokio::test]
    async fn test_rename_orphans_continues_past_host_refusal() {
        let host = host_with(&["site|walls", "stray", "vendor"]);
        let lc = lifecycle(LayerMapping::new());
        assert_eq!(lc.rename_orphans(&host).await.unwrap(), 2);
        assert!(host.layer("site|walls").is_some());
        assert!(host.layer("Deleted_stray").is_some());
        assert!(host.layer("Deleted_vendor").is_some());
    }

    #[tokio::test]
    async fn test_delete_by_prefix() {
        let host = InMemoryHost::new(DrawingSnapshot {
            current_layer: "Deleted_work".to_string(),
            layers: vec![
                LayerInfo {
                    name: "Deleted_frozen".to_string(),
                    locked: true,
                    frozen: true,
                    on: false,
                },
                LayerInfo::new("Deleted_work"),
                LayerInfo::new("Expo_Building"),
            ],
            entities: vec![
                EntitySpec::new(EntityKind::Line, "Deleted_frozen"),
                EntitySpec::new(EntityKind::Line, "Deleted_work"),
                EntitySpec::new(EntityKind::Line, "Deleted_work").in_block("LOGO"),
                EntitySpec::new(EntityKind::Insert, "Expo_Building").referencing("LOGO"),
                EntitySpec::new(EntityKind::Line, "Expo_Building"),
            ],
            ..Default::default()
        });
        let lc = lifecycle(LayerMapping::new());

        let outcome = lc.delete_by_prefix(&host, "deleted_").await.unwrap();
        assert_eq!(outcome.matched_layers.len(), 2);
        assert_eq!(outcome.erased, 3);
        assert!(host.layer("Deleted_frozen").is_none());
        assert!(host.layer("Deleted_work").is_none());
        assert_eq!(host.current_layer(), "0");
        assert_eq!(host.entities_on("Expo_Building"), 2);
    }

    #[tokio::test]
    async fn test_delete_by_prefix_spares_allow_list() {
        let host = host_with(&["Expo_Column", "Expo_stuff"]);
        let lc = lifecycle(LayerMapping::new());
        let outcome = lc.delete_by_prefix(&host, "Expo_").await.unwrap();
        assert_eq!(outcome.matched_layers, vec!["Expo_stuff".to_string()]);
        assert!(host.layer("Expo_Column").is_some());
        assert!(host.layer("0").is_some());
    }

    #[tokio::test]
    async fn test_delete_by_prefix_keeps_empty_schema_layers() {
        let host = InMemoryHost::new(DrawingSnapshot {
            layers: vec![
                LayerInfo::new("Expo_Markings"),
                LayerInfo::new("Expo_Column"),
                LayerInfo::new("Deleted_x"),
                LayerInfo::new("notes"),
            ],
            entities: vec![EntitySpec::new(EntityKind::Line, "Deleted_x")],
            ..Default::default()
        });
        let lc = lifecycle(LayerMapping::new());

        let outcome = lc.delete_by_prefix(&host, "Deleted_").await.unwrap();
        assert_eq!(outcome.purged, 1);
        assert!(host.layer("Deleted_x").is_none());
        assert!(host.layer("Expo_Markings").is_some());
        assert!(host.layer("Expo_Column").is_some());
        assert!(host.layer("notes").is_some());
    }

    #[tokio::test]
    async fn test_delete_by_prefix_rejects_empty() {
        let host = host_with(&["a"]);
        let err = lifecycle(LayerMapping::new())
            .delete_by_prefix(&host, "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, ProofError::InvalidCommand(_)));
        assert!(host.layer("a").is_some());
    }

    #[tokio::test]
    async fn test_lock_targets_tolerates_missing() {
        let host = host_with(&["Expo_BoothOutline"]);
        let lc = lifecycle(LayerMapping::new());
        assert_eq!(lc.lock_targets(&host).await.unwrap(), 1);
        assert_eq!(lc.lock_targets(&host).await.unwrap(), 1);
        assert!(host.layer("Expo_BoothOutline").unwrap().locked);
    }

    #[tokio::test]
    async fn test_learn_then_apply() {
        let host = InMemoryHost::new(DrawingSnapshot {
            entities: vec![
                EntitySpec::new(EntityKind::Line, "A"),
                EntitySpec::new(EntityKind::Arc, "A"),
            ],
            ..Default::default()
        });
        let lc = lifecycle(LayerMapping::new());
        lc.learn_mapping("A", "B").unwrap();
        lc.apply_mappings(&host).await.unwrap();
        assert_eq!(host.entities_on("A"), 0);
        assert_eq!(host.entities_on("B"), 2);
    }

    #[test]
    fn test_shielded_layers_include_mapped_sources() {
        let lc = lifecycle([("outlines", "Expo_BoothOutline"), ("walls", "Expo_Building")].into_iter().collect());
        let shielded = lc.shielded_layers().unwrap();
        assert_eq!(shielded, vec!["Expo_BoothOutline", "Expo_BoothNumber", "outlines"]);
    }
}
