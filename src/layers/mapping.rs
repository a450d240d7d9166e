//! Persistent source -> target layer mapping
//!
//! Stored as one JSON object (`{"vendor_layer": "Expo_Layer", ..}`), read at
//! the start of each operation that needs it and rewritten whole on learn.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::info;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ProofError, Result};

/// Source layer name to target layer name; keys compare case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LayerMapping {
    entries: BTreeMap<String, String>,
}

impl LayerMapping {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(&self, source: &str) -> Option<&String> {
        self.entries.keys().find(|k| k.eq_ignore_ascii_case(source))
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.key_for(source)
            .and_then(|k| self.entries.get(k))
            .map(String::as_str)
    }

    /// Insert or replace; returns the previous target
    pub fn upsert(&mut self, source: impl Into<String>, target: impl Into<String>) -> Option<String> {
        let source = source.into();
        let previous = self
            .key_for(&source)
            .cloned()
            .and_then(|k| self.entries.remove(&k));
        self.entries.insert(source, target.into());
        previous
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, t)| (s.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Some mapping sends a layer onto `name`
    pub fn is_target(&self, name: &str) -> bool {
        self.entries.values().any(|t| t.eq_ignore_ascii_case(name))
    }

    /// Sources whose target is one of `targets`
    pub fn sources_targeting<'a>(&'a self, targets: &'a [String]) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(|(_, t)| targets.iter().any(|p| p.eq_ignore_ascii_case(t)))
            .map(|(s, _)| s.as_str())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<S: Into<String>, T: Into<String>> FromIterator<(S, T)> for LayerMapping {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        let mut mapping = LayerMapping::new();
        for (source, target) in iter {
            mapping.upsert(source, target);
        }
        mapping
    }
}

// Keys differing only in case collapse into one entry, as with `upsert`
impl<'de> Deserialize<'de> for LayerMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

/// File-backed mapping with an in-memory copy
pub struct MappingStore {
    path: Option<PathBuf>,
    cache: RwLock<LayerMapping>,
}

impl MappingStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            cache: RwLock::new(LayerMapping::new()),
        }
    }

    /// Never touches the filesystem
    pub fn in_memory(mapping: LayerMapping) -> Self {
        Self {
            path: None,
            cache: RwLock::new(mapping),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current mapping; re-read from disk when file-backed. A missing file is an empty mapping.
    pub fn load(&self) -> Result<LayerMapping> {
        if let Some(path) = &self.path {
            let mapping = if path.exists() {
                let content = fs::read_to_string(path)?;
                if content.trim().is_empty() {
                    LayerMapping::new()
                } else {
                    serde_json::from_str(&content)
                        .map_err(|e| ProofError::Mapping(format!("{}: {}", path.display(), e)))?
                }
            } else {
                LayerMapping::new()
            };
            *self.cache.write().map_err(|e| ProofError::Mapping(e.to_string()))? = mapping;
        }
        let cache = self.cache.read().map_err(|e| ProofError::Mapping(e.to_string()))?;
        Ok(cache.clone())
    }

    /// Upsert one entry and persist the whole mapping
    pub fn learn(&self, source: &str, target: &str) -> Result<LayerMapping> {
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            return Err(ProofError::Mapping("source and target layer names are required".to_string()));
        }

        let mut mapping = self.load()?;
        let previous = mapping.upsert(source, target);
        self.rewrite_file(&mapping)?;
        *self.cache.write().map_err(|e| ProofError::Mapping(e.to_string()))? = mapping.clone();

        match previous {
            Some(old) if old != target => info!("Remapped layer {} from {} to {}", source, old, target),
            Some(_) => {}
            None => info!("Learned layer mapping {} -> {}", source, target),
        }
        Ok(mapping)
    }

    fn rewrite_file(&self, mapping: &LayerMapping) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, mapping.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upsert_case_insensitive() {
        let mut mapping = LayerMapping::new();
        assert_eq!(mapping.upsert("Outlines", "Expo_BoothOutline"), None);
        assert_eq!(mapping.upsert("OUTLINES", "Expo_Building"), Some("Expo_BoothOutline".to_string()));
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("outlines"), Some("Expo_Building"));
    }

    #[test]
    fn test_is_target_and_sources_targeting() {
        let mapping: LayerMapping = [("outlines", "Expo_BoothOutline"), ("walls", "Expo_Building")]
            .into_iter()
            .collect();
        assert!(mapping.is_target("expo_boothoutline"));
        assert!(!mapping.is_target("outlines"));

        let protected = vec!["Expo_BoothOutline".to_string()];
        let sources: Vec<&str> = mapping.sources_targeting(&protected).collect();
        assert_eq!(sources, vec!["outlines"]);
    }

    #[test]
    fn test_json_shape() {
        let mapping: LayerMapping = [("boothNo", "Expo_BoothNumber")].into_iter().collect();
        assert_eq!(
            serde_json::to_string(&mapping).unwrap(),
            r#"{"boothNo":"Expo_BoothNumber"}"#
        );
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = MappingStore::new(dir.path().join("layer_mappings.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_learn_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("layer_mappings.json");
        let store = MappingStore::new(&path);

        store.learn("outlines", "Expo_BoothOutline").unwrap();
        store.learn("boothNo", "Expo_BoothNumber").unwrap();

        let reopened = MappingStore::new(&path);
        let mapping = reopened.load().unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("BOOTHNO"), Some("Expo_BoothNumber"));
    }

    #[test]
    fn test_load_sees_external_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layer_mappings.json");
        let store = MappingStore::new(&path);
        store.learn("a", "b").unwrap();

        fs::write(&path, r#"{"a":"c"}"#).unwrap();
        assert_eq!(store.load().unwrap().get("a"), Some("c"));
    }

    #[test]
    fn test_load_collapses_case_variants() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layer_mappings.json");
        fs::write(&path, r#"{"Outlines":"Expo_BoothOutline","OUTLINES":"Expo_Building","walls":"Expo_Building"}"#).unwrap();

        let store = MappingStore::new(&path);
        let mapping = store.load().unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("outlines"), mapping.get("OUTLINES"));

        store.learn("outlines", "Expo_Column").unwrap();
        let mapping = store.load().unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("Outlines"), Some("Expo_Column"));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("layer_mappings.json");
        fs::write(&path, "[1,2,3]").unwrap();
        let err = MappingStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ProofError::Mapping(_)));
    }

    #[test]
    fn test_learn_rejects_blank_names() {
        let store = MappingStore::in_memory(LayerMapping::new());
        assert!(store.learn(" ", "Expo_Building").is_err());
        assert!(store.learn("walls", "").is_err());
    }

    #[test]
    fn test_in_memory_learn() {
        let store = MappingStore::in_memory(LayerMapping::new());
        store.learn("walls", "Expo_Building").unwrap();
        assert_eq!(store.load().unwrap().get("walls"), Some("Expo_Building"));
        assert!(store.path().is_none());
    }
}
