//! Drawing host adapter
//!
//! Every interaction with the live drawing goes through the [`DrawingHost`]
//! trait. `InMemoryHost` is a complete in-process drawing used for offline
//! runs and tests.

pub mod memory;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::{DrawingSnapshot, EntitySpec, InMemoryHost};
pub use types::{BoundingBox, EntityHandle, EntityKind, EntityQuery, KindFilter, LayerInfo, PurgeScope};

/// Query/mutate/execute interface over one open drawing
///
/// Mutations are expected to be issued by a single caller at a time.
#[async_trait]
pub trait DrawingHost: Send + Sync {
    /// Attach to the drawing; fails with `ConnectionFailure` when unreachable
    async fn connect(&self) -> Result<()>;

    /// Major version of the host application
    async fn host_version(&self) -> Result<u32>;

    async fn list_layers(&self) -> Result<Vec<LayerInfo>>;

    /// Matching entities, in drawing order
    async fn query_entities(&self, query: &EntityQuery) -> Result<Vec<EntityHandle>>;

    async fn entity_kind(&self, entity: EntityHandle) -> Result<EntityKind>;
    async fn is_closed(&self, entity: EntityHandle) -> Result<bool>;
    async fn bounding_box(&self, entity: EntityHandle) -> Result<BoundingBox>;

    /// Enclosed area; only defined for closed shapes
    async fn area(&self, entity: EntityHandle) -> Result<f64>;

    async fn set_layer(&self, entity: EntityHandle, layer: &str) -> Result<()>;
    async fn highlight(&self, entity: EntityHandle, on: bool) -> Result<()>;

    /// Create a layer; no-op when it already exists
    async fn create_layer(&self, name: &str) -> Result<()>;
    async fn set_layer_lock(&self, name: &str, locked: bool) -> Result<()>;
    async fn set_layer_freeze(&self, name: &str, frozen: bool) -> Result<()>;
    async fn set_layer_visibility(&self, name: &str, on: bool) -> Result<()>;
    async fn rename_layer(&self, old_name: &str, new_name: &str) -> Result<()>;
    async fn set_current_layer(&self, name: &str) -> Result<()>;

    /// One native explode pass; entities on locked or frozen layers are left alone
    async fn explode_selection(&self, entities: &[EntityHandle]) -> Result<()>;

    /// Returns how many entities were actually erased
    async fn erase_selection(&self, entities: &[EntityHandle]) -> Result<usize>;

    /// Reduce curves to polylines; returns how many were flattened
    async fn flatten_selection(&self, entities: &[EntityHandle]) -> Result<usize>;

    /// Returns how many layers were removed
    async fn purge(&self, scope: &PurgeScope) -> Result<usize>;

    /// Send a command string verbatim to the host's command line
    async fn execute_raw(&self, command: &str) -> Result<()>;

    /// Case-insensitive layer lookup
    async fn find_layer(&self, name: &str) -> Result<Option<LayerInfo>> {
        let layers = self.list_layers().await?;
        Ok(layers.into_iter().find(|l| l.name.eq_ignore_ascii_case(name)))
    }

    async fn count_entities(&self, query: &EntityQuery) -> Result<usize> {
        Ok(self.query_entities(query).await?.len())
    }
}
