//! Layer mapping, lifecycle and selection

pub mod lifecycle;
pub mod mapping;
pub mod selection;

pub use lifecycle::{ApplyOutcome, DeleteOutcome, LayerLifecycle, LayerPolicy};
pub use mapping::{LayerMapping, MappingStore};
pub use selection::{get_layers, select_inner, select_layer, select_outer};
