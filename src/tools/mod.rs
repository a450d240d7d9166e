//! Tool System - capability providers and plan dispatch

mod dispatcher;
mod explode_tools;
mod geometry_tools;
mod layer_tools;
mod provider;

pub use dispatcher::{ExecutionLog, StepRecord, StepStatus, ToolDispatcher};
pub use explode_tools::ExplodeTools;
pub use geometry_tools::GeometryTools;
pub use layer_tools::LayerTools;
pub use provider::ToolProvider;
