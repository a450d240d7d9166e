//! Plan documents and the reserved command grammar

pub mod command;
pub mod schema;

pub use command::{NAMESPACE, NetCommand, Verb};
pub use schema::{Plan, ToolCall, parse_plan};
