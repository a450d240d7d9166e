//! Capability provider seam

use async_trait::async_trait;

use crate::error::Result;
use crate::host::DrawingHost;
use crate::plan::NetCommand;

/// A set of reserved-namespace commands the dispatcher can route to
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Lowest host major version this provider works against
    fn target_version(&self) -> u32;

    /// Usage text shown to the planner
    fn prompt_example(&self) -> &str;

    fn can_execute(&self, command: &NetCommand) -> bool;

    /// Run one command; the returned text becomes the step's log line
    async fn execute(&self, host: &dyn DrawingHost, command: &NetCommand) -> Result<String>;
}
