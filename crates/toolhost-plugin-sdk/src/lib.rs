pub mod error;
pub mod manifest;
pub mod tool;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use error::ToolError;
pub use manifest::{CapabilitySet, PluginManifest, Requirements};
pub use tool::{
    ArgBinding, ToolArgs, ToolBox, ToolDefinition, ToolFuture, ToolHandler, ToolParam, UserContext,
};

/// API version of the tool-binding surface. Plugins must be built against exactly this value.
pub const API_VERSION: &str = "1.0.0";

/// Values handed to every plugin before it is asked for tools.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub host_version: semver::Version,
    pub api_version: semver::Version,
    pub host_config: BTreeMap<String, String>,
}

impl PluginContext {
    pub fn config(&self, key: &str) -> Option<&str> {
        self.host_config.get(key).map(String::as_str)
    }
}

/// Contract implemented by every unit the host can instantiate through its factory table.
pub trait Plugin: Send + Sync + 'static {
    fn init(&mut self, ctx: &PluginContext) -> anyhow::Result<()>;
    /// Tool containers exposed after a successful `init`. The host keeps the strong
    /// references alive for the plugin's lifetime; the tool registry only borrows them.
    fn tools(&self) -> Vec<Arc<ToolBox>>;
    fn shutdown(&mut self) -> anyhow::Result<()>;
}
