pub mod builtin;
pub mod capability;
pub mod config;
pub mod error;
pub mod factory;
pub mod host;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod router;
pub mod server;
pub mod version;

pub use capability::{CapabilityPolicy, CapabilityViolation};
pub use error::{LoadError, ParseError, RegistryError};
pub use factory::PluginFactories;
pub use host::Host;
pub use manager::{HostInfo, LoadReport, PluginManager, PluginState};
pub use registry::ToolRegistry;
pub use version::{SemanticVersion, VersionConstraint};

/// Returns the crate version baked in at compile time.
pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
