use std::{collections::BTreeMap, fmt, sync::Arc};

use toolhost_plugin_sdk::Plugin;

pub type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Compiled-in table from implementation id to constructor. Only listed ids can be instantiated.
#[derive(Clone, Default)]
pub struct PluginFactories {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor. A later registration for the same id replaces the earlier one;
    /// the table is assembled by the host binary, never from plugin input.
    pub fn register<F, P>(&mut self, implementation: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: Plugin,
    {
        let factory: PluginFactory = Arc::new(move || Box::new(factory()) as Box<dyn Plugin>);
        self.factories.insert(implementation.into(), factory);
        self
    }

    pub fn get(&self, implementation: &str) -> Option<PluginFactory> {
        self.factories.get(implementation).cloned()
    }

    pub fn contains(&self, implementation: &str) -> bool {
        self.factories.contains_key(implementation)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for PluginFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
