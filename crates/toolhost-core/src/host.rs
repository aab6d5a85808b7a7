use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use toolhost_plugin_sdk::API_VERSION;

use crate::{
    config::Config,
    factory::PluginFactories,
    manager::{HostInfo, LoadReport, PluginManager},
    registry::ToolRegistry,
    server::Server,
    version::SemanticVersion,
};

/// The assembled host: loaded plugins, the frozen tool registry, and the server settings.
pub struct Host {
    config: Config,
    manager: PluginManager,
    registry: Arc<ToolRegistry>,
    report: LoadReport,
}

impl Host {
    /// Loads every plugin it can. Plugin failures are logged in the report, never returned.
    pub fn bootstrap(config: Config, factories: PluginFactories) -> Result<Self> {
        config.validate()?;
        let info = HostInfo {
            host_version: SemanticVersion::parse(crate::version())
                .context("host crate version is not major.minor.patch")?,
            api_version: SemanticVersion::parse(API_VERSION)
                .context("plugin API version is not major.minor.patch")?,
            host_config: config.host.config.clone(),
        };
        tracing::info!(
            host_version = %info.host_version,
            api_version = %info.api_version,
            search_paths = ?config.plugins.search_paths,
            "bootstrapping plugin host"
        );
        let mut manager = PluginManager::new(info, config.capabilities.clone(), factories);
        let mut registry = ToolRegistry::new();
        let report = manager.load_all(&config.plugins.search_paths, &mut registry);
        Ok(Self {
            config,
            manager,
            registry: Arc::new(registry),
            report,
        })
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    /// Serves until Ctrl+C, then stops accepting and shuts every plugin down.
    pub async fn run(mut self) -> Result<()> {
        let bound = match Server::new(&self.config.server, self.registry.clone()) {
            Ok(server) => server.bind().await,
            Err(err) => Err(err),
        };
        let bound = match bound {
            Ok(bound) => bound,
            Err(err) => {
                self.shutdown();
                return Err(err);
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let serving = tokio::spawn(bound.serve(shutdown_rx));
        tracing::info!("tool host started; awaiting shutdown signal (Ctrl+C)");
        let signal = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received; draining");
        shutdown_tx.send(true).ok();
        match serving.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(error = %err, "server stopped with error"),
            Err(err) => tracing::error!(error = %err, "server task aborted"),
        }
        self.shutdown();
        signal.context("failed to install ctrl-c handler")
    }

    /// Shuts down all plugins; returns how many failed to stop cleanly.
    pub fn shutdown(&mut self) -> usize {
        let failures = self.manager.shutdown_all();
        tracing::info!(failures, "plugins shut down");
        failures
    }
}
