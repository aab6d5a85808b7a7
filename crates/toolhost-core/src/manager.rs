//! Plugin discovery and lifecycle.
//!
//! Each archive walks `Discovered → ManifestLoaded → HostVersionChecked →
//! ApiVersionChecked → CapabilityChecked → Instantiated → Initialized → Active`.
//! A failure at any step parks that plugin in a terminal rejection state and the
//! scan moves on; nothing here escalates to a host-level error.

use std::{
    any::Any,
    collections::{BTreeMap, HashSet},
    fmt,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;
use toolhost_plugin_sdk::{Plugin, PluginContext, PluginManifest, ToolBox};

use crate::{
    capability::{self, CapabilityPolicy},
    error::LoadError,
    factory::PluginFactories,
    loader,
    registry::ToolRegistry,
    version::{SemanticVersion, VersionConstraint},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginState {
    Discovered,
    ManifestLoaded,
    HostVersionChecked,
    ApiVersionChecked,
    CapabilityChecked,
    Instantiated,
    Initialized,
    Active,
    RejectedManifest,
    RejectedVersion,
    RejectedCapability,
    RejectedFactory,
    InitFailed,
    /// Tool registration collided with an existing tool name.
    RejectedTools,
}

impl PluginState {
    pub fn is_rejected(self) -> bool {
        matches!(
            self,
            PluginState::RejectedManifest
                | PluginState::RejectedVersion
                | PluginState::RejectedCapability
                | PluginState::RejectedFactory
                | PluginState::InitFailed
                | PluginState::RejectedTools
        )
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identity the host presents to plugins.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub host_version: SemanticVersion,
    pub api_version: SemanticVersion,
    pub host_config: BTreeMap<String, String>,
}

impl HostInfo {
    pub fn context(&self) -> PluginContext {
        PluginContext {
            host_version: self.host_version.into(),
            api_version: self.api_version.into(),
            host_config: self.host_config.clone(),
        }
    }
}

/// One live plugin instance paired with its manifest. Owns the strong tool container handles.
pub struct LoadedPlugin {
    manifest: PluginManifest,
    source: PathBuf,
    instance: Box<dyn Plugin>,
    containers: Vec<Arc<ToolBox>>,
}

impl LoadedPlugin {
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn tool_count(&self) -> usize {
        self.containers.iter().map(|tools| tools.len()).sum()
    }
}

impl fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("id", &self.manifest.id)
            .field("source", &self.source)
            .field("tools", &self.tool_count())
            .finish()
    }
}

/// Result of trying one archive during a scan.
#[derive(Debug, Clone, Serialize)]
pub struct PluginOutcome {
    pub source: PathBuf,
    pub plugin_id: Option<String>,
    pub state: PluginState,
    pub reason: Option<String>,
    pub tools: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub outcomes: Vec<PluginOutcome>,
}

impl LoadReport {
    pub fn active(&self) -> impl Iterator<Item = &PluginOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state == PluginState::Active)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &PluginOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.state.is_rejected())
    }
}

pub struct PluginManager {
    host: HostInfo,
    policy: CapabilityPolicy,
    factories: PluginFactories,
    plugins: Vec<LoadedPlugin>,
    seen_ids: HashSet<String>,
}

impl PluginManager {
    pub fn new(host: HostInfo, policy: CapabilityPolicy, factories: PluginFactories) -> Self {
        Self {
            host,
            policy,
            factories,
            plugins: Vec::new(),
            seen_ids: HashSet::new(),
        }
    }

    pub fn host(&self) -> &HostInfo {
        &self.host
    }

    /// Scans every search path in order and loads what it can.
    pub fn load_all<P: AsRef<Path>>(
        &mut self,
        search_paths: &[P],
        tools: &mut ToolRegistry,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        for dir in search_paths {
            let dir = dir.as_ref();
            let archives = match loader::discover(dir) {
                Ok(archives) => archives,
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "skipping plugin search path");
                    continue;
                }
            };
            for archive in archives {
                report.outcomes.push(self.load_archive(&archive, tools));
            }
        }
        tracing::info!(
            active = report.active().count(),
            rejected = report.rejected().count(),
            tools = tools.len(),
            "plugin scan complete"
        );
        report
    }

    /// Loads a single archive, never failing the caller.
    pub fn load_archive(&mut self, path: &Path, tools: &mut ToolRegistry) -> PluginOutcome {
        trace_state(path, None, PluginState::Discovered);
        let manifest = match loader::load(path) {
            Ok(manifest) => manifest,
            Err(err) => return rejected(path, None, err),
        };
        let id = manifest.id.clone();
        match self.load_manifest(manifest, path, tools) {
            Ok(plugin) => {
                tracing::info!(
                    plugin = plugin.id(),
                    source = %path.display(),
                    tools = plugin.tool_count(),
                    "plugin active"
                );
                PluginOutcome {
                    source: path.to_path_buf(),
                    plugin_id: Some(id),
                    state: PluginState::Active,
                    reason: None,
                    tools: plugin.tool_count(),
                }
            }
            Err(err) => rejected(path, Some(id), err),
        }
    }

    /// Runs an already-decoded manifest through the compatibility checks, instantiation and
    /// tool registration.
    pub fn load_manifest(
        &mut self,
        manifest: PluginManifest,
        source: impl Into<PathBuf>,
        tools: &mut ToolRegistry,
    ) -> Result<&LoadedPlugin, LoadError> {
        let source = source.into();
        if !self.seen_ids.insert(manifest.id.clone()) {
            return Err(LoadError::DuplicatePlugin { id: manifest.id });
        }
        let id = manifest.id.clone();
        trace_state(&source, Some(id.as_str()), PluginState::ManifestLoaded);

        self.check_versions(&manifest, &source)?;
        capability::enforce(&self.policy, &id, &manifest.capabilities)?;
        trace_state(&source, Some(id.as_str()), PluginState::CapabilityChecked);

        let factory =
            self.factories
                .get(&manifest.implementation)
                .ok_or_else(|| LoadError::RejectedFactory {
                    id: id.clone(),
                    implementation: manifest.implementation.clone(),
                })?;
        let mut instance = guarded(|| Ok(factory())).map_err(|message| LoadError::InitFailed {
            id: id.clone(),
            message,
        })?;
        trace_state(&source, Some(id.as_str()), PluginState::Instantiated);

        let ctx = self.host.context();
        let containers = guarded(|| {
            instance.init(&ctx)?;
            Ok(instance.tools())
        })
        .map_err(|message| LoadError::InitFailed {
            id: id.clone(),
            message,
        })?;
        trace_state(&source, Some(id.as_str()), PluginState::Initialized);

        if let Err(source_err) = tools.register_plugin_tools(&id, &containers) {
            drop(containers);
            shutdown_instance(&id, instance.as_mut());
            return Err(LoadError::DuplicateTool {
                id,
                source: source_err,
            });
        }

        self.plugins.push(LoadedPlugin {
            manifest,
            source,
            instance,
            containers,
        });
        Ok(&self.plugins[self.plugins.len() - 1])
    }

    fn check_versions(&self, manifest: &PluginManifest, source: &Path) -> Result<(), LoadError> {
        let id = &manifest.id;
        let reject = |message: String| LoadError::RejectedVersion {
            id: id.clone(),
            message,
        };

        let host_req = VersionConstraint::parse(manifest.requires.host.as_deref())
            .map_err(|err| reject(format!("requires.host: {err}")))?;
        if !host_req.matches(&self.host.host_version) {
            return Err(reject(format!(
                "host {} does not satisfy requires.host {host_req}",
                self.host.host_version
            )));
        }
        trace_state(source, Some(id.as_str()), PluginState::HostVersionChecked);

        let api_req = VersionConstraint::parse(manifest.requires.api.as_deref())
            .map_err(|err| reject(format!("requires.api: {err}")))?;
        if !api_req.matches(&self.host.api_version) {
            return Err(reject(format!(
                "api {} does not satisfy requires.api {api_req}",
                self.host.api_version
            )));
        }
        let built_against = SemanticVersion::parse(manifest.api_version.trim())
            .map_err(|err| reject(format!("apiVersion: {err}")))?;
        if built_against != self.host.api_version {
            return Err(reject(format!(
                "built against api {built_against}, host provides {}",
                self.host.api_version
            )));
        }
        trace_state(source, Some(id.as_str()), PluginState::ApiVersionChecked);
        Ok(())
    }

    pub fn plugins(&self) -> &[LoadedPlugin] {
        &self.plugins
    }

    pub fn get(&self, id: &str) -> Option<&LoadedPlugin> {
        self.plugins.iter().find(|plugin| plugin.id() == id)
    }

    /// Shuts down every plugin in load order. Failures are logged and do not stop the rest.
    /// Returns the number of plugins whose shutdown failed.
    pub fn shutdown_all(&mut self) -> usize {
        let mut failures = 0;
        for mut plugin in self.plugins.drain(..) {
            if !shutdown_instance(&plugin.manifest.id, plugin.instance.as_mut()) {
                failures += 1;
            }
        }
        failures
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("host", &self.host)
            .field("plugins", &self.plugins)
            .finish()
    }
}

fn rejected(path: &Path, plugin_id: Option<String>, err: LoadError) -> PluginOutcome {
    let state = err.state();
    tracing::warn!(
        plugin = plugin_id.as_deref().unwrap_or("-"),
        source = %path.display(),
        state = %state,
        error = %err,
        "plugin rejected"
    );
    PluginOutcome {
        source: path.to_path_buf(),
        plugin_id,
        state,
        reason: Some(err.to_string()),
        tools: 0,
    }
}

fn shutdown_instance(id: &str, instance: &mut dyn Plugin) -> bool {
    match guarded(|| instance.shutdown()) {
        Ok(()) => {
            tracing::debug!(plugin = id, "plugin shut down");
            true
        }
        Err(message) => {
            tracing::error!(plugin = id, error = %message, "plugin shutdown failed");
            false
        }
    }
}

fn trace_state(source: &Path, id: Option<&str>, state: PluginState) {
    tracing::trace!(
        plugin = id.unwrap_or("-"),
        source = %source.display(),
        state = %state,
        "plugin state"
    );
}

/// Runs plugin code, turning both errors and panics into a message.
fn guarded<T>(f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{json, Value};
    use toolhost_plugin_sdk::{ToolDefinition, ToolError, ToolHandler, ToolParam};

    use super::*;
    use crate::loader::fixtures::{write_dir, write_zip};

    #[derive(Clone, Default)]
    struct Behaviour {
        tools: Vec<&'static str>,
        fail_init: bool,
        panic_init: bool,
        fail_shutdown: bool,
    }

    struct TestPlugin {
        label: &'static str,
        behaviour: Behaviour,
        journal: Arc<Mutex<Vec<String>>>,
        containers: Vec<Arc<ToolBox>>,
    }

    impl Plugin for TestPlugin {
        fn init(&mut self, ctx: &PluginContext) -> anyhow::Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("init:{}:{}", self.label, ctx.api_version));
            if self.behaviour.panic_init {
                panic!("init exploded");
            }
            if self.behaviour.fail_init {
                anyhow::bail!("missing credentials");
            }
            let label = self.label;
            let mut tools = ToolBox::new();
            for name in &self.behaviour.tools {
                tools.add(
                    ToolDefinition::new(*name, "test tool")
                        .param(ToolParam::required("message", "string")),
                    ToolHandler::sync(move |args, _user| {
                        let message: String = args.get("message")?;
                        Ok(json!(format!("{label}:{message}")))
                    }),
                );
            }
            self.containers = vec![Arc::new(tools)];
            Ok(())
        }

        fn tools(&self) -> Vec<Arc<ToolBox>> {
            if self.containers.is_empty() {
                let mut fallback = ToolBox::new();
                fallback.add(
                    ToolDefinition::new("should_not_register", "x"),
                    ToolHandler::sync(|_, _| Ok(Value::Null)),
                );
                return vec![Arc::new(fallback)];
            }
            self.containers.clone()
        }

        fn shutdown(&mut self) -> anyhow::Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("shutdown:{}", self.label));
            if self.behaviour.fail_shutdown {
                anyhow::bail!("socket already closed");
            }
            self.containers.clear();
            Ok(())
        }
    }

    struct Harness {
        manager: PluginManager,
        registry: ToolRegistry,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl Harness {
        fn new(policy: CapabilityPolicy, impls: Vec<(&'static str, Behaviour)>) -> Self {
            let journal = Arc::new(Mutex::new(Vec::new()));
            let mut factories = PluginFactories::new();
            for (label, behaviour) in impls {
                let journal = journal.clone();
                factories.register(format!("test.{label}"), move || TestPlugin {
                    label,
                    behaviour: behaviour.clone(),
                    journal: journal.clone(),
                    containers: Vec::new(),
                });
            }
            let host = HostInfo {
                host_version: SemanticVersion::new(2, 3, 0),
                api_version: SemanticVersion::new(1, 0, 0),
                host_config: BTreeMap::from([("region".to_string(), "eu".to_string())]),
            };
            Self {
                manager: PluginManager::new(host, policy, factories),
                registry: ToolRegistry::new(),
                journal,
            }
        }

        fn load(&mut self, manifest: Value) -> Result<usize, LoadError> {
            let manifest: PluginManifest = serde_json::from_value(manifest).unwrap();
            self.manager
                .load_manifest(manifest, "inline", &mut self.registry)
                .map(LoadedPlugin::tool_count)
        }

        fn tool_names(&self) -> Vec<String> {
            self.registry
                .list_tools()
                .into_iter()
                .map(|def| def.name)
                .collect()
        }

        fn journal(&self) -> Vec<String> {
            self.journal.lock().unwrap().clone()
        }
    }

    fn manifest(id: &str, implementation: &str) -> Value {
        json!({
            "id": id,
            "apiVersion": "1.0.0",
            "implementation": implementation,
        })
    }

    fn echo() -> Behaviour {
        Behaviour {
            tools: vec!["echo", "echo_twice"],
            ..Behaviour::default()
        }
    }

    #[tokio::test]
    async fn compatible_plugin_becomes_active_with_tagged_tools() {
        let mut h = Harness::new(CapabilityPolicy::default(), vec![("echo", echo())]);
        let mut descriptor = manifest("echo", "test.echo");
        descriptor["requires"] = json!({ "host": ">=2.0.0,<3.0.0", "api": "^1.0.0" });
        assert_eq!(h.load(descriptor).unwrap(), 2);
        assert_eq!(h.tool_names(), vec!["echo", "echo_twice"]);
        assert!(h
            .registry
            .list_tools()
            .iter()
            .all(|def| def.owning_plugin_id == "echo"));
        assert_eq!(h.journal(), vec!["init:echo:1.0.0"]);
        assert_eq!(
            h.registry
                .invoke("echo", json!({ "message": "hi" }), None)
                .await
                .unwrap(),
            json!("echo:hi")
        );
        assert!(h.manager.get("echo").is_some());
    }

    #[test]
    fn api_version_must_match_exactly_even_when_range_matches() {
        let mut h = Harness::new(CapabilityPolicy::default(), vec![("echo", echo())]);
        let mut descriptor = manifest("echo", "test.echo");
        descriptor["apiVersion"] = json!("1.1.0");
        descriptor["requires"] = json!({ "api": ">=1.0.0,<2.0.0" });
        let err = h.load(descriptor).unwrap_err();
        assert_eq!(err.state(), PluginState::RejectedVersion);
        assert!(h.registry.is_empty());
        assert!(h.journal().is_empty());
    }

    #[test]
    fn host_and_api_constraints_are_checked() {
        let mut h = Harness::new(CapabilityPolicy::default(), vec![("echo", echo())]);
        let mut too_new = manifest("needs-host-3", "test.echo");
        too_new["requires"] = json!({ "host": ">=3.0.0" });
        assert_eq!(h.load(too_new).unwrap_err().state(), PluginState::RejectedVersion);

        let mut wrong_api = manifest("needs-api-2", "test.echo");
        wrong_api["requires"] = json!({ "api": "^2.0.0" });
        assert_eq!(h.load(wrong_api).unwrap_err().state(), PluginState::RejectedVersion);

        let mut garbled = manifest("garbled", "test.echo");
        garbled["requires"] = json!({ "host": "newest" });
        assert_eq!(h.load(garbled).unwrap_err().state(), PluginState::RejectedVersion);

        let mut blank = manifest("blank", "test.echo");
        blank["requires"] = json!({ "host": "", "api": "  " });
        assert!(h.load(blank).is_ok());
    }

    #[test]
    fn capability_violation_rejects_only_that_plugin() {
        let mut h = Harness::new(
            CapabilityPolicy::allow_list(["network.http"]),
            vec![
                (
                    "shell",
                    Behaviour {
                        tools: vec!["run"],
                        ..Behaviour::default()
                    },
                ),
                ("echo", echo()),
            ],
        );
        let mut shell = manifest("shell", "test.shell");
        shell["capabilities"] = json!(["process.exec"]);
        let err = h.load(shell).unwrap_err();
        assert_eq!(err.state(), PluginState::RejectedCapability);
        assert!(err.to_string().contains("process.exec"));

        let mut web = manifest("web", "test.echo");
        web["capabilities"] = json!(["network.http"]);
        assert!(h.load(web).is_ok());
        assert!(!h.registry.contains("run"));
        assert_eq!(h.tool_names(), vec!["echo", "echo_twice"]);
    }

    #[test]
    fn unknown_implementation_is_rejected_factory() {
        let mut h = Harness::new(CapabilityPolicy::default(), vec![]);
        let err = h.load(manifest("ghost", "com.example.Ghost")).unwrap_err();
        assert!(matches!(
            err,
            LoadError::RejectedFactory { ref implementation, .. } if implementation == "com.example.Ghost"
        ));
    }

    #[test]
    fn init_failure_contributes_no_tools() {
        let mut h = Harness::new(
            CapabilityPolicy::default(),
            vec![
                (
                    "broken",
                    Behaviour {
                        tools: vec!["never"],
                        fail_init: true,
                        ..Behaviour::default()
                    },
                ),
                (
                    "panicky",
                    Behaviour {
                        tools: vec!["never_either"],
                        panic_init: true,
                        ..Behaviour::default()
                    },
                ),
            ],
        );
        let err = h.load(manifest("broken", "test.broken")).unwrap_err();
        assert_eq!(err.state(), PluginState::InitFailed);
        assert!(err.to_string().contains("missing credentials"));

        let err = h.load(manifest("panicky", "test.panicky")).unwrap_err();
        assert_eq!(err.state(), PluginState::InitFailed);
        assert!(err.to_string().contains("init exploded"));

        assert!(h.registry.is_empty());
        assert!(h.manager.plugins().is_empty());
    }

    #[test]
    fn duplicate_plugin_id_is_rejected_not_replaced() {
        let mut h = Harness::new(CapabilityPolicy::default(), vec![("echo", echo())]);
        h.load(manifest("echo", "test.echo")).unwrap();
        let err = h.load(manifest("echo", "test.echo")).unwrap_err();
        assert!(matches!(err, LoadError::DuplicatePlugin { .. }));
        assert_eq!(h.manager.plugins().len(), 1);
    }

    #[test]
    fn tool_collision_rejects_second_plugin_entirely() {
        let mut h = Harness::new(
            CapabilityPolicy::default(),
            vec![
                ("echo", echo()),
                (
                    "copycat",
                    Behaviour {
                        tools: vec!["unique", "echo"],
                        ..Behaviour::default()
                    },
                ),
            ],
        );
        h.load(manifest("echo", "test.echo")).unwrap();
        let err = h.load(manifest("copycat", "test.copycat")).unwrap_err();
        assert_eq!(err.state(), PluginState::RejectedTools);
        assert_eq!(h.tool_names(), vec!["echo", "echo_twice"]);
        assert_eq!(h.registry.definition("echo").unwrap().owning_plugin_id, "echo");
        assert!(h.journal().contains(&"shutdown:copycat".to_string()));
        assert!(h.manager.get("copycat").is_none());
    }

    #[tokio::test]
    async fn shutdown_all_continues_past_failures() {
        let mut h = Harness::new(
            CapabilityPolicy::default(),
            vec![
                (
                    "stubborn",
                    Behaviour {
                        tools: vec!["stubborn_tool"],
                        fail_shutdown: true,
                        ..Behaviour::default()
                    },
                ),
                ("echo", echo()),
            ],
        );
        h.load(manifest("stubborn", "test.stubborn")).unwrap();
        h.load(manifest("echo", "test.echo")).unwrap();
        assert_eq!(h.manager.shutdown_all(), 1);
        let journal = h.journal();
        assert!(journal.contains(&"shutdown:stubborn".to_string()));
        assert!(journal.contains(&"shutdown:echo".to_string()));
        assert!(h.manager.plugins().is_empty());
        assert!(matches!(
            h.registry.invoke("echo", json!({ "message": "hi" }), None).await,
            Err(ToolError::NotFound { .. })
        ));
    }

    #[test]
    fn scan_isolates_failures_per_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write_dir(root, "01-echo", &manifest("echo", "test.echo"));
        std::fs::create_dir(root.join("02-empty")).unwrap();
        write_zip(root, "03-broken.zip", &[(loader::DESCRIPTOR_NAME, "{ nope")]);
        let mut old = manifest("old", "test.echo");
        old["apiVersion"] = json!("0.9.0");
        write_dir(root, "04-old", &old);
        let zipped = manifest("zipped", "test.zipped").to_string();
        write_zip(root, "05-zipped.zip", &[(loader::DESCRIPTOR_NAME, &zipped)]);

        let mut h = Harness::new(
            CapabilityPolicy::default(),
            vec![
                ("echo", echo()),
                (
                    "zipped",
                    Behaviour {
                        tools: vec!["from_zip"],
                        ..Behaviour::default()
                    },
                ),
            ],
        );
        let missing = root.join("no-such-dir");
        let report = h
            .manager
            .load_all(&[missing.as_path(), root], &mut h.registry);
        let states = report
            .outcomes
            .iter()
            .map(|outcome| outcome.state)
            .collect::<Vec<_>>();
        assert_eq!(
            states,
            vec![
                PluginState::Active,
                PluginState::RejectedManifest,
                PluginState::RejectedManifest,
                PluginState::RejectedVersion,
                PluginState::Active,
            ]
        );
        assert_eq!(report.active().count(), 2);
        assert_eq!(report.outcomes[3].plugin_id.as_deref(), Some("old"));
        assert!(report.outcomes[1].reason.is_some());
        assert_eq!(h.tool_names(), vec!["echo", "echo_twice", "from_zip"]);
    }
}
