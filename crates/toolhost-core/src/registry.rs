//! Tool dispatch table.
//!
//! Populated once while plugins load, then shared read-only (behind an `Arc`)
//! with the HTTP front end. Plugin tools are held through `Weak` handles to the
//! plugin's [`ToolBox`] containers; the plugin manager keeps the strong ones.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Weak},
};

use serde_json::{Map, Value};
use toolhost_plugin_sdk::{
    ArgBinding, ToolArgs, ToolBox, ToolDefinition, ToolError, ToolHandler, UserContext,
};

use crate::error::RegistryError;

/// Owner recorded for tools registered directly rather than through a plugin.
pub const HOST_OWNER: &str = "host";

#[derive(Debug, Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

#[derive(Debug)]
struct Entry {
    definition: ToolDefinition,
    binding: Binding,
}

#[derive(Debug)]
enum Binding {
    Owned(ToolHandler),
    Container { container: Weak<ToolBox>, slot: usize },
}

impl Binding {
    fn resolve(&self) -> Option<ToolHandler> {
        match self {
            Binding::Owned(handler) => Some(handler.clone()),
            Binding::Container { container, slot } => container
                .upgrade()
                .and_then(|tools| tools.handler(*slot).cloned()),
        }
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a single tool. The first registration of a name always wins.
    pub fn register(
        &mut self,
        definition: ToolDefinition,
        handler: ToolHandler,
    ) -> Result<(), RegistryError> {
        let owner = if definition.owning_plugin_id.is_empty() {
            HOST_OWNER.to_string()
        } else {
            definition.owning_plugin_id.clone()
        };
        self.ensure_free(&definition.name)?;
        self.push(Entry {
            definition: prepare(definition, &owner),
            binding: Binding::Owned(handler),
        });
        Ok(())
    }

    /// Registers every tool in `containers` for `plugin_id`, or none of them.
    pub fn register_plugin_tools(
        &mut self,
        plugin_id: &str,
        containers: &[Arc<ToolBox>],
    ) -> Result<usize, RegistryError> {
        let mut staged = Vec::new();
        let mut batch = HashSet::new();
        for container in containers {
            for (slot, (definition, _)) in container.iter().enumerate() {
                self.ensure_free(&definition.name)?;
                if !batch.insert(definition.name.clone()) {
                    return Err(RegistryError::DuplicateTool {
                        name: definition.name.clone(),
                        owner: plugin_id.to_string(),
                    });
                }
                staged.push(Entry {
                    definition: prepare(definition.clone(), plugin_id),
                    binding: Binding::Container {
                        container: Arc::downgrade(container),
                        slot,
                    },
                });
            }
        }
        let count = staged.len();
        for entry in staged {
            self.push(entry);
        }
        Ok(count)
    }

    /// Snapshot of all definitions in registration order.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .map(|entry| entry.definition.clone())
            .collect()
    }

    pub fn definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&pos| &self.entries[pos].definition)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binds `args` to the tool's declared parameters and runs its handler.
    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        user: Option<UserContext>,
    ) -> Result<Value, ToolError> {
        let not_found = || ToolError::NotFound {
            name: name.to_string(),
        };
        let entry = self
            .index
            .get(name)
            .map(|&pos| &self.entries[pos])
            .ok_or_else(not_found)?;
        let handler = entry.binding.resolve().ok_or_else(not_found)?;
        let bound = bind_arguments(&entry.definition, args)?;
        tracing::debug!(tool = name, owner = %entry.definition.owning_plugin_id, "invoking tool");
        handler
            .call(bound, user)
            .await
            .map_err(ToolError::from_handler)
    }

    fn ensure_free(&self, name: &str) -> Result<(), RegistryError> {
        match self.definition(name) {
            Some(existing) => Err(RegistryError::DuplicateTool {
                name: name.to_string(),
                owner: existing.owning_plugin_id.clone(),
            }),
            None => Ok(()),
        }
    }

    fn push(&mut self, entry: Entry) {
        self.index
            .insert(entry.definition.name.clone(), self.entries.len());
        self.entries.push(entry);
    }
}

fn prepare(mut definition: ToolDefinition, owner: &str) -> ToolDefinition {
    definition.owning_plugin_id = owner.to_string();
    if definition.schema.trim().is_empty() {
        definition.schema = definition.derived_schema();
    }
    definition
}

/// Checks required parameters and shapes the arguments for the definition's binding mode.
/// `null` arguments are treated as an empty object; explicit `null` fields count as absent.
pub fn bind_arguments(definition: &ToolDefinition, args: Value) -> Result<ToolArgs, ToolError> {
    let mut fields = match args {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(ToolError::InvalidArguments {
                message: format!("arguments must be a JSON object, got {}", kind_of(&other)),
            })
        }
    };
    if let Some(missing) = definition
        .required_params()
        .find(|param| fields.get(&param.name).map_or(true, Value::is_null))
    {
        return Err(ToolError::MissingParameter {
            name: missing.name.clone(),
        });
    }
    if definition.binding == ArgBinding::Named {
        let declared = definition
            .parameters
            .iter()
            .map(|param| param.name.as_str())
            .collect::<HashSet<_>>();
        fields.retain(|key, _| declared.contains(key.as_str()));
    }
    Ok(ToolArgs::new(fields))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
