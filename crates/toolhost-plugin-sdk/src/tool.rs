use std::{fmt, future::Future, pin::Pin, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ToolError;

pub type ToolFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'static>>;

type HandlerFn = dyn Fn(ToolArgs, Option<UserContext>) -> ToolFuture + Send + Sync;

/// How the registry binds an arguments object before calling the handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArgBinding {
    /// Fields are matched by name against the declared parameters; undeclared fields are dropped.
    #[default]
    Named,
    /// The whole object is handed over and decoded into a single aggregate value.
    Structured,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolParam {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl ToolParam {
    pub fn required(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            required: true,
            description: String::new(),
        }
    }

    pub fn optional(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Wire-visible description of a callable tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParam>,
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub owning_plugin_id: String,
    #[serde(skip)]
    pub binding: ArgBinding,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, short_description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_description: short_description.into(),
            long_description: String::new(),
            parameters: Vec::new(),
            schema: String::new(),
            owning_plugin_id: String::new(),
            binding: ArgBinding::Named,
        }
    }

    pub fn long_description(mut self, text: impl Into<String>) -> Self {
        self.long_description = text.into();
        self
    }

    pub fn param(mut self, param: ToolParam) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn structured(mut self) -> Self {
        self.binding = ArgBinding::Structured;
        self
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ToolParam> {
        self.parameters.iter().filter(|param| param.required)
    }

    /// JSON Schema object built from the declared parameters.
    pub fn derived_schema(&self) -> String {
        let properties = self
            .parameters
            .iter()
            .map(|param| {
                let mut prop = json!({ "type": param.kind });
                if !param.description.is_empty() {
                    prop["description"] = Value::String(param.description.clone());
                }
                (param.name.clone(), prop)
            })
            .collect::<Map<_, _>>();
        let required = self
            .required_params()
            .map(|param| param.name.as_str())
            .collect::<Vec<_>>();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
        .to_string()
    }
}

/// Arguments bound for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    fields: Map<String, Value>,
}

impl ToolArgs {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Required field; `null` counts as absent.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ToolError> {
        self.opt(name)?.ok_or_else(|| ToolError::MissingParameter {
            name: name.to_string(),
        })
    }

    pub fn opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ToolError> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|err| ToolError::InvalidArguments {
                    message: format!("parameter '{name}': {err}"),
                }),
        }
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.fields)).map_err(|err| {
            ToolError::InvalidArguments {
                message: err.to_string(),
            }
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Caller identity forwarded by the front end, when one is supplied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Opaque callable bound to a tool definition. Cheap to clone.
#[derive(Clone)]
pub struct ToolHandler(Arc<HandlerFn>);

impl ToolHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ToolArgs, Option<UserContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self(Arc::new(
            move |args: ToolArgs, user: Option<UserContext>| -> ToolFuture {
                Box::pin(f(args, user))
            },
        ))
    }

    /// Handler for tools whose whole argument object decodes into `T`.
    pub fn structured<T, F, Fut>(f: F) -> Self
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T, Option<UserContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self(Arc::new(
            move |args: ToolArgs, user: Option<UserContext>| -> ToolFuture {
                match args.decode::<T>() {
                    Ok(input) => Box::pin(f(input, user)),
                    Err(err) => Box::pin(std::future::ready(Err(anyhow::Error::new(err)))),
                }
            },
        ))
    }

    /// Handler for synchronous code. Each call runs on the blocking thread pool, so a
    /// handler that blocks never stalls the async workers and can still be timed out.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(ToolArgs, Option<UserContext>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self(Arc::new(
            move |args: ToolArgs, user: Option<UserContext>| -> ToolFuture {
                let f = f.clone();
                Box::pin(async move {
                    tokio::task::spawn_blocking(move || f(args, user))
                        .await
                        .map_err(|err| anyhow::anyhow!("tool handler aborted: {err}"))?
                })
            },
        ))
    }

    pub fn call(&self, args: ToolArgs, user: Option<UserContext>) -> ToolFuture {
        (self.0)(args, user)
    }
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ToolHandler(..)")
    }
}

/// Container of tools a plugin exposes. Owned by the plugin; the host registry keeps weak handles.
#[derive(Debug, Default)]
pub struct ToolBox {
    tools: Vec<(ToolDefinition, ToolHandler)>,
}

impl ToolBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, definition: ToolDefinition, handler: ToolHandler) -> Self {
        self.add(definition, handler);
        self
    }

    pub fn add(&mut self, definition: ToolDefinition, handler: ToolHandler) {
        self.tools.push((definition, handler));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ToolDefinition, &ToolHandler)> {
        self.tools.iter().map(|(def, handler)| (def, handler))
    }

    pub fn handler(&self, index: usize) -> Option<&ToolHandler> {
        self.tools.get(index).map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
