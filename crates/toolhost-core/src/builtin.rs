//! Reference plugins compiled into the host's factory table.

use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use bytes::Bytes;
use http::{Request, Uri};
use http_body_util::{BodyExt, Empty};
use hyper::body::Body;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use toolhost_plugin_sdk::{
    Plugin, PluginContext, ToolArgs, ToolBox, ToolDefinition, ToolError, ToolHandler, ToolParam,
};

use crate::factory::PluginFactories;

pub const ECHO_IMPL: &str = "builtin.echo";
pub const HTTP_IMPL: &str = "builtin.http";

/// Host config key holding the default outbound timeout for `http_get`, in seconds.
pub const HTTP_TIMEOUT_KEY: &str = "http.timeout_secs";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BODY_BYTES: usize = 64 * 1024;

type HttpClient = Client<HttpConnector, Empty<Bytes>>;

/// Factory table with every built-in implementation registered.
pub fn factories() -> PluginFactories {
    let mut factories = PluginFactories::new();
    factories
        .register(ECHO_IMPL, EchoPlugin::default)
        .register(HTTP_IMPL, HttpFetchPlugin::default);
    factories
}

#[derive(Default)]
pub struct EchoPlugin {
    tools: Vec<Arc<ToolBox>>,
}

#[derive(Deserialize)]
struct EchoRequest {
    message: String,
    #[serde(default = "one")]
    repeat: usize,
}

fn one() -> usize {
    1
}

impl Plugin for EchoPlugin {
    fn init(&mut self, ctx: &PluginContext) -> anyhow::Result<()> {
        let prefix = ctx.config("echo.prefix").unwrap_or_default().to_string();
        let echo = ToolDefinition::new("echo", "Echo a message back")
            .long_description("Returns `message`, upper-cased when `uppercase` is true.")
            .param(ToolParam::required("message", "string").describe("text to echo"))
            .param(ToolParam::optional("uppercase", "boolean"));
        let echo_json = ToolDefinition::new("echo_json", "Echo a structured request")
            .param(ToolParam::required("message", "string"))
            .param(ToolParam::optional("repeat", "integer"))
            .structured();

        let tools = ToolBox::new()
            .with_tool(
                echo,
                ToolHandler::sync(move |args, _user| {
                    let message: String = args.get("message")?;
                    let message = if args.opt::<bool>("uppercase")?.unwrap_or(false) {
                        message.to_uppercase()
                    } else {
                        message
                    };
                    Ok(Value::String(format!("{prefix}{message}")))
                }),
            )
            .with_tool(
                echo_json,
                ToolHandler::structured(|req: EchoRequest, user| async move {
                    Ok(json!({
                        "echo": vec![req.message; req.repeat],
                        "user": user.and_then(|u| u.user),
                    }))
                }),
            );
        self.tools = vec![Arc::new(tools)];
        Ok(())
    }

    fn tools(&self) -> Vec<Arc<ToolBox>> {
        self.tools.clone()
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.tools.clear();
        Ok(())
    }
}

/// Plain-HTTP GET tool. Every request is bounded by a timeout.
#[derive(Default)]
pub struct HttpFetchPlugin {
    tools: Vec<Arc<ToolBox>>,
}

impl Plugin for HttpFetchPlugin {
    fn init(&mut self, ctx: &PluginContext) -> anyhow::Result<()> {
        let default_timeout = match ctx.config(HTTP_TIMEOUT_KEY) {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("invalid {HTTP_TIMEOUT_KEY} `{raw}`"))?,
            ),
            None => DEFAULT_HTTP_TIMEOUT,
        };
        let client = build_client();
        let definition = ToolDefinition::new("http_get", "Fetch a URL over plain HTTP")
            .param(ToolParam::required("url", "string").describe("http:// URL to fetch"))
            .param(ToolParam::optional("timeout_secs", "integer"));
        let handler = ToolHandler::new(move |args, _user| {
            let client = client.clone();
            async move { fetch(&client, args, default_timeout).await }
        });
        self.tools = vec![Arc::new(ToolBox::new().with_tool(definition, handler))];
        Ok(())
    }

    fn tools(&self) -> Vec<Arc<ToolBox>> {
        self.tools.clone()
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.tools.clear();
        Ok(())
    }
}

fn build_client() -> HttpClient {
    let connector = HttpConnector::new();
    Client::builder(TokioExecutor::new()).build(connector)
}

async fn fetch(
    client: &HttpClient,
    args: ToolArgs,
    default_timeout: Duration,
) -> anyhow::Result<Value> {
    let url: String = args.get("url")?;
    let limit = args
        .opt::<u64>("timeout_secs")?
        .map(Duration::from_secs)
        .unwrap_or(default_timeout);
    let uri = Uri::from_str(&url).map_err(|err| ToolError::InvalidArguments {
        message: format!("invalid url `{url}`: {err}"),
    })?;
    if uri.scheme_str() != Some("http") {
        return Err(ToolError::InvalidArguments {
            message: format!("unsupported url `{url}`: only http:// is allowed"),
        }
        .into());
    }
    let req = Request::get(uri).body(Empty::<Bytes>::new())?;
    let exchange = async {
        let resp = client.request(req).await?;
        let status = resp.status().as_u16();
        let (body, truncated) = read_capped(resp.into_body(), MAX_BODY_BYTES).await?;
        anyhow::Ok((status, body, truncated))
    };
    let (status, body, truncated) = timeout(limit, exchange)
        .await
        .map_err(|_| ToolError::Timeout {
            name: "http_get".to_string(),
            timeout_ms: limit.as_millis() as u64,
        })??;
    Ok(json!({
        "status": status,
        "body": String::from_utf8_lossy(&body),
        "truncated": truncated,
    }))
}

/// Reads at most `cap` bytes of `body`, then stops pulling frames.
async fn read_capped<B>(mut body: B, cap: usize) -> anyhow::Result<(Vec<u8>, bool)>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let mut buf = Vec::new();
    while let Some(frame) = body.frame().await {
        let Ok(data) = frame?.into_data() else {
            continue;
        };
        let room = cap - buf.len();
        if data.len() > room {
            buf.extend_from_slice(&data[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&data);
    }
    Ok((buf, false))
}
