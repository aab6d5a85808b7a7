use std::{
    convert::Infallible,
    error::Error as StdError,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use http::{
    header::{self, HeaderMap, HeaderValue},
    StatusCode,
};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::{
    body::{Body, Incoming},
    service::service_fn,
    Request, Response,
};
use hyper_util::rt::TokioIo;
use rustls::{Certificate, PrivateKey, ServerConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
    sync::watch,
    time::timeout,
};
use tokio_rustls::TlsAcceptor;
use toolhost_plugin_sdk::{ToolError, UserContext};
use tracing::Instrument;

use crate::{
    config::{ServerSettings, Tls},
    registry::ToolRegistry,
    router::{ApiRoute, RouteError, Router},
};

pub type ApiBody = Full<Bytes>;

const USER_HEADER: &str = "x-user";
const CORS_METHODS: &str = "GET, HEAD, POST, OPTIONS";
const CORS_HEADERS: &str = "Content-Type, Authorization, X-User";

/// Everything a request handler needs. Read-only once the server starts.
pub struct AppState {
    registry: Arc<ToolRegistry>,
    router: Router,
    tool_timeout: Option<Duration>,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(registry: Arc<ToolRegistry>, settings: &ServerSettings) -> Self {
        Self {
            registry,
            router: Router::new(settings.health),
            tool_timeout: settings.tool_timeout(),
            max_body_bytes: settings.max_body_bytes,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

/// HTTP front end over a populated tool registry.
pub struct Server {
    state: Arc<AppState>,
    addr: SocketAddr,
    acceptor: Option<TlsAcceptor>,
}

/// A server whose listening socket is open.
pub struct BoundServer {
    state: Arc<AppState>,
    listener: TcpListener,
    addr: SocketAddr,
    acceptor: Option<TlsAcceptor>,
}

impl Server {
    pub fn new(settings: &ServerSettings, registry: Arc<ToolRegistry>) -> Result<Self> {
        settings.validate()?;
        let acceptor = settings
            .tls
            .as_ref()
            .map(|tls| build_tls_config(tls).map(|cfg| TlsAcceptor::from(Arc::new(cfg))))
            .transpose()?;
        Ok(Self {
            state: Arc::new(AppState::new(registry, settings)),
            addr: settings.parse_bind_addr()?,
            acceptor,
        })
    }

    /// Opens the listening socket. Failure here is the host's only fatal start-up error.
    pub async fn bind(self) -> Result<BoundServer> {
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        let addr = listener.local_addr()?;
        Ok(BoundServer {
            state: self.state,
            listener,
            addr,
            acceptor: self.acceptor,
        })
    }
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts connections until `shutdown` flips, one task per connection.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(
            addr = %self.addr,
            tls = self.acceptor.is_some(),
            tools = self.state.registry.len(),
            "tool server ready"
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    tracing::info!("tool server shutting down");
                    break;
                }
                accept = self.listener.accept() => {
                    let (stream, peer_addr) = match accept {
                        Ok(conn) => conn,
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let acceptor = self.acceptor.clone();
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(acceptor, state, stream, peer_addr).await {
                            tracing::warn!(error = %err, "connection closed with error");
                        }
                    });
                }
            }
        }
        Ok(())
    }
}

async fn handle_connection(
    acceptor: Option<TlsAcceptor>,
    state: Arc<AppState>,
    stream: TcpStream,
    peer_addr: SocketAddr,
) -> Result<()> {
    match acceptor {
        Some(acceptor) => {
            let tls = acceptor.accept(stream).await?;
            serve_io(tls, state, peer_addr).await
        }
        None => serve_io(stream, state, peer_addr).await,
    }
}

async fn serve_io<I>(io: I, state: Arc<AppState>, peer_addr: SocketAddr) -> Result<()>
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req: Request<Incoming>| {
        let state = state.clone();
        async move { Ok::<_, Infallible>(handle_request(state, req).await) }
    });
    http1::Builder::new()
        .serve_connection(TokioIo::new(io), service)
        .await
        .with_context(|| format!("connection handling failed for {peer_addr}"))
}

/// Routes and answers one request. Never fails: every error becomes a JSON body.
pub async fn handle_request<B>(state: Arc<AppState>, req: Request<B>) -> Response<ApiBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let start = Instant::now();
    let span = tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        status = tracing::field::Empty,
        duration_ms = tracing::field::Empty,
    );
    let response = dispatch(&state, req).instrument(span.clone()).await;
    span.record("status", response.status().as_u16());
    span.record("duration_ms", start.elapsed().as_millis() as u64);
    span.in_scope(|| tracing::debug!("request complete"));
    with_cors(response)
}

#[derive(Deserialize)]
struct CallToolRequest {
    name: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    context: Option<UserContext>,
}

async fn dispatch<B>(state: &AppState, req: Request<B>) -> Response<ApiBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let route = match state.router.resolve(req.method(), req.uri().path()) {
        Ok(route) => route,
        Err(err) => return route_error(err, req.uri().path()),
    };
    metrics::counter!("toolhost_requests_total", "route" => route.label()).increment(1);

    match route {
        ApiRoute::Health => json_response(StatusCode::OK, &json!({ "status": "ok" })),
        ApiRoute::ListTools => json_response(
            StatusCode::OK,
            &json!({ "tools": state.registry.list_tools() }),
        ),
        ApiRoute::Preflight => preflight(),
        ApiRoute::CallTool => {
            let header_user = user_from_headers(req.headers());
            let body = match read_json(state, req.into_body()).await {
                Ok(body) => body,
                Err(resp) => return resp,
            };
            let call: CallToolRequest = match serde_json::from_value(body) {
                Ok(call) => call,
                Err(err) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        format!("malformed call-tool body: {err}"),
                    )
                }
            };
            if call.name.trim().is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "tool name must not be empty");
            }
            let user = merge_user(call.context, header_user);
            invoke(state, &call.name, call.args, user).await
        }
        ApiRoute::InvokeTool(name) => {
            let user = user_from_headers(req.headers());
            let args = match read_json(state, req.into_body()).await {
                Ok(args) => args,
                Err(resp) => return resp,
            };
            invoke(state, &name, args, user).await
        }
    }
}

async fn invoke(
    state: &AppState,
    name: &str,
    args: Value,
    user: Option<UserContext>,
) -> Response<ApiBody> {
    let call = state.registry.invoke(name, args, user);
    let result = match state.tool_timeout {
        Some(limit) => timeout(limit, call).await.unwrap_or_else(|_| {
            Err(ToolError::Timeout {
                name: name.to_string(),
                timeout_ms: limit.as_millis() as u64,
            })
        }),
        None => call.await,
    };
    match result {
        Ok(value) => {
            metrics::counter!("toolhost_tool_calls_total", "outcome" => "ok").increment(1);
            json_response(StatusCode::OK, &json!({ "result": value }))
        }
        Err(err) => {
            let (status, outcome) = classify(&err);
            metrics::counter!("toolhost_tool_calls_total", "outcome" => outcome).increment(1);
            if status.is_server_error() {
                tracing::error!(tool = name, error = %err, "tool invocation failed");
            } else {
                tracing::debug!(tool = name, error = %err, "tool invocation rejected");
            }
            error_response(status, err.to_string())
        }
    }
}

/// HTTP status and metrics outcome for a tool failure.
pub fn classify(err: &ToolError) -> (StatusCode, &'static str) {
    match err {
        ToolError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        ToolError::MissingParameter { .. } | ToolError::InvalidArguments { .. } => {
            (StatusCode::BAD_REQUEST, "bad_request")
        }
        ToolError::Execution { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "error"),
        ToolError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
    }
}

async fn read_json<B>(state: &AppState, body: B) -> Result<Value, Response<ApiBody>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let collected = Limited::new(body, state.max_body_bytes)
        .collect()
        .await
        .map_err(|err| {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("request body exceeds {} bytes", state.max_body_bytes),
                )
            } else {
                error_response(
                    StatusCode::BAD_REQUEST,
                    format!("failed to read request body: {err}"),
                )
            }
        })?;
    let bytes = collected.to_bytes();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|err| {
        error_response(StatusCode::BAD_REQUEST, format!("malformed JSON body: {err}"))
    })
}

fn user_from_headers(headers: &HeaderMap) -> Option<UserContext> {
    let user = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    Some(UserContext {
        user: Some(user.to_string()),
        ..UserContext::default()
    })
}

fn merge_user(body: Option<UserContext>, header: Option<UserContext>) -> Option<UserContext> {
    match (body, header) {
        (Some(mut ctx), Some(header)) => {
            if ctx.user.is_none() {
                ctx.user = header.user;
            }
            Some(ctx)
        }
        (body, header) => body.or(header),
    }
}

fn route_error(err: RouteError, path: &str) -> Response<ApiBody> {
    match err {
        RouteError::NotFound => error_response(StatusCode::NOT_FOUND, format!("no route for {path}")),
        RouteError::MissingToolName => {
            error_response(StatusCode::BAD_REQUEST, "missing tool name in path")
        }
        RouteError::InvalidToolName => {
            error_response(StatusCode::BAD_REQUEST, "tool name in path is not valid UTF-8")
        }
        RouteError::MethodNotAllowed { allow } => {
            let mut resp = error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
            resp.headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
            resp
        }
    }
}

fn json_response(status: StatusCode, body: &Value) -> Response<ApiBody> {
    let mut resp = Response::new(Full::new(Bytes::from(body.to_string())));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response<ApiBody> {
    json_response(status, &json!({ "error": message.into() }))
}

fn preflight() -> Response<ApiBody> {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = StatusCode::NO_CONTENT;
    resp.headers_mut()
        .insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
    resp
}

fn with_cors(mut resp: Response<ApiBody>) -> Response<ApiBody> {
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_HEADERS),
    );
    resp
}

fn build_tls_config(tls: &Tls) -> Result<ServerConfig> {
    let certs = load_certs(&tls.cert)?;
    let key = load_private_key(&tls.key)?;
    let mut config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid certificate/key pair")?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

fn load_certs(path: &str) -> Result<Vec<Certificate>> {
    let data = std::fs::read(path).with_context(|| format!("failed to read cert {path}"))?;
    let mut reader = std::io::Cursor::new(data);
    let raw =
        rustls_pemfile::certs(&mut reader).map_err(|_| anyhow!("invalid certificate data"))?;
    Ok(raw.into_iter().map(Certificate).collect())
}

fn load_private_key(path: &str) -> Result<PrivateKey> {
    let data = std::fs::read(path).with_context(|| format!("failed to read key {path}"))?;
    let mut reader = std::io::Cursor::new(data);
    while let Some(item) =
        rustls_pemfile::read_one(&mut reader).map_err(|_| anyhow!("invalid key format"))?
    {
        match item {
            rustls_pemfile::Item::PKCS8Key(key)
            | rustls_pemfile::Item::RSAKey(key)
            | rustls_pemfile::Item::ECKey(key) => return Ok(PrivateKey(key)),
            _ => continue,
        }
    }
    anyhow::bail!("no usable private keys found in {path}")
}
