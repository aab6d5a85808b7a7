use http::Method;
use percent_encoding::percent_decode_str;

const TOOLS_PREFIX: &str = "/tools/";

/// Endpoints of the tool-calling API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRoute {
    Health,
    ListTools,
    CallTool,
    InvokeTool(String),
    Preflight,
}

impl ApiRoute {
    /// Stable label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ApiRoute::Health => "healthz",
            ApiRoute::ListTools => "list_tools",
            ApiRoute::CallTool => "call_tool",
            ApiRoute::InvokeTool(_) => "invoke_tool",
            ApiRoute::Preflight => "preflight",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    NotFound,
    MethodNotAllowed { allow: &'static str },
    MissingToolName,
    /// The `{name}` segment does not percent-decode to UTF-8.
    InvalidToolName,
}

#[derive(Debug, Clone)]
pub struct Router {
    health: bool,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Router {
    /// `health = false` leaves `/healthz` unregistered so it answers 404.
    pub fn new(health: bool) -> Self {
        Self { health }
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Result<ApiRoute, RouteError> {
        if *method == Method::OPTIONS && accepts_preflight(path) {
            return Ok(ApiRoute::Preflight);
        }
        match path {
            "/healthz" if self.health => read_only(method)
                .then_some(ApiRoute::Health)
                .ok_or(RouteError::MethodNotAllowed { allow: "GET, HEAD" }),
            "/tools" => read_only(method)
                .then_some(ApiRoute::ListTools)
                .ok_or(RouteError::MethodNotAllowed { allow: "GET, HEAD" }),
            "/call-tool" => (*method == Method::POST)
                .then_some(ApiRoute::CallTool)
                .ok_or(RouteError::MethodNotAllowed {
                    allow: "POST, OPTIONS",
                }),
            _ => match path.strip_prefix(TOOLS_PREFIX) {
                Some(name) if name.contains('/') => Err(RouteError::NotFound),
                Some(_) if *method != Method::POST => Err(RouteError::MethodNotAllowed {
                    allow: "POST, OPTIONS",
                }),
                Some("") => Err(RouteError::MissingToolName),
                Some(name) => percent_decode_str(name)
                    .decode_utf8()
                    .map(|name| ApiRoute::InvokeTool(name.into_owned()))
                    .map_err(|_| RouteError::InvalidToolName),
                None => Err(RouteError::NotFound),
            },
        }
    }
}

/// Only the invocation endpoints answer CORS preflight; read-only routes keep their 405.
fn accepts_preflight(path: &str) -> bool {
    match path {
        "/call-tool" => true,
        _ => path
            .strip_prefix(TOOLS_PREFIX)
            .is_some_and(|name| !name.contains('/')),
    }
}

fn read_only(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(method: Method, path: &str) -> Result<ApiRoute, RouteError> {
        Router::default().resolve(&method, path)
    }

    #[test]
    fn listing_accepts_get_and_head_only() {
        assert_eq!(resolve(Method::GET, "/tools"), Ok(ApiRoute::ListTools));
        assert_eq!(resolve(Method::HEAD, "/tools"), Ok(ApiRoute::ListTools));
        for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
            assert!(matches!(
                resolve(method, "/tools"),
                Err(RouteError::MethodNotAllowed { .. })
            ));
        }
    }

    #[test]
    fn named_invocation_requires_a_name() {
        assert_eq!(
            resolve(Method::POST, "/tools/echo"),
            Ok(ApiRoute::InvokeTool("echo".into()))
        );
        assert_eq!(
            resolve(Method::POST, "/tools/"),
            Err(RouteError::MissingToolName)
        );
        assert_eq!(resolve(Method::POST, "/tools/a/b"), Err(RouteError::NotFound));
        assert!(matches!(
            resolve(Method::GET, "/tools/echo"),
            Err(RouteError::MethodNotAllowed { .. })
        ));
    }

    #[test]
    fn options_is_preflight_on_invocation_paths_only() {
        for path in ["/call-tool", "/tools/echo"] {
            assert_eq!(resolve(Method::OPTIONS, path), Ok(ApiRoute::Preflight));
        }
        for path in ["/tools", "/healthz"] {
            assert_eq!(
                resolve(Method::OPTIONS, path),
                Err(RouteError::MethodNotAllowed { allow: "GET, HEAD" })
            );
        }
        assert_eq!(resolve(Method::OPTIONS, "/nope"), Err(RouteError::NotFound));
    }

    #[test]
    fn tool_name_segment_is_percent_decoded() {
        assert_eq!(
            resolve(Method::POST, "/tools/my%20tool"),
            Ok(ApiRoute::InvokeTool("my tool".into()))
        );
        assert_eq!(
            resolve(Method::POST, "/tools/caf%C3%A9"),
            Ok(ApiRoute::InvokeTool("caf\u{e9}".into()))
        );
        assert_eq!(
            resolve(Method::POST, "/tools/%FF"),
            Err(RouteError::InvalidToolName)
        );
    }

    #[test]
    fn disabled_health_route_is_not_found() {
        let router = Router::new(false);
        assert_eq!(
            router.resolve(&Method::GET, "/healthz"),
            Err(RouteError::NotFound)
        );
        assert_eq!(
            Router::default().resolve(&Method::GET, "/healthz"),
            Ok(ApiRoute::Health)
        );
    }

    #[test]
    fn call_tool_is_post_only() {
        assert_eq!(resolve(Method::POST, "/call-tool"), Ok(ApiRoute::CallTool));
        assert_eq!(
            resolve(Method::GET, "/call-tool"),
            Err(RouteError::MethodNotAllowed {
                allow: "POST, OPTIONS"
            })
        );
    }
}
