use thiserror::Error;

/// Failures surfaced by a tool lookup or invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool '{name}' not found")]
    NotFound { name: String },

    #[error("missing required parameter '{name}'")]
    MissingParameter { name: String },

    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The handler itself failed; carries the handler's message.
    #[error("{message}")]
    Execution { message: String },

    #[error("tool '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },
}

impl ToolError {
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Converts a handler failure, keeping the kind when the handler raised a `ToolError`.
    pub fn from_handler(err: anyhow::Error) -> Self {
        match err.downcast::<ToolError>() {
            Ok(tool_err) => tool_err,
            Err(other) => Self::Execution {
                message: format!("{other:#}"),
            },
        }
    }
}
