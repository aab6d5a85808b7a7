use std::{collections::BTreeMap, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::capability::CapabilityPolicy;

pub const DEFAULT_BIND: &str = "127.0.0.1:8750";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Root configuration structure deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub host: HostSettings,
    pub plugins: Plugins,
    pub capabilities: CapabilityPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub tool_timeout_secs: Option<u64>,
    pub max_body_bytes: usize,
    pub health: bool,
    pub tls: Option<Tls>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            tool_timeout_secs: Some(30),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            health: true,
            tls: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tls {
    pub cert: String,
    pub key: String,
}

/// Values exposed to plugins as `PluginContext::host_config`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HostSettings {
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Plugins {
    pub search_paths: Vec<String>,
}

impl Default for Plugins {
    fn default() -> Self {
        Self {
            search_paths: vec!["plugins".to_string()],
        }
    }
}

impl Config {
    /// Validates structural invariants and provides actionable error messages.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        for path in &self.plugins.search_paths {
            if path.trim().is_empty() {
                bail!("plugin search paths must not be empty");
            }
        }
        Ok(())
    }
}

impl ServerSettings {
    pub fn validate(&self) -> Result<()> {
        self.parse_bind_addr()
            .with_context(|| format!("invalid bind address `{}`", self.bind))?;
        if self.max_body_bytes == 0 {
            bail!("server.max_body_bytes must be greater than zero");
        }
        if let Some(tls) = &self.tls {
            tls.validate()?;
        }
        Ok(())
    }

    pub fn parse_bind_addr(&self) -> Result<SocketAddr> {
        if self.bind.starts_with(':') {
            let addr = format!("0.0.0.0{}", self.bind);
            Ok(SocketAddr::from_str(&addr)?)
        } else {
            Ok(SocketAddr::from_str(&self.bind)?)
        }
    }

    /// Upper bound for one tool invocation; `None` or `0` disables it.
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Tls {
    pub fn validate(&self) -> Result<()> {
        if self.cert.trim().is_empty() || self.key.trim().is_empty() {
            bail!("tls cert and key paths must be provided");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_shorthand_defaults_to_all_interfaces() {
        let server = ServerSettings {
            bind: ":8080".into(),
            ..ServerSettings::default()
        };
        assert_eq!(
            server.parse_bind_addr().unwrap(),
            SocketAddr::from_str("0.0.0.0:8080").unwrap()
        );
    }

    #[test]
    fn parses_full_document() {
        let cfg: Config = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0:9000"
            tool_timeout_secs = 5

            [host.config]
            "http.timeout_secs" = "3"

            [plugins]
            search_paths = ["/opt/plugins", "plugins"]

            [capabilities]
            allow = ["network.http"]
            deny = ["process.exec"]
            "#,
        )
        .unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.server.tool_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.server.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(
            cfg.host.config.get("http.timeout_secs").map(String::as_str),
            Some("3")
        );
        assert_eq!(cfg.plugins.search_paths.len(), 2);
        assert!(cfg.capabilities.check("network.http").is_none());
        assert!(cfg.capabilities.check("process.exec").is_some());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.server.bind, DEFAULT_BIND);
        assert!(cfg.capabilities.is_permissive());
        assert_eq!(cfg.plugins.search_paths, vec!["plugins"]);
    }

    #[test]
    fn rejects_bad_server_settings() {
        let mut cfg = Config::default();
        cfg.server.bind = "not-an-address".into();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.server.tls = Some(Tls {
            cert: "cert.pem".into(),
            key: " ".into(),
        });
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.server.tool_timeout_secs = Some(0);
        assert_eq!(cfg.server.tool_timeout(), None);
    }
}
