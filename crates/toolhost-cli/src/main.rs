use std::{fs, path::PathBuf, sync::OnceLock};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regex::Regex;
use toolhost_core::{builtin, config::Config, Host};
use toolhost_plugin_sdk::API_VERSION;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_CONFIG: &str = "demos/config/minimal.toolhost.toml";

#[derive(Parser, Debug)]
#[command(name = "toolhost", author, version, about = "Plugin host serving tools over HTTP")]
struct Cli {
    /// Sets the log level (error, warn, info, debug, trace).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load plugins and serve their tools until Ctrl+C.
    Run {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// Interact with configuration files (validate, sample output).
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Inspect plugin archives without starting the server.
    Plugins {
        #[command(subcommand)]
        command: PluginCommands,
    },
    /// Print the tool catalogue the host would serve, as JSON.
    Tools {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// Dump the resolved configuration as JSON.
    Diag {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validates the provided configuration file.
    Validate {
        #[arg(value_name = "FILE")]
        config: PathBuf,
    },
    /// Prints the bundled minimal example configuration.
    Example,
}

#[derive(Subcommand, Debug)]
enum PluginCommands {
    /// Runs discovery and compatibility checks and reports each archive's outcome.
    List {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;
    match cli.command {
        Commands::Run { config } => handle_run(config).await,
        Commands::Config { command } => handle_config(command),
        Commands::Plugins { command } => handle_plugins(command),
        Commands::Tools { config } => handle_tools(config),
        Commands::Diag { config } => handle_diag(config),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).try_init().ok();
    Ok(())
}

async fn handle_run(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    let host = Host::bootstrap(config, builtin::factories())?;
    host.run().await
}

fn handle_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Validate { config } => {
            let cfg = load_config(&config)?;
            cfg.validate()?;
            println!("configuration OK: {}", config.display());
        }
        ConfigCommands::Example => {
            println!(
                "{}",
                include_str!("../../../demos/config/minimal.toolhost.toml")
            );
        }
    }
    Ok(())
}

fn handle_plugins(command: PluginCommands) -> Result<()> {
    match command {
        PluginCommands::List { config } => {
            let mut host = Host::bootstrap(load_config(&config)?, builtin::factories())?;
            let report = host.report();
            if report.outcomes.is_empty() {
                println!("no plugin archives found (host api {API_VERSION})");
            }
            for outcome in &report.outcomes {
                println!(
                    "- {} [{}] {}{}",
                    outcome.plugin_id.as_deref().unwrap_or("?"),
                    outcome.state,
                    outcome.source.display(),
                    outcome
                        .reason
                        .as_ref()
                        .map(|reason| format!(": {reason}"))
                        .unwrap_or_else(|| format!(" ({} tools)", outcome.tools))
                );
            }
            host.shutdown();
        }
    }
    Ok(())
}

fn handle_tools(config_path: PathBuf) -> Result<()> {
    let mut host = Host::bootstrap(load_config(&config_path)?, builtin::factories())?;
    let json = serde_json::to_string_pretty(&serde_json::json!({
        "tools": host.registry().list_tools(),
    }))?;
    println!("{json}");
    host.shutdown();
    Ok(())
}

fn handle_diag(path: PathBuf) -> Result<()> {
    let cfg = load_config(&path)?;
    let json = serde_json::to_string_pretty(&cfg)?;
    println!("{json}");
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<Config> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let expanded = interpolate_env(&raw)?;
    let cfg = toml::from_str::<Config>(&expanded)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}

fn interpolate_env(input: &str) -> Result<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = match RE.get() {
        Some(regex) => regex,
        None => {
            let compiled = Regex::new(r"\$\{([A-Z0-9_]+)(?::([^}]+))?\}")
                .context("invalid interpolation pattern")?;
            RE.get_or_init(|| compiled)
        }
    };
    let result = regex.replace_all(input, |caps: &regex::Captures| {
        let key = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(key).unwrap_or_else(|_| default.to_string())
    });
    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_uses_env_or_default() {
        std::env::set_var("TOOLHOST_TEST_BIND", "0.0.0.0:9999");
        let out = interpolate_env(
            r#"bind = "${TOOLHOST_TEST_BIND}" path = "${TOOLHOST_TEST_UNSET:plugins}""#,
        )
        .unwrap();
        assert_eq!(out, r#"bind = "0.0.0.0:9999" path = "plugins""#);
    }

    #[test]
    fn bundled_example_parses_and_validates() {
        let raw = include_str!("../../../demos/config/minimal.toolhost.toml");
        let cfg = toml::from_str::<Config>(&interpolate_env(raw).unwrap()).unwrap();
        cfg.validate().unwrap();
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["toolhost", "plugins", "list", "--config", "x.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Plugins {
                command: PluginCommands::List { .. }
            }
        ));
        assert!(Cli::try_parse_from(["toolhost", "tap"]).is_err());
    }
}
