mod backend;
mod config;
mod daemon;
mod desktop;
mod events;
mod icon;
mod panel;
mod planner;
mod render;
mod resolver;
mod scheduler;
mod types;

use anyhow::Result;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::daemon::run_daemon;

const USAGE: &str = "Usage: hypr-ws-apps [--config <path>] [--workspace <id|name|special:name>]";

#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    config: Option<PathBuf>,
    workspace: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Option<Args>> {
    let mut parsed = Args::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --config"))?;
                parsed.config = Some(PathBuf::from(value));
            }
            "--workspace" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --workspace"))?;
                parsed.workspace = Some(value.clone());
            }
            "-h" | "--help" => return Ok(None),
            _ => return Err(anyhow::anyhow!("unknown argument: {arg}")),
        }
    }
    Ok(Some(parsed))
}

fn load_config(args: &Args) -> Config {
    let path = args.config.clone().or_else(Config::default_path);
    let mut config = match path {
        Some(path) => Config::load(&path).unwrap_or_else(|err| {
            warn!("{err}; using defaults");
            Config::default()
        }),
        None => Config::default(),
    };
    if let Some(workspace) = args.workspace.as_ref().filter(|w| !w.is_empty()) {
        config.workspace = workspace.clone();
    }
    config
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let args = match parse_args(&args) {
        Ok(Some(args)) => args,
        Ok(None) => {
            eprintln!("{USAGE}");
            return Ok(());
        }
        Err(err) => {
            eprintln!("hypr-ws-apps: {err}\n{USAGE}");
            return Ok(());
        }
    };

    run_daemon(load_config(&args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let args = parse_args(&strings(&["--workspace", "special:dropdown", "--config", "/tmp/c.json"]))
            .unwrap()
            .unwrap();
        assert_eq!(args.workspace.as_deref(), Some("special:dropdown"));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.json")));

        assert_eq!(parse_args(&strings(&["--help"])).unwrap(), None);
        assert!(parse_args(&strings(&["--workspace"])).is_err());
        assert!(parse_args(&strings(&["--daemon"])).is_err());
    }

    #[test]
    fn test_workspace_flag_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "workspace": "web", "spacing": 1 }"#).unwrap();

        let config = load_config(&Args {
            config: Some(path.clone()),
            workspace: Some("4".to_string()),
        });
        assert_eq!(config.workspace, "4");
        assert_eq!(config.spacing, 1);

        std::fs::write(&path, "not json").unwrap();
        let config = load_config(&Args {
            config: Some(path),
            workspace: None,
        });
        assert_eq!(config, Config::default());
    }
}
