use anyhow::{Context, Result};
use serde::Deserialize;
use std::process::Command;
use tracing::debug;

use crate::types::WindowRecord;

/// A client window with the workspace it lives on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientWindow {
    pub class: String,
    pub title: String,
    pub workspace_id: i64,
    pub workspace_name: String,
}

/// Point-in-time list of all client windows.
pub trait WindowQuery {
    fn clients(&self) -> Result<Vec<ClientWindow>>;
}

#[derive(Deserialize)]
struct HyprClient {
    class: Option<String>,
    title: Option<String>,
    workspace: Option<HyprWorkspace>,
}

#[derive(Deserialize)]
struct HyprWorkspace {
    id: Option<i64>,
    name: Option<String>,
}

/// `hyprctl -j clients`.
pub struct Hyprctl;

impl WindowQuery for Hyprctl {
    fn clients(&self) -> Result<Vec<ClientWindow>> {
        let text = hyprctl(&["-j", "clients"])?;
        parse_clients(&text)
    }
}

fn hyprctl(args: &[&str]) -> Result<String> {
    let output = Command::new("hyprctl")
        .args(args)
        .output()
        .context("spawn hyprctl")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow::anyhow!("hyprctl failed: {stderr}"));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn parse_clients(text: &str) -> Result<Vec<ClientWindow>> {
    let clients: Vec<HyprClient> =
        serde_json::from_str(text.trim()).context("parse hyprctl json")?;
    let mut windows = Vec::with_capacity(clients.len());
    for client in clients {
        let Some(workspace) = client.workspace else {
            continue;
        };
        windows.push(ClientWindow {
            class: client.class.unwrap_or_default(),
            title: client.title.unwrap_or_default(),
            workspace_id: workspace.id.unwrap_or_default(),
            workspace_name: workspace.name.unwrap_or_default(),
        });
    }
    Ok(windows)
}

/// Filters the compositor's client list down to one workspace.
pub struct SnapshotProvider<Q> {
    query: Q,
}

impl<Q: WindowQuery> SnapshotProvider<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    /// Windows on `target` (matched by numeric id or by name) in compositor
    /// order. Query failures yield an empty list.
    pub fn snapshot(&self, target: &str) -> Vec<WindowRecord> {
        let clients = match self.query.clients() {
            Ok(clients) => clients,
            Err(err) => {
                debug!("window query failed: {err:#}");
                return Vec::new();
            }
        };
        clients
            .into_iter()
            .filter(|c| c.workspace_id.to_string() == target || c.workspace_name == target)
            .map(|c| WindowRecord::new(c.class, c.title))
            .collect()
    }
}
