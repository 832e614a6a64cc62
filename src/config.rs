use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PANEL_PADDING: u32 = 4;
pub const CORNER_RADIUS: f32 = 6.0;
pub const FALLBACK_ICON: &str = "application-x-executable";

const DEFAULT_WORKSPACE: &str = "1";
const DEFAULT_ICON_SIZE: u32 = 18;
const DEFAULT_SPACING: u32 = 6;
const MAX_ICON_SIZE: u32 = 512;
const MAX_SPACING: u32 = 256;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: expected a JSON object at the top level")]
    NotAnObject { path: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub workspace: String,
    pub icon_size: u32,
    pub spacing: u32,
    /// Zero means unlimited.
    pub max_icons: usize,
    pub show_empty: bool,
    pub tooltip: bool,
    pub css_class: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: DEFAULT_WORKSPACE.to_string(),
            icon_size: DEFAULT_ICON_SIZE,
            spacing: DEFAULT_SPACING,
            max_icons: 0,
            show_empty: false,
            tooltip: true,
            css_class: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("hypr-ws-apps").join("config.json"))
    }

    /// Loads the file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        let value: Value = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        match value {
            Value::Object(entries) => Ok(Self::from_entries(&entries)),
            _ => Err(ConfigError::NotAnObject {
                path: path.display().to_string(),
            }),
        }
    }

    /// Every key is parsed on its own; a bad value only resets that key.
    pub fn from_entries(entries: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| entries.get(key);

        let workspace = get("workspace")
            .and_then(parse_string_loose)
            .unwrap_or(defaults.workspace);
        let icon_size = get("icon_size")
            .and_then(parse_int_loose)
            .filter(|size| *size > 0)
            .and_then(|size| u32::try_from(size).ok())
            .filter(|size| *size <= MAX_ICON_SIZE)
            .unwrap_or(defaults.icon_size);
        let spacing = get("spacing")
            .and_then(parse_int_loose)
            .and_then(|spacing| u32::try_from(spacing).ok())
            .filter(|spacing| *spacing <= MAX_SPACING)
            .unwrap_or(defaults.spacing);
        let max_icons = get("max_icons")
            .and_then(parse_int_loose)
            .map(|max| usize::try_from(max).unwrap_or(0))
            .unwrap_or(defaults.max_icons);
        let show_empty = get("show_empty")
            .and_then(parse_bool_loose)
            .unwrap_or(defaults.show_empty);
        let tooltip = get("tooltip")
            .and_then(parse_bool_loose)
            .unwrap_or(defaults.tooltip);
        let css_class = get("css_class").and_then(parse_string_loose);

        Self {
            workspace,
            icon_size,
            spacing,
            max_icons,
            show_empty,
            tooltip,
            css_class,
        }
    }
}

fn clean_text(raw: &str) -> &str {
    let raw = match raw.find("//") {
        Some(pos) => &raw[..pos],
        None => raw,
    };
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return raw[1..raw.len() - 1].trim();
        }
    }
    raw
}

fn parse_string_loose(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => clean_text(text).to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn parse_int_loose(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => {
            let text = clean_text(text);
            let end = text
                .char_indices()
                .find(|(idx, ch)| !(ch.is_ascii_digit() || (*idx == 0 && matches!(ch, '-' | '+'))))
                .map(|(idx, _)| idx)
                .unwrap_or(text.len());
            text[..end].parse().ok()
        }
        _ => None,
    }
}

fn parse_bool_loose(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(text) => match clean_text(text).to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn entries(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_defaults_for_empty_object() {
        let config = Config::from_entries(&Map::new());
        assert_eq!(config, Config::default());
        assert_eq!(config.workspace, "1");
        assert_eq!(config.icon_size, 18);
        assert_eq!(config.spacing, 6);
        assert!(config.tooltip);
        assert!(!config.show_empty);
    }

    #[test]
    fn test_loose_values() {
        let config = Config::from_entries(&entries(json!({
            "workspace": "\"special:dropdown\" // scratchpad",
            "icon_size": "24px",
            "spacing": 2,
            "max_icons": "3",
            "show_empty": "1",
            "tooltip": "False",
            "css_class": "dock",
        })));
        assert_eq!(config.workspace, "special:dropdown");
        assert_eq!(config.icon_size, 24);
        assert_eq!(config.spacing, 2);
        assert_eq!(config.max_icons, 3);
        assert!(config.show_empty);
        assert!(!config.tooltip);
        assert_eq!(config.css_class.as_deref(), Some("dock"));
    }

    #[test]
    fn test_bad_value_falls_back_per_key() {
        let config = Config::from_entries(&entries(json!({
            "workspace": 4,
            "icon_size": "huge",
            "spacing": -3,
            "max_icons": -1,
            "show_empty": "maybe",
            "css_class": "",
        })));
        assert_eq!(config.workspace, "4");
        assert_eq!(config.icon_size, 18);
        assert_eq!(config.spacing, 6);
        assert_eq!(config.max_icons, 0);
        assert!(!config.show_empty);
        assert_eq!(config.css_class, None);

        let config = Config::from_entries(&entries(json!({
            "icon_size": 70000,
            "spacing": "100000",
        })));
        assert_eq!(config.icon_size, 18);
        assert_eq!(config.spacing, 6);

        let config = Config::from_entries(&entries(json!({
            "icon_size": 512,
            "spacing": 256,
        })));
        assert_eq!(config.icon_size, 512);
        assert_eq!(config.spacing, 256);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "workspace": "web", "max_icons": 2 }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.workspace, "web");
        assert_eq!(config.max_icons, 2);

        let missing = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(missing, Config::default());
    }

    #[test]
    fn test_load_rejects_non_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::NotAnObject { .. })
        ));

        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
