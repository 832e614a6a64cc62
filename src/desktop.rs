use anyhow::{Context, Result};
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;
use walkdir::WalkDir;

/// The `[Desktop Entry]` keys used for icon lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DesktopDescriptor {
    pub path: PathBuf,
    pub icon: String,
    pub startup_wm_class: String,
    pub name: String,
}

impl DesktopDescriptor {
    /// File name without the `.desktop` suffix.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
    }
}

/// `applications` directories in lookup order: the user data dir first, then
/// each entry of `XDG_DATA_DIRS`.
pub fn application_dirs() -> Vec<PathBuf> {
    data_dirs(dirs::data_dir(), std::env::var_os("XDG_DATA_DIRS"))
        .into_iter()
        .map(|dir| dir.join("applications"))
        .collect()
}

fn data_dirs(data_home: Option<PathBuf>, data_dirs: Option<OsString>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    paths.extend(data_home);
    let system = data_dirs
        .and_then(|dirs| dirs.into_string().ok())
        .filter(|dirs| !dirs.is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    for dir in system.split(':') {
        if !dir.is_empty() {
            paths.push(PathBuf::from(dir));
        }
    }
    paths
}

/// Parses every `.desktop` file directly inside `dirs`. Unreadable files are skipped.
pub fn scan(dirs: &[PathBuf]) -> Vec<DesktopDescriptor> {
    let mut descriptors = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "desktop"))
        {
            match read_descriptor(entry.path()) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(err) => debug!("skipping descriptor: {err:#}"),
            }
        }
    }
    debug!(count = descriptors.len(), "scanned application descriptors");
    descriptors
}

pub fn read_descriptor(path: &Path) -> Result<DesktopDescriptor> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(parse_descriptor(path, &String::from_utf8_lossy(&bytes)))
}

pub fn parse_descriptor(path: &Path, content: &str) -> DesktopDescriptor {
    let mut descriptor = DesktopDescriptor {
        path: path.to_path_buf(),
        ..Default::default()
    };
    let mut in_entry = false;
    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            in_entry = line == "[Desktop Entry]";
            continue;
        }
        if !in_entry {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "Icon" => descriptor.icon = value.to_string(),
            "StartupWMClass" => descriptor.startup_wm_class = value.to_string(),
            "Name" => descriptor.name = value.to_string(),
            _ => {}
        }
    }
    descriptor
}
