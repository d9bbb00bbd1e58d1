pub mod check;
pub mod fragments;
pub mod hash;
pub mod ping;

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use sqlcheck_core::config::DEFAULT_CONFIG_FILE;
use sqlcheck_core::SqlCheckConfig;

/// Load the explicit config file, or `./sqlcheck.yaml` when it exists.
pub fn load_config(path: Option<&Path>) -> Result<SqlCheckConfig> {
    match path {
        Some(path) => SqlCheckConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => SqlCheckConfig::load_or_default(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("failed to load {DEFAULT_CONFIG_FILE}")),
    }
}

/// Identity of `file` as seen from `workspace`: relative, `/`-separated.
/// Files outside the workspace keep the path they were given.
pub fn document_identity(workspace: &Path, file: &Path) -> String {
    let absolute = |p: &Path| -> PathBuf {
        std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())
    };
    let root = absolute(workspace);
    let full = absolute(file);
    let relative = full.strip_prefix(&root).unwrap_or(file);

    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn workspace_or_cwd(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("cannot determine current directory"),
    }
}
