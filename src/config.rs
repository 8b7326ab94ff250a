//! Configuration file loading.
//!
//! Resolution order (first file found wins):
//! 1. `--config PATH`
//! 2. `$DIRMAP_CONFIG`
//! 3. `.dirmap.toml` in the current directory
//! 4. `<config dir>/dirmap/config.toml`
//! 5. Built-in defaults
//!
//! Only an explicit `--config` that cannot be read is an error. Broken
//! files found by searching are reported and skipped.

use anyhow::{Context, Result};
use dirmap_core::scanner::ScanSettings;
use dirmap_treemap::TreemapSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const ENV_VAR: &str = "DIRMAP_CONFIG";
const LOCAL_FILE: &str = ".dirmap.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanSettings,
    pub treemap: TreemapSettings,
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Candidate files after `--config`, in priority order.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = std::env::var_os(ENV_VAR) {
        paths.push(PathBuf::from(path));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(LOCAL_FILE));
    }
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("dirmap").join("config.toml"));
    }
    paths
}

/// Load the effective configuration and the file it came from, if any.
pub fn load(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((Config::read(path)?, Some(path.to_path_buf())));
    }
    Ok(search(&candidate_paths()))
}

fn search(candidates: &[PathBuf]) -> (Config, Option<PathBuf>) {
    for path in candidates {
        if !path.is_file() {
            continue;
        }
        match Config::read(path) {
            Ok(config) => {
                debug!("Using config file {}", path.display());
                return (config, Some(path.clone()));
            }
            Err(err) => warn!("Skipping config file: {err:#}"),
        }
    }
    (Config::default(), None)
}
