use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    /// JSON file shared with the settings UI. May not exist yet.
    pub store_path: PathBuf,
}

pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let logs_dir = ensure_dir(&cfg.logs_dir)?;
    let store_path = ensure_dir(&cfg.data_dir)?.join(&cfg.store_filename);
    if store_path.is_dir() {
        bail!("store path {} is a directory", store_path.display());
    }
    Ok(ResolvedPaths {
        logs_dir,
        store_path,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {path}"))?;
    Ok(dir.canonicalize().unwrap_or(dir))
}
