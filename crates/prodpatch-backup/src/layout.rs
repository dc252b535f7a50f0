use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::BackupStore;

/// On-disk state owned by the tool: backups and the optional feature data
/// override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn package_backup_dir(&self, package: &str) -> PathBuf {
        self.backups_dir().join(package)
    }

    pub fn patch_data_dir(&self) -> PathBuf {
        self.root.join("patch")
    }

    pub fn features_patch_path(&self) -> PathBuf {
        self.patch_data_dir().join("features-patch.json")
    }

    pub fn backup_store(&self) -> BackupStore {
        BackupStore::new(self.backups_dir())
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [self.backups_dir(), self.patch_data_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_state_root() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME").filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir).join("prodpatch"));
    }

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows state root")?;
        return Ok(PathBuf::from(app_data).join("prodpatch"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve state root")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("prodpatch"))
}
