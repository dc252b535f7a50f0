use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::PatchConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub patch: PatchConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugConfig>,
    #[serde(default)]
    pub packages: BTreeMap<String, PackageEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub load_and_dump_json_files: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub product_json_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_override: Option<PatchConfig>,
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("failed to parse prodpatch config")?;
        for (name, package) in &config.packages {
            validate_package_name(name)?;
            if !package.product_json_path.is_absolute() {
                return Err(anyhow!(
                    "package '{}' product_json_path must be absolute: {}",
                    name,
                    package.product_json_path.display()
                ));
            }
        }
        Ok(config)
    }

    /// Reads the config file, treating a missing file as an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file missing, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config: {}", path.display()));
            }
        };

        Self::from_toml_str(&content)
            .with_context(|| format!("failed to load config: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config dir: {}", parent.display()))?;
        }
        let content = toml::to_string(self)
            .with_context(|| format!("failed to serialize config: {}", path.display()))?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config: {}", path.display()))
    }

    pub fn package(&self, name: &str) -> Option<&PackageEntry> {
        self.packages.get(name)
    }

    /// Global defaults merged with the package's override, or `None` when the
    /// package is not configured.
    pub fn effective_patch_config(&self, name: &str) -> Option<PatchConfig> {
        let package = self.package(name)?;
        Some(self.patch.merged_with(package.patch_override.as_ref()))
    }

    pub fn load_and_dump_json_files(&self) -> bool {
        self.debug
            .as_ref()
            .is_some_and(|debug| debug.load_and_dump_json_files)
    }
}

fn validate_package_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(anyhow!("package name must not be empty"));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(anyhow!(
            "invalid package name '{name}': must not contain path separators"
        ));
    }
    Ok(())
}

pub fn default_config_path() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|dir| !dir.is_empty()) {
        return Ok(PathBuf::from(dir).join("prodpatch").join("config.toml"));
    }

    if cfg!(windows) {
        let app_data = std::env::var("APPDATA")
            .context("APPDATA is not set; cannot resolve Windows config path")?;
        return Ok(PathBuf::from(app_data).join("prodpatch").join("config.toml"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve config path")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("prodpatch")
        .join("config.toml"))
}
