use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which feature categories to install into the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraFeatures {
    Toggle(bool),
    Categories(Vec<String>),
}

/// Marketplace the editor should talk to.
///
/// Unknown strings are kept rather than rejected so a typo in the config file
/// degrades to a warning at patch time instead of failing the whole load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExtensionSource {
    OpenVsx,
    Microsoft,
    Unrecognized(String),
}

impl ExtensionSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::OpenVsx => "openvsx",
            Self::Microsoft => "microsoft",
            Self::Unrecognized(value) => value,
        }
    }
}

impl From<String> for ExtensionSource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "openvsx" => Self::OpenVsx,
            "microsoft" => Self::Microsoft,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<ExtensionSource> for String {
    fn from(value: ExtensionSource) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ExtensionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patch settings as written in the config file. The same shape is used for
/// the global defaults and for each package's override; every field is
/// optional so an override can leave a field to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_features: Option<ExtraFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_source: Option<ExtensionSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl PatchConfig {
    /// Field-by-field merge: a field set in `overrides` wins, an unset one
    /// falls through to `self`.
    pub fn merged_with(&self, overrides: Option<&PatchConfig>) -> PatchConfig {
        let Some(overrides) = overrides else {
            return self.clone();
        };

        PatchConfig {
            extra_features: overrides
                .extra_features
                .clone()
                .or_else(|| self.extra_features.clone()),
            extension_source: overrides
                .extension_source
                .clone()
                .or_else(|| self.extension_source.clone()),
            data_dir: overrides
                .data_dir
                .clone()
                .or_else(|| self.data_dir.clone()),
        }
    }

    /// The data folder override, ignoring an empty string.
    pub fn data_dir(&self) -> Option<&PathBuf> {
        self.data_dir
            .as_ref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }
}
