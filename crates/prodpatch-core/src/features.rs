use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};

use crate::ExtraFeatures;

/// Descriptor keys controlled by each feature category, in application order.
pub const FEATURE_CATEGORIES: &[(&str, &[&str])] = &[
    ("api-proposals", &["extensionEnabledApiProposals"]),
    ("telemetry", &["tasConfig"]),
    (
        "extension-compatibility",
        &[
            "extensionKind",
            "extensionPointExtensionKind",
            "extensionSyncedKeys",
            "extensionVirtualWorkspacesSupport",
        ],
    ),
    ("auth", &["auth", "trustedExtensionAuthAccess"]),
    (
        "settings-sync",
        &[
            "configurationSync.store",
            "editSessions.store",
            "tunnelApplicationName",
            "tunnelApplicationConfig",
        ],
    ),
];

const BUNDLED_FEATURES_PATCH: &str = include_str!("../data/features-patch.json");

static FEATURE_PATCH_DATA: OnceLock<FeaturePatchData> = OnceLock::new();

pub fn category_keys(name: &str) -> Option<&'static [&'static str]> {
    FEATURE_CATEGORIES
        .iter()
        .find(|(category, _)| *category == name)
        .map(|(_, keys)| *keys)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSelection {
    pub keys: Vec<&'static str>,
    pub unknown_categories: Vec<String>,
}

/// Expands `extra_features` into the descriptor keys it selects. Category
/// names missing from [`FEATURE_CATEGORIES`] select nothing and are reported
/// back in `unknown_categories`.
pub fn resolve_feature_keys(extra_features: Option<&ExtraFeatures>) -> FeatureSelection {
    let mut selection = FeatureSelection::default();
    match extra_features {
        None | Some(ExtraFeatures::Toggle(false)) => {}
        Some(ExtraFeatures::Toggle(true)) => {
            for (_, keys) in FEATURE_CATEGORIES {
                push_unique(&mut selection.keys, keys);
            }
        }
        Some(ExtraFeatures::Categories(names)) => {
            for name in names {
                match category_keys(name) {
                    Some(keys) => push_unique(&mut selection.keys, keys),
                    None => {
                        if !selection.unknown_categories.contains(name) {
                            selection.unknown_categories.push(name.clone());
                        }
                    }
                }
            }
        }
    }
    selection
}

fn push_unique(target: &mut Vec<&'static str>, keys: &[&'static str]) {
    for key in keys {
        if !target.contains(key) {
            target.push(*key);
        }
    }
}

/// Static values installed for each feature key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeaturePatchData {
    values: Map<String, Value>,
}

impl FeaturePatchData {
    pub fn from_json_str(input: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(input).context("failed to parse feature patch data")?;
        let Value::Object(values) = value else {
            return Err(anyhow!("feature patch data must be a JSON object"));
        };
        Ok(Self { values })
    }

    pub fn bundled() -> Result<Self> {
        Self::from_json_str(BUNDLED_FEATURES_PATCH)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read feature patch data: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("failed to load feature patch data: {}", path.display()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

impl From<Map<String, Value>> for FeaturePatchData {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}

/// Process-wide feature patch data. The first call decides the source: the
/// file at `override_path` if it exists, the bundled copy otherwise. Later
/// calls return the cached value whatever path they pass.
pub fn feature_patch_data(override_path: &Path) -> Result<&'static FeaturePatchData> {
    if let Some(cached) = FEATURE_PATCH_DATA.get() {
        return Ok(cached);
    }

    let data = if override_path.is_file() {
        tracing::debug!(path = %override_path.display(), "loading feature patch data");
        FeaturePatchData::load(override_path)?
    } else {
        tracing::debug!("using bundled feature patch data");
        FeaturePatchData::bundled()?
    };
    Ok(FEATURE_PATCH_DATA.get_or_init(|| data))
}
