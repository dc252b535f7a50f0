use prodpatch_backup::Descriptor;
use prodpatch_core::{
    resolve_feature_keys, ExtensionSource, FeaturePatchData, GalleryDescriptor, PatchConfig,
    OPENVSX_TRUSTED_DOMAINS,
};
use serde_json::Value;

pub const GALLERY_KEY: &str = "extensionsGallery";
pub const TRUSTED_DOMAINS_KEY: &str = "linkProtectionTrustedDomains";
pub const DATA_FOLDER_KEY: &str = "dataFolderName";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Keys written or removed, in pipeline order.
    pub touched_keys: Vec<String>,
    pub warnings: Vec<String>,
}

impl PatchReport {
    fn touch(&mut self, key: &str) {
        if !self.touched_keys.iter().any(|existing| existing == key) {
            self.touched_keys.push(key.to_string());
        }
    }
}

/// Runs the full pipeline. Order is fixed: trusted-domain pruning depends on
/// the marketplace step having run.
pub fn apply_patch(
    document: &mut Descriptor,
    config: &PatchConfig,
    feature_data: &FeaturePatchData,
) -> PatchReport {
    let mut report = PatchReport::default();
    apply_features(document, config, feature_data, &mut report);
    apply_marketplace(document, config, &mut report);
    apply_data_dir(document, config, &mut report);
    report
}

pub fn apply_features(
    document: &mut Descriptor,
    config: &PatchConfig,
    feature_data: &FeaturePatchData,
    report: &mut PatchReport,
) {
    let selection = resolve_feature_keys(config.extra_features.as_ref());
    for category in &selection.unknown_categories {
        tracing::debug!(category = %category, "ignoring unknown feature category");
    }

    for key in selection.keys {
        let Some(value) = feature_data.get(key) else {
            tracing::debug!(key, "no feature patch data for key");
            continue;
        };
        document.insert(key.to_string(), value.clone());
        report.touch(key);
    }
}

pub fn apply_marketplace(document: &mut Descriptor, config: &PatchConfig, report: &mut PatchReport) {
    let Some(source) = config.extension_source.as_ref() else {
        return;
    };
    let Some(gallery) = GalleryDescriptor::for_source(source) else {
        let warning = format!("invalid marketplace: {source}");
        tracing::debug!(%source, "skipping marketplace patch");
        report.warnings.push(warning);
        return;
    };

    document.insert(GALLERY_KEY.to_string(), gallery.to_json());
    report.touch(GALLERY_KEY);

    if *source == ExtensionSource::Microsoft && prune_trusted_domains(document) {
        report.touch(TRUSTED_DOMAINS_KEY);
    }
}

/// Drops the Open VSX entries from the trusted-domains list, removing the key
/// when nothing is left. Returns whether the document changed.
pub fn prune_trusted_domains(document: &mut Descriptor) -> bool {
    let Some(current) = document.get(TRUSTED_DOMAINS_KEY) else {
        return false;
    };
    let Value::Array(domains) = current else {
        tracing::debug!("trusted domains is not a list, leaving it untouched");
        return false;
    };

    let remaining: Vec<Value> = domains
        .iter()
        .filter(|domain| {
            !domain
                .as_str()
                .is_some_and(|domain| OPENVSX_TRUSTED_DOMAINS.contains(&domain))
        })
        .cloned()
        .collect();

    if remaining.is_empty() {
        document.shift_remove(TRUSTED_DOMAINS_KEY);
        return true;
    }
    if remaining.len() == domains.len() {
        return false;
    }
    document.insert(TRUSTED_DOMAINS_KEY.to_string(), Value::Array(remaining));
    true
}

pub fn apply_data_dir(document: &mut Descriptor, config: &PatchConfig, report: &mut PatchReport) {
    let Some(data_dir) = config.data_dir() else {
        return;
    };
    document.insert(
        DATA_FOLDER_KEY.to_string(),
        Value::String(data_dir.to_string_lossy().into_owned()),
    );
    report.touch(DATA_FOLDER_KEY);
}
