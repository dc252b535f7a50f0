mod config;
mod features;
mod gallery;
mod patch_config;

pub use config::{default_config_path, Config, DebugConfig, PackageEntry};
pub use features::{
    category_keys, feature_patch_data, resolve_feature_keys, FeaturePatchData, FeatureSelection,
    FEATURE_CATEGORIES,
};
pub use gallery::{GalleryDescriptor, OPENVSX_TRUSTED_DOMAINS};
pub use patch_config::{ExtensionSource, ExtraFeatures, PatchConfig};
