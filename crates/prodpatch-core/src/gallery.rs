use serde_json::{json, Value};

use crate::ExtensionSource;

/// Domains the Open VSX gallery adds to `linkProtectionTrustedDomains`.
pub const OPENVSX_TRUSTED_DOMAINS: &[&str] = &["https://open-vsx.org"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryDescriptor {
    Microsoft,
    OpenVsx,
}

impl GalleryDescriptor {
    /// `None` for an unrecognized source.
    pub fn for_source(source: &ExtensionSource) -> Option<Self> {
        match source {
            ExtensionSource::OpenVsx => Some(Self::OpenVsx),
            ExtensionSource::Microsoft => Some(Self::Microsoft),
            ExtensionSource::Unrecognized(_) => None,
        }
    }

    pub fn to_json(self) -> Value {
        match self {
            Self::Microsoft => json!({
                "serviceUrl": "https://marketplace.visualstudio.com/_apis/public/gallery",
                "cacheUrl": "https://vscode.blob.core.windows.net/gallery/index",
                "itemUrl": "https://marketplace.visualstudio.com/items",
            }),
            Self::OpenVsx => json!({
                "serviceUrl": "https://open-vsx.org/vscode/gallery",
                "itemUrl": "https://open-vsx.org/vscode/item",
            }),
        }
    }
}
