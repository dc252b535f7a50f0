mod engine;
mod error;
mod package;

pub use engine::{
    apply_data_dir, apply_features, apply_marketplace, apply_patch, prune_trusted_domains,
    PatchReport, DATA_FOLDER_KEY, GALLERY_KEY, TRUSTED_DOMAINS_KEY,
};
pub use error::PatchError;
pub use package::{PatchOutcome, PatchSource, Patcher};

#[cfg(test)]
mod tests;
