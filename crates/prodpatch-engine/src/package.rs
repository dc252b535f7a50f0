use std::path::PathBuf;

use anyhow::Result;
use prodpatch_backup::{
    read_descriptor, write_descriptor, BackupEntry, BackupOptions, BackupOutcome, BackupStore,
};
use prodpatch_core::{Config, FeaturePatchData, PackageEntry};

use crate::{apply_patch, PatchError, PatchReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSource {
    Backup(PathBuf),
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub package: String,
    pub descriptor_path: PathBuf,
    pub source: PatchSource,
    /// Set when this run had to take the package's first backup.
    pub initial_backup: Option<BackupOutcome>,
    pub report: PatchReport,
}

impl PatchOutcome {
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.initial_backup
            .iter()
            .flat_map(|backup| backup.warnings.iter())
            .chain(self.report.warnings.iter())
            .map(String::as_str)
    }
}

/// Package-level operations: resolves packages through the config, keeps the
/// backup store in step, and runs the patch pipeline.
#[derive(Debug)]
pub struct Patcher<'a> {
    config: &'a Config,
    store: BackupStore,
}

impl<'a> Patcher<'a> {
    pub fn new(config: &'a Config, store: BackupStore) -> Self {
        Self { config, store }
    }

    pub fn package(&self, name: &str) -> Result<&'a PackageEntry> {
        self.config.package(name).ok_or_else(|| {
            PatchError::UnknownPackage {
                package: name.to_string(),
            }
            .into()
        })
    }

    /// Backup failures are fatal unless `from_backup` is set, in which case
    /// the live descriptor is patched and the failure is reported as a
    /// warning.
    pub fn patch_package(
        &self,
        name: &str,
        from_backup: bool,
        feature_data: &FeaturePatchData,
    ) -> Result<PatchOutcome> {
        let package = self.package(name)?;
        let patch_config =
            self.config
                .effective_patch_config(name)
                .ok_or_else(|| PatchError::UnknownPackage {
                    package: name.to_string(),
                })?;
        let descriptor_path = package.product_json_path.as_path();

        let mut warnings = Vec::new();
        let mut initial_backup = None;
        let latest = match self.ensure_backup(name, &mut initial_backup) {
            Ok(latest) => latest,
            Err(err) if from_backup => {
                tracing::warn!(package = name, "initial backup failed: {err:#}");
                warnings.push(format!("failed to create initial backup: {err:#}"));
                None
            }
            Err(err) => return Err(err),
        };

        let source = match (from_backup, latest) {
            (true, Some(BackupEntry { path, .. })) => PatchSource::Backup(path),
            (true, None) => {
                tracing::debug!(package = name, "no backup available, patching live descriptor");
                warnings.push("no backup available; patched the live descriptor".to_string());
                PatchSource::Live
            }
            (false, _) => PatchSource::Live,
        };
        let input_path = match &source {
            PatchSource::Backup(path) => path.as_path(),
            PatchSource::Live => descriptor_path,
        };

        let mut document = read_descriptor(input_path)?;
        tracing::debug!(package = name, input = %input_path.display(), "patching");
        let mut report = apply_patch(&mut document, &patch_config, feature_data);
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        write_descriptor(descriptor_path, &document)?;
        tracing::info!(package = name, "patched descriptor");

        Ok(PatchOutcome {
            package: name.to_string(),
            descriptor_path: descriptor_path.to_path_buf(),
            source,
            initial_backup,
            report,
        })
    }

    /// Returns the newest backup, taking the first one if none exist yet.
    fn ensure_backup(
        &self,
        name: &str,
        initial_backup: &mut Option<BackupOutcome>,
    ) -> Result<Option<BackupEntry>> {
        if let Some(latest) = self.store.latest_backup(name)? {
            return Ok(Some(latest));
        }
        *initial_backup = Some(self.backup_package(name)?);
        self.store.latest_backup(name)
    }

    /// Patches every listed package that is configured; unknown names are
    /// skipped.
    pub fn patch_packages<S: AsRef<str>>(
        &self,
        names: &[S],
        from_backup: bool,
        feature_data: &FeaturePatchData,
    ) -> Result<Vec<PatchOutcome>> {
        let mut outcomes = Vec::new();
        for name in names {
            let name: &str = name.as_ref();
            if self.config.package(name).is_none() {
                tracing::debug!(package = name, "skipping unconfigured package");
                continue;
            }
            outcomes.push(self.patch_package(name, from_backup, feature_data)?);
        }
        Ok(outcomes)
    }

    pub fn patch_all(
        &self,
        from_backup: bool,
        feature_data: &FeaturePatchData,
    ) -> Result<Vec<PatchOutcome>> {
        let names = self.config.packages.keys().collect::<Vec<_>>();
        self.patch_packages(&names, from_backup, feature_data)
    }

    pub fn backup_package(&self, name: &str) -> Result<BackupOutcome> {
        let package = self.package(name)?;
        self.store.create_backup(
            name,
            &package.product_json_path,
            BackupOptions {
                load_and_dump_json_files: self.config.load_and_dump_json_files(),
            },
        )
    }

    pub fn restore_package(&self, name: &str, backup_id: Option<&str>) -> Result<PathBuf> {
        let package = self.package(name)?;
        self.store
            .restore_backup(name, &package.product_json_path, backup_id)
    }

    pub fn list_backups(&self, name: &str) -> Result<Vec<BackupEntry>> {
        self.package(name)?;
        self.store.list_backups(name)
    }

    pub fn prune_backups(&self, name: &str, keep_latest: usize) -> Result<usize> {
        self.package(name)?;
        self.store.prune_backups(name, keep_latest)
    }
}
