use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};

use crate::{read_descriptor, write_descriptor, BackupError, BackupName, PRISTINE_NAME};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupOptions {
    /// Also write a load-then-dump copy of the snapshot next to it.
    pub load_and_dump_json_files: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub name: BackupName,
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub entry: BackupEntry,
    pub diagnostic_path: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Per-package snapshots of the live descriptor, one directory per package
/// under `backups_root`.
#[derive(Debug, Clone)]
pub struct BackupStore {
    backups_root: PathBuf,
}

impl BackupStore {
    pub fn new(backups_root: impl Into<PathBuf>) -> Self {
        Self {
            backups_root: backups_root.into(),
        }
    }

    pub fn package_dir(&self, package: &str) -> PathBuf {
        self.backups_root.join(package)
    }

    pub fn create_backup(
        &self,
        package: &str,
        descriptor_path: &Path,
        options: BackupOptions,
    ) -> Result<BackupOutcome> {
        self.create_backup_at(
            package,
            descriptor_path,
            Local::now().naive_local(),
            options,
        )
    }

    pub fn create_backup_at(
        &self,
        package: &str,
        descriptor_path: &Path,
        taken_at: NaiveDateTime,
        options: BackupOptions,
    ) -> Result<BackupOutcome> {
        let dir = self.package_dir(package);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create backup dir: {}", dir.display()))?;

        let name = BackupName::Timestamped(taken_at);
        let file_name = name.file_name();
        if let Some(newest) = self.list_backups(package)?.into_iter().next() {
            if newest.name >= name {
                return Err(BackupError::OutOfOrder {
                    package: package.to_string(),
                    name: file_name,
                    newest: newest.file_name,
                }
                .into());
            }
        }

        let target = dir.join(&file_name);
        let partial = dir.join(format!(".{file_name}.partial"));
        if let Err(err) = copy_into_place(descriptor_path, &partial, &target) {
            let _ = remove_file_if_exists(&partial);
            return Err(err);
        }
        tracing::info!(package, backup = %file_name, "created backup");

        let mut outcome = BackupOutcome {
            entry: BackupEntry {
                name,
                file_name,
                path: target,
            },
            diagnostic_path: None,
            warnings: Vec::new(),
        };

        if options.load_and_dump_json_files {
            let diagnostic = diagnostic_path_for(&outcome.entry.path);
            match read_descriptor(&outcome.entry.path)
                .and_then(|document| write_descriptor(&diagnostic, &document))
            {
                Ok(()) => outcome.diagnostic_path = Some(diagnostic),
                Err(err) => {
                    tracing::debug!(error = %format!("{err:#}"), "load-and-dump copy failed");
                    outcome
                        .warnings
                        .push(format!("skipped load-and-dump copy: {err:#}"));
                }
            }
        }

        Ok(outcome)
    }

    /// Backups for `package`, newest first. A missing directory is an empty
    /// list.
    pub fn list_backups(&self, package: &str) -> Result<Vec<BackupEntry>> {
        let dir = self.package_dir(package);
        let read_dir = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read backup dir: {}", dir.display()));
            }
        };

        let mut backups = Vec::new();
        for entry in read_dir {
            let entry =
                entry.with_context(|| format!("failed to read backup dir: {}", dir.display()))?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(name) = BackupName::parse(&file_name) else {
                continue;
            };
            backups.push(BackupEntry {
                name,
                file_name,
                path: entry.path(),
            });
        }

        backups.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(backups)
    }

    pub fn latest_backup(&self, package: &str) -> Result<Option<BackupEntry>> {
        Ok(self.list_backups(package)?.into_iter().next())
    }

    /// Deletes everything but the `keep_latest` newest backups and returns how
    /// many were removed.
    pub fn prune_backups(&self, package: &str, keep_latest: usize) -> Result<usize> {
        let mut removed = 0;
        for backup in self.list_backups(package)?.into_iter().skip(keep_latest) {
            fs::remove_file(&backup.path)
                .with_context(|| format!("failed to remove backup: {}", backup.path.display()))?;
            let diagnostic = diagnostic_path_for(&backup.path);
            if diagnostic.is_file() {
                fs::remove_file(&diagnostic).with_context(|| {
                    format!("failed to remove backup copy: {}", diagnostic.display())
                })?;
            }
            tracing::debug!(package, backup = %backup.file_name, "pruned backup");
            removed += 1;
        }
        Ok(removed)
    }

    /// Copies a backup over the live descriptor and returns the backup used.
    ///
    /// `backup_id` may be a full file name or just the timestamp suffix; with
    /// no id the newest backup is restored.
    pub fn restore_backup(
        &self,
        package: &str,
        descriptor_path: &Path,
        backup_id: Option<&str>,
    ) -> Result<PathBuf> {
        let source = match backup_id {
            Some(id) => self.resolve_backup_id(package, id)?,
            None => {
                self.latest_backup(package)?
                    .ok_or_else(|| BackupError::NotFound {
                        package: package.to_string(),
                        id: None,
                    })?
                    .path
            }
        };

        fs::copy(&source, descriptor_path).with_context(|| {
            format!(
                "failed to restore {} to {}",
                source.display(),
                descriptor_path.display()
            )
        })?;
        tracing::info!(package, source = %source.display(), "restored backup");
        Ok(source)
    }

    fn resolve_backup_id(&self, package: &str, id: &str) -> Result<PathBuf> {
        let not_found = || BackupError::NotFound {
            package: package.to_string(),
            id: Some(id.to_string()),
        };
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(not_found().into());
        }

        let dir = self.package_dir(package);
        let exact = dir.join(id);
        if exact.is_file() {
            return Ok(exact);
        }
        let suffixed = dir.join(format!("{PRISTINE_NAME}.{id}"));
        if suffixed.is_file() {
            return Ok(suffixed);
        }
        Err(not_found().into())
    }
}

/// Copies through `partial` so a snapshot only appears under its final name
/// once its bytes are on disk.
fn copy_into_place(source: &Path, partial: &Path, target: &Path) -> Result<()> {
    fs::copy(source, partial).with_context(|| {
        format!(
            "failed to copy {} to {}",
            source.display(),
            partial.display()
        )
    })?;
    fs::File::open(partial)
        .and_then(|file| file.sync_all())
        .with_context(|| format!("failed to flush backup: {}", partial.display()))?;
    fs::rename(partial, target)
        .with_context(|| format!("failed to move backup into place: {}", target.display()))
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn diagnostic_path_for(backup: &Path) -> PathBuf {
    let file_name = backup
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = file_name.strip_suffix(".json").unwrap_or(&file_name);
    backup.with_file_name(format!("{base}.load_and_dump.json"))
}
