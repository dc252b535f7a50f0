use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use prodpatch_backup::{default_state_root, BackupEntry, StateLayout};
use prodpatch_core::{
    default_config_path, feature_patch_data, Config, ExtensionSource, ExtraFeatures,
    PackageEntry, PatchConfig,
};
use prodpatch_engine::{PatchOutcome, PatchSource, Patcher};

use crate::completion::write_completions_script;
use crate::render::{render_status_line, OutputStyle, TerminalRenderer};
use crate::{Cli, Commands, ConfigCommands, PatchCommands};

/// Install locations probed by `config init`.
pub(crate) const KNOWN_PRODUCT_JSON_LOCATIONS: &[&str] = &[
    "/usr/share/vscodium/resources/app/product.json",
    "/usr/share/vscodium-bin/resources/app/product.json",
    "/usr/share/vscodium-git/resources/app/product.json",
    "/usr/share/vscodium-insiders/resources/app/product.json",
    "/usr/share/vscodium-insiders-bin/resources/app/product.json",
    "/usr/share/vscodium-insiders-git/resources/app/product.json",
    "/usr/share/vscodium-electron/resources/app/product.json",
    "/usr/share/vscodium-electron-bin/resources/app/product.json",
    "/usr/lib/vscodium/product.json",
];

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let state_root = match cli.state_dir {
        Some(path) => path,
        None => default_state_root()?,
    };
    let layout = StateLayout::new(state_root);
    tracing::debug!(
        config = %config_path.display(),
        state = %layout.root().display(),
        "resolved paths"
    );
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Patch { command } => {
            let config = Config::load(&config_path)?;
            run_patch_command(&config, &layout, command, renderer)?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                println!("{}", config_path.display());
            }
            ConfigCommands::Show => {
                let config = Config::load(&config_path)?;
                let rendered = toml::to_string(&config).context("failed to render config")?;
                print!("{rendered}");
            }
            ConfigCommands::Init { force } => {
                if config_path.exists() && !force {
                    return Err(anyhow!(
                        "config already exists: {} (use --force to overwrite)",
                        config_path.display()
                    ));
                }
                let existing = KNOWN_PRODUCT_JSON_LOCATIONS
                    .iter()
                    .map(PathBuf::from)
                    .filter(|path| path.is_file())
                    .collect::<Vec<_>>();
                let config = starter_config(&existing);
                config.save(&config_path)?;
                layout.ensure_base_dirs()?;
                renderer.print_status(
                    "ok",
                    &format!("wrote config: {}", config_path.display()),
                );
                renderer.print_status(
                    "step",
                    &format!(
                        "feature data override: {}",
                        layout.features_patch_path().display()
                    ),
                );
                if config.packages.is_empty() {
                    renderer.print_warning("no VSCodium install found; add packages by hand");
                }
                for name in config.packages.keys() {
                    renderer.print_status("step", &format!("package: {name}"));
                }
            }
        },
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout();
            write_completions_script(shell, &mut stdout)?;
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn run_patch_command(
    config: &Config,
    layout: &StateLayout,
    command: PatchCommands,
    renderer: TerminalRenderer,
) -> Result<()> {
    let patcher = Patcher::new(config, layout.backup_store());

    match command {
        PatchCommands::Apply {
            packages,
            from_backup,
        } => {
            let feature_data = feature_patch_data(&layout.features_patch_path())?;
            let outcomes = match packages.as_slice() {
                [single] => vec![patcher.patch_package(single, from_backup, feature_data)?],
                many => patcher.patch_packages(many, from_backup, feature_data)?,
            };
            print_patch_outcomes(&outcomes, renderer);
        }
        PatchCommands::ApplyAll { from_backup } => {
            let feature_data = feature_patch_data(&layout.features_patch_path())?;
            let outcomes = patcher.patch_all(from_backup, feature_data)?;
            print_patch_outcomes(&outcomes, renderer);
        }
        PatchCommands::Backup { package } => {
            let outcome = patcher.backup_package(&package)?;
            for warning in &outcome.warnings {
                renderer.print_warning(warning);
            }
            renderer.print_status(
                "ok",
                &format!(
                    "backed up {package} to {}",
                    outcome.entry.path.display()
                ),
            );
            if let Some(diagnostic) = &outcome.diagnostic_path {
                renderer.print_status(
                    "step",
                    &format!("load-and-dump copy: {}", diagnostic.display()),
                );
            }
        }
        PatchCommands::Restore { package, backup_id } => {
            let source = patcher.restore_package(&package, backup_id.as_deref())?;
            renderer.print_status(
                "ok",
                &format!("restored {package} from {}", file_name_of(&source)),
            );
        }
        PatchCommands::ListBackups { package } => {
            let backups = patcher.list_backups(&package)?;
            renderer.print_lines(&format_backup_list_lines(&package, &backups));
        }
        PatchCommands::Prune { package, keep } => {
            let removed = patcher.prune_backups(&package, keep)?;
            renderer.print_status(
                "ok",
                &format!("pruned {removed} backup(s) for {package}; kept latest {keep}"),
            );
        }
    }

    Ok(())
}

fn print_patch_outcomes(outcomes: &[PatchOutcome], renderer: TerminalRenderer) {
    if outcomes.is_empty() {
        renderer.print_warning("no configured packages matched");
        return;
    }
    for outcome in outcomes {
        renderer.print_section(&format!("Patching {}", outcome.package));
        for warning in outcome.warnings() {
            renderer.print_warning(warning);
        }
        renderer.print_lines(&format_patch_outcome_lines(outcome, renderer.style()));
    }
}

pub(crate) fn format_patch_outcome_lines(outcome: &PatchOutcome, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(backup) = &outcome.initial_backup {
        lines.push(render_status_line(
            style,
            "step",
            &format!("created initial backup {}", backup.entry.file_name),
        ));
    }
    let source = match &outcome.source {
        PatchSource::Backup(path) => format!("backup {}", file_name_of(path)),
        PatchSource::Live => "live descriptor".to_string(),
    };
    lines.push(render_status_line(
        style,
        "step",
        &format!("source: {source}"),
    ));
    if !outcome.report.touched_keys.is_empty() {
        lines.push(render_status_line(
            style,
            "step",
            &format!("updated keys: {}", outcome.report.touched_keys.join(", ")),
        ));
    }
    lines.push(render_status_line(
        style,
        "ok",
        &format!(
            "patched {} ({})",
            outcome.package,
            outcome.descriptor_path.display()
        ),
    ));
    lines
}

pub(crate) fn format_backup_list_lines(package: &str, backups: &[BackupEntry]) -> Vec<String> {
    if backups.is_empty() {
        return vec![format!("No backups found for {package}")];
    }
    let mut lines = Vec::with_capacity(backups.len() + 1);
    lines.push(format!("Backups for {package}:"));
    for backup in backups {
        lines.push(format!("- {}", backup.file_name));
    }
    lines
}

/// Derives a package name from an install path, e.g.
/// `/usr/share/vscodium-bin/resources/app/product.json` -> `vscodium-bin`.
pub(crate) fn package_name_for_location(path: &Path) -> Option<String> {
    path.ancestors()
        .skip(1)
        .filter_map(|dir| dir.file_name().and_then(|name| name.to_str()))
        .find(|name| !matches!(*name, "app" | "resources"))
        .map(str::to_string)
}

pub(crate) fn starter_config(locations: &[PathBuf]) -> Config {
    let mut packages = BTreeMap::new();
    for location in locations {
        let Some(name) = package_name_for_location(location) else {
            continue;
        };
        packages.entry(name).or_insert_with(|| PackageEntry {
            product_json_path: location.clone(),
            patch_override: None,
        });
    }

    Config {
        patch: PatchConfig {
            extra_features: Some(ExtraFeatures::Toggle(false)),
            extension_source: Some(ExtensionSource::Microsoft),
            data_dir: None,
        },
        debug: None,
        packages,
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
