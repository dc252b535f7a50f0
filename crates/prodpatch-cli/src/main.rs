use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod completion;
mod dispatch;
mod render;

use dispatch::run_cli;

#[derive(Parser, Debug)]
#[command(name = "prodpatch")]
#[command(about = "Reversible product.json patcher for VSCodium", long_about = None)]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding backups and feature data.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Patch {
        #[command(subcommand)]
        command: PatchCommands,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Completions {
        shell: Shell,
    },
    Version,
}

#[derive(Subcommand, Debug)]
enum PatchCommands {
    /// Patch one or more packages.
    Apply {
        #[arg(required = true)]
        packages: Vec<String>,
        /// Patch from the newest backup instead of the live file.
        #[arg(long)]
        from_backup: bool,
    },
    /// Patch every configured package.
    ApplyAll {
        #[arg(long)]
        from_backup: bool,
    },
    Backup {
        package: String,
    },
    Restore {
        package: String,
        backup_id: Option<String>,
    },
    ListBackups {
        package: String,
    },
    Prune {
        package: String,
        #[arg(long)]
        keep: usize,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    Path,
    Show,
    /// Write a starter config, seeding packages found at known install paths.
    Init {
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    run_cli(Cli::parse())
}
