use std::io::Write;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::Cli;

pub(crate) fn write_completions_script<W: Write>(shell: Shell, out: &mut W) -> Result<()> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();
    generate(shell, &mut command, "prodpatch", &mut buffer);
    out.write_all(&buffer)
        .with_context(|| format!("failed writing {shell} completion script"))?;
    out.flush().context("failed flushing completion output")
}
