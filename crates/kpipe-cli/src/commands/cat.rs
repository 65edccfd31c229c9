use super::{write_stream, OutputOptions};
use crate::common::PackageArgs;
use anyhow::{Context, Result};
use clap::Args;
use kpipe_config::Config;
use kpipe_logger as logger;
use std::io::Write;

/// Print the documents of a package as one stream
#[derive(Args, Debug, Clone, Default)]
pub struct CatCommand {
    #[command(flatten)]
    pub package: PackageArgs,

    /// Wrap the output in a ResourceList
    #[arg(long)]
    pub wrap: bool,

    /// Keep index, path and package annotations in the output
    #[arg(long)]
    pub keep_annotations: bool,

    /// Print documents in flow (JSON) style
    #[arg(long)]
    pub flow: bool,
}

pub fn handle_cat<W: Write>(cmd: &CatCommand, config: &Config, out: W) -> Result<()> {
    let nodes = cmd
        .package
        .read(config)
        .context("Failed to read documents")?;
    logger::debug(&format!("Read {} documents", nodes.len()));

    let options = OutputOptions {
        wrap: cmd.wrap,
        keep_annotations: cmd.keep_annotations,
        flow: cmd.flow,
    };
    write_stream(out, nodes, options).context("Failed to write documents")?;
    Ok(())
}
