use super::{write_stream, OutputOptions};
use crate::common::PackageArgs;
use crate::pipeline_config::PipelineConfig;
use anyhow::{Context, Result};
use clap::Args;
use kpipe_config::Config;
use kpipe_kio::{ByteReadWriter, FilterAll, Pipeline, Reader};
use kpipe_logger as logger;
use kpipe_yaml::FilterRegistry;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

/// Apply a pipeline file to every document of a package
#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    /// Pipeline file with `variables` and `filters`
    #[arg(value_name = "PIPELINE")]
    pub pipeline: PathBuf,

    #[command(flatten)]
    pub package: PackageArgs,

    /// Print the result instead of writing the package back
    #[arg(long)]
    pub dry_run: bool,

    /// Print the resolved filter declarations and exit
    #[arg(long)]
    pub print: bool,
}

pub fn handle_run<W: Write>(cmd: &RunCommand, config: &Config, mut out: W) -> Result<()> {
    let pipeline_config = PipelineConfig::load(&cmd.pipeline)
        .with_context(|| format!("Failed to load pipeline {}", cmd.pipeline.display()))?;

    if cmd.print {
        let resolved = pipeline_config.resolved_filters()?;
        out.write_all(serde_yaml::to_string(&resolved)?.as_bytes())?;
        return Ok(());
    }

    let filters = pipeline_config.build(&FilterRegistry::builtin())?;
    logger::debug(&format!("Built {} filters", filters.len()));
    let pipeline = Pipeline::new(vec![Box::new(FilterAll::new(filters))]);

    let Some(mut rw) = cmd.package.package_read_writer(config) else {
        let mut rw = ByteReadWriter::new(io::stdin().lock(), out);
        pipeline
            .execute_in_place(&mut rw)
            .context("Failed to run pipeline on stdin")?;
        return Ok(());
    };

    if cmd.dry_run {
        let nodes = rw.read().context("Failed to read package")?;
        let nodes = pipeline.apply(nodes)?;
        let options = OutputOptions {
            keep_annotations: true,
            ..Default::default()
        };
        write_stream(out, nodes, options).context("Failed to write documents")?;
        return Ok(());
    }

    pipeline
        .execute_in_place(&mut rw)
        .with_context(|| format!("Failed to update package {}", rw.package_path.display()))?;
    info!("Pipeline applied to {}", rw.package_path.display());
    logger::success(&format!("Updated {}", rw.package_path.display()));
    Ok(())
}
