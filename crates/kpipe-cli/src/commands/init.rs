use crate::errors::CliError;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use kpipe_logger as logger;
use std::fs;
use std::path::PathBuf;

const DEFAULT_FILENAME: &str = "pipeline.yaml";

const PIPELINE_TEMPLATE: &str = r#"# kpipe pipeline
#
# The filters below are piped in order over every document: each filter
# receives the node produced by the previous one. A filter that finds
# nothing stops the chain and leaves the document as it is.

# Variables for substitution (use ${var} or $(var) syntax)
variables:
  team: platform
  container: nginx
  tag: "1.8"

filters:
  # TeePiper runs its own chain and hands the document on unchanged
  - kind: TeePiper
    pipeline:
      - kind: AnnotationSetter
        key: example.com/team
        value: ${team}

  # Navigate to the image of the named container
  - kind: PathGetter
    path: [spec, template, spec, containers, "[name=$(container)]", image]

  # Replace the tag, keeping the image name
  - kind: ValueReplacer
    regexMatch: ":.*$"
    replace: ":${tag}"
"#;

/// Write a pipeline template
#[derive(Args, Debug, Clone, Default)]
pub struct InitCommand {
    /// Optional filename for the pipeline (default: pipeline.yaml)
    pub file: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

pub fn handle_init(cmd: &InitCommand) -> Result<PathBuf> {
    logger::debug("Handling init command");

    let target = cmd
        .file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FILENAME));
    logger::debug(&format!("Target file: {}", target.display()));

    if target.exists() && !cmd.force {
        return Err(CliError::FileExists(target).into());
    }

    fs::write(&target, PIPELINE_TEMPLATE)?;
    logger::success(&format!("Created pipeline file: {}", target.display()));
    if !logger::get_quiet() {
        eprintln!();
        eprintln!("Next steps:");
        eprintln!(
            "  1. Edit {} with your filters",
            target.display().to_string().bold()
        );
        eprintln!(
            "  2. Preview the result: kpipe run {} <package> --dry-run",
            target.display()
        );
        eprintln!(
            "  3. Apply it in place: kpipe run {} <package>",
            target.display()
        );
    }
    Ok(target)
}
