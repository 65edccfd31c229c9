use super::{write_stream, OutputOptions};
use crate::common::PackageArgs;
use crate::errors::CliError;
use anyhow::{Context, Result};
use clap::Args;
use kpipe_config::Config;
use kpipe_kio::{MatchFilter, NodesFilter};
use kpipe_yaml::{AnnotationGetter, Filter, FilterRegistry};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Print only the documents matching a selector
#[derive(Args, Debug, Clone, Default)]
pub struct GrepCommand {
    #[command(flatten)]
    pub package: PackageArgs,

    /// Annotation selector: KEY matches any value, KEY=VALUE an exact value
    #[arg(long, value_name = "KEY=VALUE", conflicts_with = "filters", required_unless_present = "filters")]
    pub annotation: Option<String>,

    /// YAML file holding a list of filter declarations
    #[arg(long, value_name = "FILE")]
    pub filters: Option<PathBuf>,

    /// Print the documents that do not match
    #[arg(long)]
    pub invert: bool,

    /// Keep index, path and package annotations in the output
    #[arg(long)]
    pub keep_annotations: bool,
}

/// Parse `KEY` or `KEY=VALUE` into an annotation getter
pub fn parse_selector(selector: &str) -> Result<AnnotationGetter, CliError> {
    let (key, value) = selector.split_once('=').unwrap_or((selector, ""));
    if key.trim().is_empty() {
        return Err(CliError::InvalidSelector(selector.to_string()));
    }
    Ok(AnnotationGetter {
        key: key.trim().to_string(),
        value: value.to_string(),
    })
}

fn selector_filters(cmd: &GrepCommand) -> Result<Vec<Box<dyn Filter>>> {
    if let Some(path) = &cmd.filters {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read filters {}", path.display()))?;
        return Ok(FilterRegistry::builtin().from_yaml_str(&content)?);
    }
    let selector = cmd.annotation.as_deref().unwrap_or_default();
    Ok(vec![Box::new(parse_selector(selector)?)])
}

pub fn handle_grep<W: Write>(cmd: &GrepCommand, config: &Config, out: W) -> Result<()> {
    let mut matcher = MatchFilter::new(selector_filters(cmd)?);
    matcher.invert = cmd.invert;

    let nodes = cmd
        .package
        .read(config)
        .context("Failed to read documents")?;
    let matched = matcher.filter(nodes)?;

    let options = OutputOptions {
        keep_annotations: cmd.keep_annotations,
        ..Default::default()
    };
    write_stream(out, matched, options).context("Failed to write documents")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn package() -> TempDir {
        let Ok(dir) = TempDir::new() else {
            panic!("temp dir should be created");
        };
        let docs = "kind: A\nmetadata:\n  annotations:\n    team: blue\n---\nkind: B\nmetadata:\n  annotations:\n    team: red\n---\nkind: C\n";
        assert!(fs::write(dir.path().join("all.yaml"), docs).is_ok());
        dir
    }

    fn grep(dir: &TempDir, configure: impl FnOnce(&mut GrepCommand)) -> String {
        let mut cmd = GrepCommand {
            package: crate::common::PackageArgs {
                path: Some(dir.path().to_path_buf()),
                ..Default::default()
            },
            ..Default::default()
        };
        configure(&mut cmd);
        let mut out = Vec::new();
        if let Err(e) = handle_grep(&cmd, &Config::default(), &mut out) {
            panic!("grep should succeed: {e:#}");
        }
        String::from_utf8(out).unwrap_or_default()
    }

    #[test]
    fn test_parse_selector() {
        assert!(parse_selector("team=blue").is_ok_and(|g| g.key == "team" && g.value == "blue"));
        assert!(parse_selector("team").is_ok_and(|g| g.key == "team" && g.value.is_empty()));
        assert!(matches!(
            parse_selector("=blue"),
            Err(CliError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_grep_exact_annotation() {
        let dir = package();
        let out = grep(&dir, |c| c.annotation = Some("team=blue".to_string()));
        assert_eq!(out, "kind: A\nmetadata:\n  annotations:\n    team: blue\n");
    }

    #[test]
    fn test_grep_any_value_inverted() {
        let dir = package();
        let out = grep(&dir, |c| {
            c.annotation = Some("team".to_string());
            c.invert = true;
        });
        assert_eq!(out, "kind: C\n");
    }

    #[test]
    fn test_grep_with_filter_file() {
        let dir = package();
        let filters = dir.path().join("filters.txt");
        assert!(fs::write(&filters, "- kind: FieldMatcher\n  name: kind\n  value: B\n").is_ok());
        let out = grep(&dir, |c| c.filters = Some(filters));
        assert!(out.starts_with("kind: B\n"));
        assert!(!out.contains("kind: A"));
    }
}
