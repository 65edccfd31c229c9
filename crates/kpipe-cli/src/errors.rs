//! Error types for the kpipe CLI

use kpipe_yaml::FilterError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a pipeline file
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse pipeline YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Variable '{0}' not found in variables section")]
    VariableNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),
}

/// Command failures that are not raised by the library crates
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid annotation selector '{0}': expected KEY or KEY=VALUE")]
    InvalidSelector(String),

    #[error("File '{}' already exists (use --force to overwrite)", .0.display())]
    FileExists(PathBuf),
}
