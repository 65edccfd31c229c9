use kpipe_yaml::FilterError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing document streams and packages
#[derive(Error, Debug)]
pub enum KioError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to walk package: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Failed to decode document: {0}")]
    Decode(#[from] serde_yaml::Error),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("must specify package path")]
    MissingPackagePath,

    #[error("missing annotation {annotation}")]
    MissingAnnotation { annotation: String },

    #[error("invalid index annotation {value:?}")]
    InvalidIndex { value: String },

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("path annotation names a directory: {0}")]
    PathIsDirectory(String),

    #[error("path {0} escapes the package directory")]
    PathEscapesPackage(String),

    #[error("non-resource document in {path}: missing apiVersion or kind")]
    NonResource { path: String },
}
