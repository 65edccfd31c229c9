use thiserror::Error;

/// Errors produced while building or running document filters
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported filter kind {kind}: may be one of: [{known}]")]
    UnsupportedKind { kind: String, known: String },

    #[error("filter declaration is missing a kind field")]
    MissingKind,

    #[error("ValueReplacer missing StringMatch and RegexMatch")]
    MissingMatch,

    #[error("ValueReplacer RegexMatch does not compile: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("wrong node kind: expected {expected} but got {actual}")]
    InvalidNodeKind {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid path element '{0}'")]
    InvalidPath(String),
}
