//! kpipe document model
//!
//! This crate holds the in-memory side of kpipe:
//! - [`RNode`], the owning handle for one YAML document
//! - the [`Filter`] trait and `pipe`, which threads a node through filters
//!   and stops on the first "no match" or error
//! - the filter catalog (path, field, element, annotation and value filters)
//! - [`FilterRegistry`], which turns `{kind: ..., ...}` declarations into
//!   filters
//!
//! Parsing and encoding of the YAML text itself is done by `serde_yaml`.

pub mod annotations;
pub mod errors;
pub mod filter;
pub mod filters;
pub mod fns;
pub mod meta;
pub mod node;
pub mod registry;

pub use annotations::{
    clear_annotation, clear_empty_annotations, get_annotation, set_annotation, AnnotationClearer,
    AnnotationGetter, AnnotationSetter,
};
pub use errors::FilterError;
pub use filter::Filter;
pub use filters::{FilterMatcher, PrefixSetter, SuffixSetter, ValueReplacer};
pub use fns::{
    ElementAppender, ElementMatcher, FieldClearer, FieldMatcher, FieldSetter, Parser, PathGetter,
    PathMatcher, TeePiper,
};
pub use meta::ResourceMeta;
pub use node::{NodeKind, RNode, Style};
pub use registry::{Constructor, FilterRegistry};

// Re-export the tree type filters operate on
pub use serde_yaml::{Mapping, Value};
