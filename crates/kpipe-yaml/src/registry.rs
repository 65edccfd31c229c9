//! Declarative filter construction
//!
//! A [`FilterRegistry`] maps a declaration's `kind` to a constructor that
//! populates the concrete filter from the remaining fields. The registry is
//! an explicit value: whoever builds pipelines owns one, usually
//! [`FilterRegistry::builtin`].

use crate::annotations::{AnnotationClearer, AnnotationGetter, AnnotationSetter};
use crate::errors::FilterError;
use crate::filter::Filter;
use crate::filters::{FilterMatcher, PrefixSetter, SuffixSetter, ValueReplacer};
use crate::fns::{
    ElementAppender, ElementMatcher, FieldClearer, FieldMatcher, FieldSetter, Parser, PathGetter,
    PathMatcher, TeePiper,
};
use crate::node::{field, scalar_text};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Builds one filter from its declaration
pub type Constructor = fn(&FilterRegistry, Value) -> Result<Box<dyn Filter>, FilterError>;

/// Declaration fields shared by filters that wrap a sub-pipeline
#[derive(Debug, Default, Deserialize)]
struct PipelineDecl {
    #[serde(default)]
    pipeline: Vec<Value>,
}

fn decode<F>(_: &FilterRegistry, decl: Value) -> Result<Box<dyn Filter>, FilterError>
where
    F: Filter + DeserializeOwned + 'static,
{
    let filter: F = serde_yaml::from_value(decl)?;
    Ok(Box::new(filter))
}

fn filter_matcher(registry: &FilterRegistry, decl: Value) -> Result<Box<dyn Filter>, FilterError> {
    let decl: PipelineDecl = serde_yaml::from_value(decl)?;
    Ok(Box::new(FilterMatcher::new(
        registry.build_pipeline(decl.pipeline)?,
    )))
}

fn tee_piper(registry: &FilterRegistry, decl: Value) -> Result<Box<dyn Filter>, FilterError> {
    let decl: PipelineDecl = serde_yaml::from_value(decl)?;
    Ok(Box::new(TeePiper::new(registry.build_pipeline(decl.pipeline)?)))
}

/// Name to constructor mapping for declarative filters
#[derive(Clone, Default)]
pub struct FilterRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl FilterRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every filter shipped with this crate
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("AnnotationClearer", decode::<AnnotationClearer>);
        registry.register("AnnotationGetter", decode::<AnnotationGetter>);
        registry.register("AnnotationSetter", decode::<AnnotationSetter>);
        registry.register("ElementAppender", decode::<ElementAppender>);
        registry.register("ElementMatcher", decode::<ElementMatcher>);
        registry.register("FieldClearer", decode::<FieldClearer>);
        registry.register("FieldMatcher", decode::<FieldMatcher>);
        registry.register("FieldSetter", decode::<FieldSetter>);
        registry.register("FilterMatcher", filter_matcher);
        registry.register("Parser", decode::<Parser>);
        registry.register("PathGetter", decode::<PathGetter>);
        registry.register("PathMatcher", decode::<PathMatcher>);
        registry.register("PrefixSetter", decode::<PrefixSetter>);
        registry.register("SuffixSetter", decode::<SuffixSetter>);
        registry.register("TeePiper", tee_piper);
        registry.register("ValueReplacer", decode::<ValueReplacer>);
        registry
    }

    /// Add or replace a constructor
    pub fn register(&mut self, kind: impl Into<String>, constructor: Constructor) {
        self.constructors.insert(kind.into(), constructor);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kinds in sorted order
    pub fn kinds(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build one filter from a `{kind: ..., ...}` declaration
    pub fn build(&self, decl: Value) -> Result<Box<dyn Filter>, FilterError> {
        let kind = field(&decl, "kind")
            .and_then(scalar_text)
            .filter(|k| !k.is_empty())
            .ok_or(FilterError::MissingKind)?;
        let Some(constructor) = self.constructors.get(&kind) else {
            return Err(FilterError::UnsupportedKind {
                kind,
                known: self.kinds().join(","),
            });
        };
        debug!("Building filter of kind {}", kind);
        constructor(self, decl)
    }

    /// Build filters in declaration order
    pub fn build_pipeline(&self, decls: Vec<Value>) -> Result<Vec<Box<dyn Filter>>, FilterError> {
        decls.into_iter().map(|decl| self.build(decl)).collect()
    }

    /// Build a pipeline from a YAML list of declarations
    pub fn from_yaml_str(&self, text: &str) -> Result<Vec<Box<dyn Filter>>, FilterError> {
        let decls: Vec<Value> = serde_yaml::from_str(text)?;
        self.build_pipeline(decls)
    }
}
