//! Document nodes
//!
//! An [`RNode`] exclusively owns one parsed YAML tree. Filters never take the
//! tree away from it: they receive `&mut Value` borrows into the tree and hand
//! back borrows into the same tree, so mutating a node returned by a getter
//! mutates the document that owns it.

use crate::errors::FilterError;
use crate::filter::Filter;
use crate::meta::ResourceMeta;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Presentation style used when a node is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Regular indented YAML
    #[default]
    Block,
    /// Single-line flow style (JSON compatible)
    Flow,
}

/// Kind of node to create when a path lookup runs in create mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Mapping,
    Sequence,
    Scalar,
}

impl NodeKind {
    /// An empty value of this kind
    pub fn empty_value(self) -> Value {
        match self {
            NodeKind::Mapping => Value::Mapping(Mapping::new()),
            NodeKind::Sequence => Value::Sequence(Vec::new()),
            NodeKind::Scalar => Value::Null,
        }
    }
}

/// Human readable kind of a value, used in error messages
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) | Value::Number(_) | Value::String(_) => "scalar",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(tagged) => kind_name(&tagged.value),
    }
}

/// Strip any YAML tags and return the underlying value
pub fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

/// Mutable variant of [`untag`]
pub fn untag_mut(value: &mut Value) -> &mut Value {
    match value {
        Value::Tagged(tagged) => untag_mut(&mut tagged.value),
        other => other,
    }
}

/// Returns true for a missing-or-null value
pub fn is_null(value: &Value) -> bool {
    matches!(untag(value), Value::Null)
}

/// Literal text of a scalar node.
///
/// Null scalars read as the empty string. Returns `None` for mappings and
/// sequences.
pub fn scalar_text(value: &Value) -> Option<String> {
    match untag(value) {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Replace the literal text of a scalar node.
///
/// String scalars stay strings. Any other scalar is re-resolved from the new
/// text, so `"1"` written into a number stays a number while `"1x"` becomes a
/// string.
pub fn set_scalar_text(value: &mut Value, text: String) -> Result<(), FilterError> {
    let value = untag_mut(value);
    match value {
        Value::String(s) => {
            *s = text;
            Ok(())
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {
            *value = resolve_scalar(text);
            Ok(())
        }
        other => Err(FilterError::InvalidNodeKind {
            expected: "scalar",
            actual: kind_name(other),
        }),
    }
}

fn resolve_scalar(text: String) -> Value {
    match serde_yaml::from_str::<Value>(&text) {
        Ok(resolved @ (Value::Null | Value::Bool(_) | Value::Number(_))) => resolved,
        _ => Value::String(text),
    }
}

/// Look up a mapping field, `None` when absent or not a mapping
pub fn field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match untag(value) {
        Value::Mapping(map) => map.get(name),
        _ => None,
    }
}

/// Mutable variant of [`field`]
pub fn field_mut<'a>(value: &'a mut Value, name: &str) -> Option<&'a mut Value> {
    match untag_mut(value) {
        Value::Mapping(map) => map.get_mut(name),
        _ => None,
    }
}

/// Run `filters` left to right starting at `value`.
///
/// Each filter receives the node produced by the previous one. Evaluation
/// stops at the first filter that yields no node or fails.
pub fn pipe<'a>(
    value: &'a mut Value,
    filters: &[&dyn Filter],
) -> Result<Option<&'a mut Value>, FilterError> {
    let mut current = value;
    for filter in filters {
        match filter.filter(current)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// [`pipe`] over an owned filter list
pub fn pipe_all<'a>(
    value: &'a mut Value,
    filters: &[Box<dyn Filter>],
) -> Result<Option<&'a mut Value>, FilterError> {
    let refs: Vec<&dyn Filter> = filters.iter().map(|f| f.as_ref() as &dyn Filter).collect();
    pipe(value, &refs)
}

/// Encode a single value as a YAML (or flow) document
pub fn encode(value: &Value, style: Style) -> Result<String, FilterError> {
    match style {
        Style::Block => Ok(serde_yaml::to_string(value)?),
        Style::Flow => {
            let mut out = serde_json::to_string(value)?;
            out.push('\n');
            Ok(out)
        }
    }
}

/// A document: one owned YAML tree plus its presentation style
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RNode {
    value: Value,
    style: Option<Style>,
}

impl RNode {
    pub fn new(value: Value) -> Self {
        RNode { value, style: None }
    }

    /// Parse exactly one YAML document
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let value: Value = serde_yaml::from_str(text)?;
        Ok(RNode::new(value))
    }

    pub fn new_scalar(text: impl Into<String>) -> Self {
        RNode::new(Value::String(text.into()))
    }

    pub fn new_mapping() -> Self {
        RNode::new(Value::Mapping(Mapping::new()))
    }

    pub fn new_sequence() -> Self {
        RNode::new(Value::Sequence(Vec::new()))
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn style(&self) -> Option<Style> {
        self.style
    }

    pub fn set_style(&mut self, style: Option<Style>) {
        self.style = style;
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn is_null(&self) -> bool {
        is_null(&self.value)
    }

    /// Field of the root mapping, `None` if absent
    pub fn field(&self, name: &str) -> Option<&Value> {
        field(&self.value, name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        field_mut(&mut self.value, name)
    }

    /// Resource identity read from `apiVersion`, `kind` and `metadata`
    pub fn get_meta(&self) -> ResourceMeta {
        ResourceMeta::from_value(&self.value)
    }

    /// All string annotations under `metadata.annotations`
    pub fn annotations(&self) -> BTreeMap<String, String> {
        self.get_meta().annotations
    }

    pub fn get_annotation(&self, key: &str) -> Option<String> {
        self.field("metadata")
            .and_then(|metadata| field(metadata, "annotations"))
            .and_then(|annotations| field(annotations, key))
            .and_then(scalar_text)
    }

    pub fn pipe(&mut self, filters: &[&dyn Filter]) -> Result<Option<&mut Value>, FilterError> {
        pipe(&mut self.value, filters)
    }

    pub fn pipe_all(
        &mut self,
        filters: &[Box<dyn Filter>],
    ) -> Result<Option<&mut Value>, FilterError> {
        pipe_all(&mut self.value, filters)
    }

    /// Encode this document; `style` overrides the node's own style
    pub fn to_yaml_string(&self, style: Option<Style>) -> Result<String, FilterError> {
        encode(&self.value, style.or(self.style).unwrap_or_default())
    }
}

impl From<Value> for RNode {
    fn from(value: Value) -> Self {
        RNode::new(value)
    }
}
