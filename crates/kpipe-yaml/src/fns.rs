//! Path and field filters
//!
//! These are the building blocks every other filter is written in terms of:
//! navigating to a field or sequence element, setting and clearing fields,
//! and appending to sequences.

use crate::errors::FilterError;
use crate::filter::Filter;
use crate::node::{field, kind_name, pipe_all, scalar_text, untag, untag_mut, NodeKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// One element of a lookup path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathPart<'p> {
    /// A mapping field name
    Field(&'p str),
    /// `[key=value]` selects the first sequence element whose `key` field is
    /// `value`; `[=value]` selects a scalar element equal to `value`
    Element { key: &'p str, value: &'p str },
}

impl<'p> PathPart<'p> {
    fn parse(part: &'p str) -> Result<Self, FilterError> {
        let Some(inner) = part.strip_prefix('[') else {
            return Ok(PathPart::Field(part));
        };
        let (key, value) = inner
            .strip_suffix(']')
            .and_then(|inner| inner.split_once('='))
            .ok_or_else(|| FilterError::InvalidPath(part.to_string()))?;
        Ok(PathPart::Element { key, value })
    }
}

fn wrong_kind(expected: &'static str, actual: &Value) -> FilterError {
    FilterError::InvalidNodeKind {
        expected,
        actual: kind_name(actual),
    }
}

fn lookup_field<'a>(
    node: &'a mut Value,
    name: &str,
    create: Option<NodeKind>,
) -> Result<Option<&'a mut Value>, FilterError> {
    let node = untag_mut(node);
    let Some(kind) = create else {
        return Ok(match node {
            Value::Mapping(map) => map.get_mut(name),
            _ => None,
        });
    };
    if matches!(node, Value::Null) {
        *node = Value::Mapping(Mapping::new());
    }
    match node {
        Value::Mapping(map) => {
            if !map.contains_key(name) {
                map.insert(Value::from(name), kind.empty_value());
            }
            Ok(map.get_mut(name))
        }
        other => Err(wrong_kind("mapping", other)),
    }
}

fn element_matches(element: &Value, key: &str, value: &str) -> bool {
    if key.is_empty() {
        return !matches!(untag(element), Value::Mapping(_) | Value::Sequence(_))
            && scalar_text(element).as_deref() == Some(value);
    }
    field(element, key).and_then(scalar_text).as_deref() == Some(value)
}

fn new_element(key: &str, value: &str) -> Value {
    if key.is_empty() {
        return Value::from(value);
    }
    let mut map = Mapping::new();
    map.insert(Value::from(key), Value::from(value));
    Value::Mapping(map)
}

fn lookup_element<'a>(
    node: &'a mut Value,
    key: &str,
    value: &str,
    create: bool,
) -> Result<Option<&'a mut Value>, FilterError> {
    let node = untag_mut(node);
    if create && matches!(node, Value::Null) {
        *node = Value::Sequence(Vec::new());
    }
    let seq = match node {
        Value::Sequence(seq) => seq,
        other if create => return Err(wrong_kind("sequence", other)),
        _ => return Ok(None),
    };
    let position = seq.iter().position(|el| element_matches(el, key, value));
    match position {
        Some(i) => Ok(seq.get_mut(i)),
        None if create => {
            seq.push(new_element(key, value));
            Ok(seq.last_mut())
        }
        None => Ok(None),
    }
}

/// Returns the node at `path`, optionally creating missing parts.
///
/// Without `create` a missing part yields `None`. With `create`, missing
/// intermediate parts become mappings (or sequences when the following part
/// is an element selector) and the last part is created with the given kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathGetter {
    #[serde(default)]
    pub path: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<NodeKind>,
}

impl PathGetter {
    pub fn new(path: &[&str]) -> Self {
        PathGetter {
            path: path.iter().map(|p| p.to_string()).collect(),
            create: None,
        }
    }

    pub fn create(path: &[&str], kind: NodeKind) -> Self {
        PathGetter {
            create: Some(kind),
            ..PathGetter::new(path)
        }
    }
}

impl Filter for PathGetter {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let mut current = node;
        for (i, raw) in self.path.iter().enumerate() {
            let next_kind = match self.path.get(i + 1) {
                Some(next) if next.starts_with('[') => NodeKind::Sequence,
                Some(_) => NodeKind::Mapping,
                None => self.create.unwrap_or(NodeKind::Scalar),
            };
            let next = match PathPart::parse(raw)? {
                PathPart::Field(name) => {
                    lookup_field(current, name, self.create.map(|_| next_kind))?
                }
                PathPart::Element { key, value } => {
                    lookup_element(current, key, value, self.create.is_some())?
                }
            };
            match next {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

/// Step taken while descending to a matched node
enum Step {
    Key(Value),
    Index(usize),
}

enum PartMatcher {
    Field(Regex),
    Element { key: String, value: Regex },
}

impl PartMatcher {
    fn compile(part: &str) -> Result<Self, FilterError> {
        let anchored = |pattern: &str| Regex::new(&format!("^(?:{})$", pattern));
        Ok(match PathPart::parse(part)? {
            PathPart::Field(name) => PartMatcher::Field(anchored(name)?),
            PathPart::Element { key, value } => PartMatcher::Element {
                key: key.to_string(),
                value: anchored(value)?,
            },
        })
    }
}

fn find_match(value: &Value, parts: &[PartMatcher], steps: &mut Vec<Step>) -> bool {
    let Some((part, rest)) = parts.split_first() else {
        return true;
    };
    match (part, untag(value)) {
        (PartMatcher::Field(re), Value::Mapping(map)) => {
            for (k, v) in map {
                let Some(name) = scalar_text(k) else {
                    continue;
                };
                if !re.is_match(&name) {
                    continue;
                }
                steps.push(Step::Key(k.clone()));
                if find_match(v, rest, steps) {
                    return true;
                }
                steps.pop();
            }
            false
        }
        (PartMatcher::Element { key, value: re }, Value::Sequence(seq)) => {
            for (i, el) in seq.iter().enumerate() {
                let text = if key.is_empty() {
                    scalar_text(el)
                } else {
                    field(el, key).and_then(scalar_text)
                };
                if !text.is_some_and(|t| re.is_match(&t)) {
                    continue;
                }
                steps.push(Step::Index(i));
                if find_match(el, rest, steps) {
                    return true;
                }
                steps.pop();
            }
            false
        }
        _ => false,
    }
}

/// Like [`PathGetter`], but every path part is a regular expression.
///
/// Field parts match field names; `[key=pattern]` parts match sequence
/// elements by the text of their `key` field. Returns the first match in
/// document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMatcher {
    #[serde(default)]
    pub path: Vec<String>,
}

impl PathMatcher {
    pub fn new(path: &[&str]) -> Self {
        PathMatcher {
            path: path.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Filter for PathMatcher {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let parts = self
            .path
            .iter()
            .map(|p| PartMatcher::compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        let mut steps = Vec::new();
        if !find_match(node, &parts, &mut steps) {
            return Ok(None);
        }
        let mut current = node;
        for step in &steps {
            let next = match step {
                Step::Key(key) => match untag_mut(current) {
                    Value::Mapping(map) => map.get_mut(key),
                    _ => None,
                },
                Step::Index(i) => match untag_mut(current) {
                    Value::Sequence(seq) => seq.get_mut(*i),
                    _ => None,
                },
            };
            match next {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}

/// Returns a field's value when present and, if `value` is set, equal to it.
///
/// An empty `name` matches the node itself as a scalar. With `create`, a
/// missing or mismatched field is set to `value` (or null).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMatcher {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default)]
    pub create: bool,
}

impl FieldMatcher {
    pub fn new(name: impl Into<String>) -> Self {
        FieldMatcher {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn creating(mut self) -> Self {
        self.create = true;
        self
    }

    fn value_matches(&self, candidate: &Value) -> bool {
        self.value
            .as_deref()
            .map_or(true, |expected| scalar_text(candidate).as_deref() == Some(expected))
    }
}

impl Filter for FieldMatcher {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        if self.name.is_empty() {
            if scalar_text(node).is_none() {
                return Err(wrong_kind("scalar", node));
            }
            return Ok(self.value_matches(node).then_some(node));
        }
        let target = untag_mut(node);
        if self.create && matches!(target, Value::Null) {
            *target = Value::Mapping(Mapping::new());
        }
        let map = match target {
            Value::Mapping(map) => map,
            other => return Err(wrong_kind("mapping", other)),
        };
        let name = self.name.as_str();
        if map.get(name).is_some_and(|v| self.value_matches(v)) {
            return Ok(map.get_mut(name));
        }
        if self.create {
            let value = self.value.clone().map_or(Value::Null, Value::String);
            map.insert(Value::from(name), value);
            return Ok(map.get_mut(name));
        }
        Ok(None)
    }
}

/// Sets a mapping field and returns the new field value.
///
/// An empty `name` replaces the node itself; a missing `value` clears the
/// field instead (see [`FieldClearer`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSetter {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldSetter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldSetter {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl Filter for FieldSetter {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let Some(value) = &self.value else {
            return FieldClearer::new(self.name.as_str()).filter(node);
        };
        if self.name.is_empty() {
            *node = value.clone();
            return Ok(Some(node));
        }
        let target = untag_mut(node);
        if matches!(target, Value::Null) {
            *target = Value::Mapping(Mapping::new());
        }
        match target {
            Value::Mapping(map) => {
                map.insert(Value::from(self.name.as_str()), value.clone());
                Ok(map.get_mut(self.name.as_str()))
            }
            other => Err(wrong_kind("mapping", other)),
        }
    }
}

/// Removes a mapping field.
///
/// Returns the mapping when a field was removed and `None` when there was
/// nothing to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldClearer {
    #[serde(default)]
    pub name: String,
}

impl FieldClearer {
    pub fn new(name: impl Into<String>) -> Self {
        FieldClearer { name: name.into() }
    }
}

impl Filter for FieldClearer {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let target = untag_mut(node);
        let removed = match target {
            Value::Mapping(map) => map.shift_remove(self.name.as_str()).is_some(),
            _ => false,
        };
        Ok(removed.then_some(target))
    }
}

/// Appends elements to a sequence and returns the last one appended
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementAppender {
    #[serde(default)]
    pub elements: Vec<Value>,
}

impl ElementAppender {
    pub fn new(elements: Vec<Value>) -> Self {
        ElementAppender { elements }
    }
}

impl Filter for ElementAppender {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let target = untag_mut(node);
        if matches!(target, Value::Null) {
            *target = Value::Sequence(Vec::new());
        }
        match target {
            Value::Sequence(seq) => {
                seq.extend(self.elements.iter().cloned());
                if self.elements.is_empty() {
                    Ok(None)
                } else {
                    Ok(seq.last_mut())
                }
            }
            other => Err(wrong_kind("sequence", other)),
        }
    }
}

/// Returns the first sequence element whose `key` field equals `value`.
///
/// An empty `key` compares scalar elements directly. With `create`, a
/// missing element is appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementMatcher {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub value: String,

    #[serde(default)]
    pub create: bool,
}

impl ElementMatcher {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        ElementMatcher {
            key: key.into(),
            value: value.into(),
            create: false,
        }
    }
}

impl Filter for ElementMatcher {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        lookup_element(node, &self.key, &self.value, self.create)
    }
}

/// Runs a sub-pipeline for its side effects and returns the original node
#[derive(Debug, Default)]
pub struct TeePiper {
    pub filters: Vec<Box<dyn Filter>>,
}

impl TeePiper {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        TeePiper { filters }
    }
}

impl Filter for TeePiper {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        pipe_all(node, &self.filters)?;
        Ok(Some(node))
    }
}

/// Replaces the node with the document parsed from `value`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parser {
    #[serde(default)]
    pub value: String,
}

impl Filter for Parser {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        *node = serde_yaml::from_str(&self.value)?;
        Ok(Some(node))
    }
}
