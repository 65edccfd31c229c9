//! Scalar value filters and the filter matcher

use crate::errors::FilterError;
use crate::filter::Filter;
use crate::node::{kind_name, pipe_all, scalar_text, set_scalar_text};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

fn scalar(node: &Value) -> Result<String, FilterError> {
    scalar_text(node).ok_or(FilterError::InvalidNodeKind {
        expected: "scalar",
        actual: kind_name(node),
    })
}

/// Replaces text inside a scalar value.
///
/// `string_match` takes precedence over `regex_match`. A `count` of zero or
/// less replaces every occurrence of `string_match`; regex matches are always
/// all replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueReplacer {
    #[serde(default)]
    pub string_match: String,

    #[serde(default)]
    pub regex_match: String,

    #[serde(default)]
    pub replace: String,

    #[serde(default)]
    pub count: i64,
}

impl ValueReplacer {
    fn replace_text(&self, text: &str) -> Result<String, FilterError> {
        if !self.string_match.is_empty() {
            return Ok(match usize::try_from(self.count) {
                Ok(n) if n > 0 => text.replacen(&self.string_match, &self.replace, n),
                _ => text.replace(&self.string_match, &self.replace),
            });
        }
        if !self.regex_match.is_empty() {
            let re = Regex::new(&self.regex_match)?;
            return Ok(re.replace_all(text, self.replace.as_str()).into_owned());
        }
        Err(FilterError::MissingMatch)
    }
}

impl Filter for ValueReplacer {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let text = scalar(node)?;
        let replaced = self.replace_text(&text)?;
        set_scalar_text(node, replaced)?;
        Ok(Some(node))
    }
}

/// Prepends `value` unless the scalar already starts with it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixSetter {
    #[serde(default)]
    pub value: String,
}

impl Filter for PrefixSetter {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let text = scalar(node)?;
        if !text.starts_with(&self.value) {
            set_scalar_text(node, format!("{}{}", self.value, text))?;
        }
        Ok(Some(node))
    }
}

/// Appends `value` unless the scalar already ends with it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuffixSetter {
    #[serde(default)]
    pub value: String,
}

impl Filter for SuffixSetter {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let text = scalar(node)?;
        if !text.ends_with(&self.value) {
            set_scalar_text(node, format!("{}{}", text, self.value))?;
        }
        Ok(Some(node))
    }
}

/// Gates on a sub-pipeline.
///
/// Returns the input node unchanged when the sub-pipeline yields a node, and
/// `None` when it does not.
#[derive(Debug, Default)]
pub struct FilterMatcher {
    pub filters: Vec<Box<dyn Filter>>,
}

impl FilterMatcher {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        FilterMatcher { filters }
    }
}

impl Filter for FilterMatcher {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let matched = pipe_all(node, &self.filters)?.is_some();
        Ok(matched.then_some(node))
    }
}
