//! Filters over `metadata.annotations`

use crate::errors::FilterError;
use crate::filter::Filter;
use crate::fns::{FieldClearer, FieldSetter, PathGetter};
use crate::node::{field_mut, pipe, scalar_text, untag, NodeKind};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

const ANNOTATIONS_PATH: [&str; 2] = ["metadata", "annotations"];

/// Sets an annotation, creating `metadata.annotations` if needed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSetter {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub value: String,
}

impl Filter for AnnotationSetter {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        pipe(
            node,
            &[
                &PathGetter::create(&ANNOTATIONS_PATH, NodeKind::Mapping),
                &FieldSetter::new(self.key.as_str(), Value::String(self.value.clone())),
            ],
        )
    }
}

/// Returns an annotation value.
///
/// Yields `None` when the annotation is missing, or when `value` is set and
/// the annotation is not exactly equal to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationGetter {
    #[serde(default)]
    pub key: String,

    #[serde(default)]
    pub value: String,
}

impl Filter for AnnotationGetter {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        let Some(annotations) = PathGetter::new(&ANNOTATIONS_PATH).filter(node)? else {
            return Ok(None);
        };
        let Some(value) = field_mut(annotations, &self.key) else {
            return Ok(None);
        };
        if self.value.is_empty() || scalar_text(value).as_deref() == Some(self.value.as_str()) {
            return Ok(Some(value));
        }
        Ok(None)
    }
}

/// Removes an annotation; a missing annotation is not an error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationClearer {
    #[serde(default)]
    pub key: String,
}

impl Filter for AnnotationClearer {
    fn filter<'a>(&self, node: &'a mut Value) -> Result<Option<&'a mut Value>, FilterError> {
        pipe(
            node,
            &[
                &PathGetter::new(&ANNOTATIONS_PATH),
                &FieldClearer::new(self.key.as_str()),
            ],
        )
    }
}

pub fn set_annotation(key: impl Into<String>, value: impl Into<String>) -> AnnotationSetter {
    AnnotationSetter {
        key: key.into(),
        value: value.into(),
    }
}

pub fn get_annotation(key: impl Into<String>) -> AnnotationGetter {
    AnnotationGetter {
        key: key.into(),
        value: String::new(),
    }
}

pub fn clear_annotation(key: impl Into<String>) -> AnnotationClearer {
    AnnotationClearer { key: key.into() }
}

/// Drop `metadata.annotations` when it is empty or null.
///
/// A `metadata` mapping left empty by the removal is dropped as well.
pub fn clear_empty_annotations(node: &mut Value) -> Result<(), FilterError> {
    let Some(metadata) = PathGetter::new(&["metadata"]).filter(node)? else {
        return Ok(());
    };
    let empty = match field_mut(metadata, "annotations").map(|a| untag(a)) {
        Some(Value::Mapping(map)) => map.is_empty(),
        Some(Value::Null) => true,
        _ => false,
    };
    if !empty {
        return Ok(());
    }
    FieldClearer::new("annotations").filter(metadata)?;
    if matches!(untag(metadata), Value::Mapping(map) if map.is_empty()) {
        FieldClearer::new("metadata").filter(node)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::RNode;

    fn doc(text: &str) -> RNode {
        match RNode::parse(text) {
            Ok(node) => node,
            Err(e) => panic!("fixture should parse: {e}"),
        }
    }

    #[test]
    fn test_setter_creates_annotations() {
        let mut node = doc("kind: Service\n");
        assert!(node.pipe(&[&set_annotation("a", "b")]).is_ok());
        assert_eq!(node.get_annotation("a"), Some("b".to_string()));
    }

    #[test]
    fn test_setter_overwrites_in_place() {
        let mut node = doc("metadata:\n  annotations:\n    a: b\n    c: d\n");
        assert!(node.pipe(&[&set_annotation("a", "z")]).is_ok());
        let keys: Vec<_> = node.annotations().into_iter().collect();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), "z".to_string()),
                ("c".to_string(), "d".to_string())
            ]
        );
    }

    #[test]
    fn test_getter_with_and_without_expected_value() {
        let mut node = doc("metadata:\n  annotations:\n    a: b\n");
        assert!(matches!(node.pipe(&[&get_annotation("a")]), Ok(Some(v)) if *v == Value::from("b")));
        assert!(matches!(node.pipe(&[&get_annotation("x")]), Ok(None)));

        let exact = AnnotationGetter {
            key: "a".to_string(),
            value: "b".to_string(),
        };
        assert!(matches!(node.pipe(&[&exact]), Ok(Some(_))));

        let mismatch = AnnotationGetter {
            key: "a".to_string(),
            value: "bb".to_string(),
        };
        assert!(matches!(node.pipe(&[&mismatch]), Ok(None)));
    }

    #[test]
    fn test_getter_without_metadata() {
        let mut node = doc("a: 1\n");
        assert!(matches!(node.pipe(&[&get_annotation("a")]), Ok(None)));
    }

    #[test]
    fn test_clearer_is_noop_when_missing() {
        let mut node = doc("a: 1\n");
        assert!(matches!(node.pipe(&[&clear_annotation("a")]), Ok(None)));
        assert_eq!(node, doc("a: 1\n"));
    }

    #[test]
    fn test_empty_cleanup_drops_emptied_metadata() {
        let mut node = doc("a: 1\n");
        assert!(node.pipe(&[&set_annotation("x", "y")]).is_ok());
        assert!(node.pipe(&[&clear_annotation("x")]).is_ok());
        assert!(clear_empty_annotations(node.value_mut()).is_ok());
        assert_eq!(node, doc("a: 1\n"));

        let mut kept = doc("metadata: {}\n");
        assert!(clear_empty_annotations(kept.value_mut()).is_ok());
        assert_eq!(kept, doc("metadata: {}\n"));
    }

    #[test]
    fn test_clearer_and_empty_cleanup() {
        let mut node = doc("metadata:\n  name: x\n  annotations:\n    a: b\n");
        assert!(node.pipe(&[&clear_annotation("a")]).is_ok());
        assert!(node.get_annotation("a").is_none());
        assert!(clear_empty_annotations(node.value_mut()).is_ok());
        assert_eq!(node, doc("metadata:\n  name: x\n"));
    }
}
