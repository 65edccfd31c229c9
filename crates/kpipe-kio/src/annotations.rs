//! Provenance annotations stamped on documents by the readers

use crate::errors::KioError;
use kpipe_yaml::RNode;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Position of the document within the stream it was read from
pub const INDEX_ANNOTATION: &str = "kyaml.kustomize.dev/kio/index";

/// File the document was read from, relative to the package root
pub const PATH_ANNOTATION: &str = "kyaml.kustomize.dev/kio/path";

/// Directory of that file, relative to the package root
pub const PACKAGE_ANNOTATION: &str = "kyaml.kustomize.dev/kio/package";

/// Annotations owned by the readers and stripped by the writers
pub const READER_ANNOTATIONS: [&str; 3] = [INDEX_ANNOTATION, PATH_ANNOTATION, PACKAGE_ANNOTATION];

/// Path and index annotations of a node, if present
pub fn get_file_annotations(node: &RNode) -> (Option<String>, Option<String>) {
    (
        node.get_annotation(PATH_ANNOTATION),
        node.get_annotation(INDEX_ANNOTATION),
    )
}

/// Numeric value of the index annotation
pub fn get_index(node: &RNode) -> Result<Option<usize>, KioError> {
    let Some(value) = node.get_annotation(INDEX_ANNOTATION) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| KioError::InvalidIndex { value })
}

/// Fail unless every node carries all of `annotations`
pub fn error_if_missing_annotation(nodes: &[RNode], annotations: &[&str]) -> Result<(), KioError> {
    for node in nodes {
        for key in annotations {
            if node.get_annotation(key).is_none() {
                return Err(KioError::MissingAnnotation {
                    annotation: (*key).to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Distinct path annotations of `nodes`; nodes without one are skipped
pub fn path_set(nodes: &[RNode]) -> BTreeSet<String> {
    nodes
        .iter()
        .filter_map(|node| node.get_annotation(PATH_ANNOTATION))
        .collect()
}

/// Stable sort by path annotation, then by numeric index annotation.
///
/// Nodes without annotations sort first. An index that is not a number is an
/// error.
pub fn sort_nodes(nodes: &mut Vec<RNode>) -> Result<(), KioError> {
    let mut keyed = Vec::with_capacity(nodes.len());
    for node in nodes.drain(..) {
        let path = node.get_annotation(PATH_ANNOTATION);
        let index = get_index(&node)?;
        keyed.push((path, index, node));
    }
    keyed.sort_by(|a, b| match a.0.cmp(&b.0) {
        Ordering::Equal => a.1.cmp(&b.1),
        other => other,
    });
    nodes.extend(keyed.into_iter().map(|(_, _, node)| node));
    Ok(())
}
