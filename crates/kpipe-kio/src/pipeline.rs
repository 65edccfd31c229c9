//! Node-list pipelines
//!
//! A [`Pipeline`] reads every document from a [`Reader`], runs the documents
//! through a chain of [`NodesFilter`]s and hands the result to a [`Writer`].

use crate::errors::KioError;
use kpipe_yaml::{Filter, RNode};
use std::fmt::Debug;
use tracing::debug;

/// Source of documents
pub trait Reader {
    fn read(&mut self) -> Result<Vec<RNode>, KioError>;
}

/// Sink for documents
pub trait Writer {
    fn write(&mut self, nodes: Vec<RNode>) -> Result<(), KioError>;
}

/// Transformation over a whole document list
pub trait NodesFilter: Debug {
    fn filter(&self, nodes: Vec<RNode>) -> Result<Vec<RNode>, KioError>;
}

/// Runs a document pipeline on every node and keeps all of them.
///
/// A "no match" from the pipeline only means the node was left unchanged.
#[derive(Debug, Default)]
pub struct FilterAll {
    pub filters: Vec<Box<dyn Filter>>,
}

impl FilterAll {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        FilterAll { filters }
    }
}

impl NodesFilter for FilterAll {
    fn filter(&self, mut nodes: Vec<RNode>) -> Result<Vec<RNode>, KioError> {
        for node in &mut nodes {
            node.pipe_all(&self.filters)?;
        }
        Ok(nodes)
    }
}

/// Keeps the nodes for which the pipeline yields a node, or with `invert`
/// the nodes for which it does not
#[derive(Debug, Default)]
pub struct MatchFilter {
    pub filters: Vec<Box<dyn Filter>>,
    pub invert: bool,
}

impl MatchFilter {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        MatchFilter {
            filters,
            invert: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = !self.invert;
        self
    }
}

impl NodesFilter for MatchFilter {
    fn filter(&self, nodes: Vec<RNode>) -> Result<Vec<RNode>, KioError> {
        let mut kept = Vec::with_capacity(nodes.len());
        for mut node in nodes {
            let matched = node.pipe_all(&self.filters)?.is_some();
            if matched != self.invert {
                kept.push(node);
            }
        }
        Ok(kept)
    }
}

/// Ordered chain of node-list filters
#[derive(Debug, Default)]
pub struct Pipeline {
    pub filters: Vec<Box<dyn NodesFilter>>,
}

impl Pipeline {
    pub fn new(filters: Vec<Box<dyn NodesFilter>>) -> Self {
        Pipeline { filters }
    }

    /// Run every filter in order over `nodes`
    pub fn apply(&self, nodes: Vec<RNode>) -> Result<Vec<RNode>, KioError> {
        self.filters
            .iter()
            .try_fold(nodes, |nodes, filter| filter.filter(nodes))
    }

    /// Read, filter, then write
    pub fn execute(&self, reader: &mut dyn Reader, writer: &mut dyn Writer) -> Result<(), KioError> {
        let nodes = reader.read()?;
        debug!("Pipeline read {} documents", nodes.len());
        let nodes = self.apply(nodes)?;
        debug!("Pipeline writing {} documents", nodes.len());
        writer.write(nodes)
    }

    /// Read from and write back to the same read-writer
    pub fn execute_in_place<RW>(&self, read_writer: &mut RW) -> Result<(), KioError>
    where
        RW: Reader + Writer,
    {
        let nodes = read_writer.read()?;
        let nodes = self.apply(nodes)?;
        read_writer.write(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkgio::PackageBuffer;
    use kpipe_yaml::{get_annotation, set_annotation, AnnotationGetter};

    fn doc(text: &str) -> RNode {
        match RNode::parse(text) {
            Ok(node) => node,
            Err(e) => panic!("fixture should parse: {e}"),
        }
    }

    fn team(name: &str) -> RNode {
        doc(&format!("kind: Pod\nmetadata:\n  annotations:\n    team: {name}\n"))
    }

    #[test]
    fn test_filter_all_keeps_every_node() {
        let filter = FilterAll::new(vec![Box::new(set_annotation("seen", "yes"))]);
        let Ok(nodes) = filter.filter(vec![team("a"), doc("kind: Pod\n")]) else {
            panic!("filter should succeed");
        };
        assert_eq!(nodes.len(), 2);
        assert!(nodes
            .iter()
            .all(|n| n.get_annotation("seen").as_deref() == Some("yes")));
    }

    #[test]
    fn test_filter_all_tolerates_no_match() {
        let filter = FilterAll::new(vec![Box::new(get_annotation("missing"))]);
        let result = filter.filter(vec![team("a")]);
        assert!(result.is_ok_and(|nodes| nodes == vec![team("a")]));
    }

    #[test]
    fn test_match_filter_and_invert() {
        let exact = AnnotationGetter {
            key: "team".to_string(),
            value: "blue".to_string(),
        };
        let matcher = MatchFilter::new(vec![Box::new(exact.clone())]);
        let result = matcher.filter(vec![team("blue"), team("red"), team("blue")]);
        assert!(result.is_ok_and(|nodes| nodes == vec![team("blue"), team("blue")]));

        let inverted = MatchFilter::new(vec![Box::new(exact)]).inverted();
        let result = inverted.filter(vec![team("blue"), team("red")]);
        assert!(result.is_ok_and(|nodes| nodes == vec![team("red")]));
    }

    #[test]
    fn test_execute_in_place_on_buffer() {
        let mut buffer = PackageBuffer::new(vec![team("blue"), team("red")]);
        let pipeline = Pipeline::new(vec![
            Box::new(MatchFilter::new(vec![Box::new(AnnotationGetter {
                key: "team".to_string(),
                value: "red".to_string(),
            })])),
            Box::new(FilterAll::new(vec![Box::new(set_annotation("x", "1"))])),
        ]);
        assert!(pipeline.execute_in_place(&mut buffer).is_ok());
        assert_eq!(buffer.nodes.len(), 1);
        assert_eq!(buffer.nodes[0].get_annotation("team"), Some("red".to_string()));
        assert_eq!(buffer.nodes[0].get_annotation("x"), Some("1".to_string()));
    }

    #[test]
    fn test_execute_stops_on_filter_error() {
        let mut input = PackageBuffer::new(vec![doc("- a\n- b\n")]);
        let mut output = PackageBuffer::default();
        let pipeline = Pipeline::new(vec![Box::new(FilterAll::new(vec![Box::new(
            set_annotation("a", "b"),
        )]))]);
        assert!(pipeline.execute(&mut input, &mut output).is_err());
        assert!(output.nodes.is_empty());
    }
}
