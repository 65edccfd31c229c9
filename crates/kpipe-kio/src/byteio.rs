//! Multi-document byte streams
//!
//! Streams are split on `\n---\n` before decoding so every document is
//! decoded on its own. A `ResourceList` (or `List`) envelope is unwrapped on
//! read and can be rebuilt on write.

use crate::annotations::{sort_nodes, INDEX_ANNOTATION, READER_ANNOTATIONS};
use crate::errors::KioError;
use crate::pipeline::{Reader, Writer};
use kpipe_yaml::node::{encode, field, is_null, scalar_text};
use kpipe_yaml::{clear_annotation, clear_empty_annotations, set_annotation, Filter};
use kpipe_yaml::{Mapping, RNode, Style, Value};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use tracing::debug;

pub const RESOURCE_LIST_KIND: &str = "ResourceList";
pub const RESOURCE_LIST_API_VERSION: &str = "kyaml.kustomize.dev/v1alpha1";
pub const LIST_KIND: &str = "List";
const LIST_API_VERSION: &str = "v1";

const DOCUMENT_SEPARATOR: &str = "\n---\n";

/// Decode the first document of a segment; `None` for empty or null input
fn decode_segment(segment: &str) -> Result<Option<Value>, KioError> {
    let Some(document) = serde_yaml::Deserializer::from_str(segment).next() else {
        return Ok(None);
    };
    let value = Value::deserialize(document)?;
    Ok((!is_null(&value)).then_some(value))
}

fn envelope_kind(value: &Value) -> Option<String> {
    let kind = field(value, "kind").and_then(scalar_text)?;
    let is_list = kind == RESOURCE_LIST_KIND || kind == LIST_KIND;
    (is_list && field(value, "items").is_some()).then_some(kind)
}

/// Reads documents from a byte stream.
///
/// After [`Reader::read`] the envelope metadata of the stream, if it was
/// wrapped, is available in `wrapping_kind`, `wrapping_api_version` and
/// `function_config`.
#[derive(Debug, Default)]
pub struct ByteReader<R> {
    pub reader: R,

    /// Do not stamp the index annotation
    pub omit_reader_annotations: bool,

    /// Extra annotations applied to every document
    pub set_annotations: BTreeMap<String, String>,

    pub function_config: Option<Value>,
    pub wrapping_kind: Option<String>,
    pub wrapping_api_version: Option<String>,
}

impl<R: Read> ByteReader<R> {
    pub fn new(reader: R) -> Self {
        ByteReader {
            reader,
            omit_reader_annotations: false,
            set_annotations: BTreeMap::new(),
            function_config: None,
            wrapping_kind: None,
            wrapping_api_version: None,
        }
    }

    /// Unwrap an envelope, recording its metadata. Returns the items.
    fn unwrap_envelope(&mut self, kind: String, mut value: Value) -> Result<Vec<Value>, KioError> {
        self.wrapping_api_version = field(&value, "apiVersion").and_then(scalar_text);
        self.wrapping_kind = Some(kind);
        let Value::Mapping(map) = &mut value else {
            return Ok(Vec::new());
        };
        if let Some(config) = map.shift_remove("functionConfig") {
            self.function_config = Some(config);
        }
        match map.shift_remove("items") {
            Some(Value::Sequence(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(kpipe_yaml::FilterError::InvalidNodeKind {
                expected: "sequence",
                actual: kpipe_yaml::node::kind_name(&other),
            }
            .into()),
        }
    }

    fn annotate(&self, value: &mut Value, index: usize) -> Result<(), KioError> {
        let mut annotations = self.set_annotations.clone();
        if !self.omit_reader_annotations {
            annotations.insert(INDEX_ANNOTATION.to_string(), index.to_string());
        }
        for (key, annotation) in annotations {
            set_annotation(key, annotation).filter(value)?;
        }
        Ok(())
    }
}

impl<R: Read> Reader for ByteReader<R> {
    fn read(&mut self) -> Result<Vec<RNode>, KioError> {
        let mut input = String::new();
        self.reader.read_to_string(&mut input)?;

        let mut values = Vec::new();
        for segment in input.split(DOCUMENT_SEPARATOR) {
            let Some(value) = decode_segment(segment)? else {
                continue;
            };
            match envelope_kind(&value) {
                Some(kind) => {
                    let items = self.unwrap_envelope(kind, value)?;
                    debug!("Unwrapped {} items from envelope", items.len());
                    values.extend(items);
                }
                None => values.push(value),
            }
        }

        let mut nodes = Vec::with_capacity(values.len());
        for (index, mut value) in values.into_iter().enumerate() {
            self.annotate(&mut value, index)?;
            nodes.push(RNode::new(value));
        }
        Ok(nodes)
    }
}

/// Writes documents to a byte stream
#[derive(Debug, Default)]
pub struct ByteWriter<W> {
    pub writer: W,

    /// Keep index, path and package annotations in the output
    pub keep_reader_annotations: bool,

    /// Annotations removed from every document before writing
    pub clear_annotations: Vec<String>,

    /// Output style; falls back to each node's own style, then block
    pub style: Option<Style>,

    pub function_config: Option<Value>,

    /// When set, documents are written as the `items` of one envelope
    pub wrapping_kind: Option<String>,
    pub wrapping_api_version: Option<String>,

    /// Sort by path and index annotations before writing
    pub sort: bool,
}

impl<W: Write> ByteWriter<W> {
    pub fn new(writer: W) -> Self {
        ByteWriter {
            writer,
            keep_reader_annotations: false,
            clear_annotations: Vec::new(),
            style: None,
            function_config: None,
            wrapping_kind: None,
            wrapping_api_version: None,
            sort: false,
        }
    }

    fn clean(&self, value: &mut Value) -> Result<(), KioError> {
        if !self.keep_reader_annotations {
            for key in READER_ANNOTATIONS {
                clear_annotation(key).filter(value)?;
            }
        }
        for key in &self.clear_annotations {
            clear_annotation(key.as_str()).filter(value)?;
        }
        clear_empty_annotations(value)?;
        Ok(())
    }

    fn envelope(&self, kind: &str, items: Vec<Value>) -> Value {
        let api_version = match (&self.wrapping_api_version, kind) {
            (Some(api_version), _) => api_version.clone(),
            (None, LIST_KIND) => LIST_API_VERSION.to_string(),
            (None, _) => RESOURCE_LIST_API_VERSION.to_string(),
        };
        let mut map = Mapping::new();
        map.insert(Value::from("apiVersion"), Value::from(api_version));
        map.insert(Value::from("kind"), Value::from(kind));
        map.insert(Value::from("items"), Value::Sequence(items));
        if let Some(config) = &self.function_config {
            map.insert(Value::from("functionConfig"), config.clone());
        }
        Value::Mapping(map)
    }
}

impl<W: Write> Writer for ByteWriter<W> {
    fn write(&mut self, mut nodes: Vec<RNode>) -> Result<(), KioError> {
        if self.sort {
            sort_nodes(&mut nodes)?;
        }
        for node in &mut nodes {
            self.clean(node.value_mut())?;
        }

        if let Some(kind) = &self.wrapping_kind {
            let style = self.style.unwrap_or_default();
            let items = nodes.into_iter().map(RNode::into_value).collect();
            let text = encode(&self.envelope(kind, items), style)?;
            self.writer.write_all(text.as_bytes())?;
            self.writer.flush()?;
            return Ok(());
        }

        for (i, node) in nodes.iter().enumerate() {
            if i > 0 {
                self.writer.write_all(b"---\n")?;
            }
            let style = self.style.or(node.style()).unwrap_or_default();
            let text = encode(node.value(), style)?;
            self.writer.write_all(text.as_bytes())?;
        }
        // Buffered sinks report late write failures only here
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads from one stream and writes to another, re-wrapping the output in
/// the envelope the input came in
#[derive(Debug, Default)]
pub struct ByteReadWriter<R, W> {
    pub reader: R,
    pub writer: W,
    pub omit_reader_annotations: bool,
    pub keep_reader_annotations: bool,
    pub style: Option<Style>,

    /// Write plain documents even if the input was wrapped
    pub no_wrap: bool,

    pub function_config: Option<Value>,
    pub wrapping_kind: Option<String>,
    pub wrapping_api_version: Option<String>,
}

impl<R: Read, W: Write> ByteReadWriter<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        ByteReadWriter {
            reader,
            writer,
            omit_reader_annotations: false,
            keep_reader_annotations: false,
            style: None,
            no_wrap: false,
            function_config: None,
            wrapping_kind: None,
            wrapping_api_version: None,
        }
    }
}

impl<R: Read, W: Write> Reader for ByteReadWriter<R, W> {
    fn read(&mut self) -> Result<Vec<RNode>, KioError> {
        let mut reader = ByteReader::new(&mut self.reader);
        reader.omit_reader_annotations = self.omit_reader_annotations;
        let nodes = reader.read()?;
        self.function_config = reader.function_config;
        self.wrapping_kind = reader.wrapping_kind;
        self.wrapping_api_version = reader.wrapping_api_version;
        Ok(nodes)
    }
}

impl<R: Read, W: Write> Writer for ByteReadWriter<R, W> {
    fn write(&mut self, nodes: Vec<RNode>) -> Result<(), KioError> {
        let mut writer = ByteWriter::new(&mut self.writer);
        writer.keep_reader_annotations = self.keep_reader_annotations;
        writer.style = self.style;
        if !self.no_wrap {
            writer.function_config = self.function_config.clone();
            writer.wrapping_kind = self.wrapping_kind.clone();
            writer.wrapping_api_version = self.wrapping_api_version.clone();
        }
        writer.write(nodes)
    }
}
