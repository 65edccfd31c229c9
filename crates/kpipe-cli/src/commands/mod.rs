pub mod cat;
pub mod config;
pub mod grep;
pub mod init;
pub mod run;

use kpipe_kio::byteio::RESOURCE_LIST_KIND;
use kpipe_kio::{ByteWriter, KioError, Writer};
use kpipe_yaml::{RNode, Style};
use std::io::Write;

/// How documents are printed by the stream commands
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub wrap: bool,
    pub keep_annotations: bool,
    pub flow: bool,
}

/// Write documents as a stream to `out`
pub fn write_stream<W: Write>(
    out: W,
    nodes: Vec<RNode>,
    options: OutputOptions,
) -> Result<(), KioError> {
    let mut writer = ByteWriter::new(out);
    writer.keep_reader_annotations = options.keep_annotations;
    writer.style = options.flow.then_some(Style::Flow);
    if options.wrap {
        writer.wrapping_kind = Some(RESOURCE_LIST_KIND.to_string());
    }
    writer.write(nodes)
}
