//! kpipe document I/O
//!
//! Readers produce `Vec<RNode>` from a byte stream ([`ByteReader`]) or a
//! directory package ([`LocalPackageReader`]); writers put them back
//! ([`ByteWriter`], [`LocalPackageWriter`]). [`LocalPackageReadWriter`]
//! pairs the two on one directory and removes files left without documents.
//!
//! Documents carry their provenance in annotations (see [`annotations`]) so
//! that a writer can route each one back to the file and position it came
//! from.

pub mod annotations;
pub mod byteio;
pub mod errors;
pub mod pipeline;
pub mod pkgio;

pub use byteio::{ByteReadWriter, ByteReader, ByteWriter};
pub use errors::KioError;
pub use pipeline::{FilterAll, MatchFilter, NodesFilter, Pipeline, Reader, Writer};
pub use pkgio::{LocalPackageReadWriter, LocalPackageReader, LocalPackageWriter, PackageBuffer};
