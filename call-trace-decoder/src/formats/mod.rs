//! Trace file byte sources
//!
//! The decoder consumes a byte-oriented stream through the [`TraceFile`]
//! trait; the concrete source decides how bytes come off disk. Three sources
//! are supported, detected by magic bytes:
//!
//! - [`ChunkedFile`] - the chunk-container format: zlib-compressed chunks
//!   behind a `b"ct"` magic, decompressed one chunk at a time
//! - [`GzipFile`] - a whole-stream gzip file
//! - [`RawFile`] - uncompressed passthrough (and the in-memory source used
//!   throughout the tests)

mod chunked;
mod gzip;
mod raw;

pub use chunked::{ChunkedFile, CHUNKED_MAGIC};
pub use gzip::GzipFile;
pub use raw::RawFile;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Position in the trace byte stream. `chunk` identifies the container chunk
/// in the underlying file and `offset` the position inside its decompressed
/// data; whole-buffer sources report chunk 0. Offsets are only compared for
/// equality - the decoder uses them as keys to deduplicate inline signature
/// emissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Offset {
    pub chunk: u64,
    pub offset: u64,
}

/// Byte-oriented source the decoder reads a trace from.
///
/// End of stream is reachable at any read; the decoder treats it as a
/// terminator only at event boundaries and as truncation elsewhere. Sources
/// that hit an underlying I/O or decompression error report it as end of
/// stream after logging - the wire format is recovered at event boundaries,
/// not mid-value. Releasing the source is `Drop`.
pub trait TraceFile {
    /// Next byte, or `None` at end of stream.
    fn get_byte(&mut self) -> Option<u8>;

    /// Fill `buf` as far as possible, returning the number of bytes read.
    /// Anything short of `buf.len()` means the stream ended.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Stable identifier for the current read position.
    fn current_offset(&self) -> Offset;
}

/// Open a trace file, choosing the byte source by magic bytes.
pub fn open_trace_file(path: &Path) -> io::Result<Box<dyn TraceFile>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let head = reader.fill_buf()?;

    if head.starts_with(&gzip::GZIP_MAGIC) {
        log::debug!("detected gzip trace: {:?}", path);
        Ok(Box::new(GzipFile::from_reader(reader)?))
    } else if head.starts_with(&CHUNKED_MAGIC) {
        log::debug!("detected chunked trace: {:?}", path);
        Ok(Box::new(ChunkedFile::from_reader(reader)?))
    } else {
        log::debug!("no compression magic, reading raw: {:?}", path);
        Ok(Box::new(RawFile::new(reader)))
    }
}
