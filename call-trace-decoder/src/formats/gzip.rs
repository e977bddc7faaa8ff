//! Whole-stream gzip source
//!
//! Gzip traces carry no chunk framing, so the stream is decompressed up
//! front and served from memory.

use std::io::{self, Read};

use zune_inflate::DeflateDecoder;

use super::{Offset, TraceFile};

pub(super) const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub struct GzipFile {
    data: Vec<u8>,
    pos: usize,
}

impl GzipFile {
    /// Read and decompress the whole stream. Fails on a corrupt gzip
    /// payload; the source is not retained.
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut compressed = Vec::new();
        reader.read_to_end(&mut compressed)?;

        let mut decoder = DeflateDecoder::new(&compressed);
        let data = decoder.decode_gzip().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("bad gzip stream: {:?}", e))
        })?;

        Ok(Self { data, pos: 0 })
    }
}

impl TraceFile for GzipFile {
    fn get_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    fn current_offset(&self) -> Offset {
        Offset {
            chunk: 0,
            offset: self.pos as u64,
        }
    }
}
