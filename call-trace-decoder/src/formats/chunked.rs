//! Chunk-container source
//!
//! The native trace container: a two-byte magic followed by frames of
//! zlib-compressed data. Chunks are decompressed one at a time, so only the
//! current chunk lives in memory and `current_offset` can name a position as
//! (chunk, offset-in-chunk) - the coordinates the decoder keys its signature
//! deduplication on.
//!
//! Frame layout (little-endian):
//!
//! | Field             | Size | |
//! |-------------------|------|---|
//! | compressed_size   | 4    | size of the zlib payload |
//! | uncompressed_size | 4    | size after inflation, used to bound the decode |
//! | payload           | N    | zlib stream |

use std::io::{self, Read, Seek};

use binrw::BinRead;
use zune_inflate::{DeflateDecoder, DeflateOptions};

use super::{Offset, TraceFile};

/// Magic bytes opening a chunk-container trace file
pub const CHUNKED_MAGIC: [u8; 2] = *b"ct";

#[derive(Debug, BinRead)]
#[br(little)]
struct ChunkFrame {
    compressed_size: u32,
    uncompressed_size: u32,
    #[br(count = compressed_size)]
    data: Vec<u8>,
}

pub struct ChunkedFile<R> {
    reader: R,
    /// Decompressed data of the current chunk
    chunk: Vec<u8>,
    pos: usize,
    /// File position of the frame the current chunk came from
    chunk_offset: u64,
    /// File position of the next frame to read
    next_chunk_offset: u64,
    done: bool,
}

impl<R: Read + Seek> ChunkedFile<R> {
    /// Verify the container magic and position the source at the first
    /// chunk. The reader is expected at the start of the file.
    pub fn from_reader(mut reader: R) -> io::Result<Self> {
        let mut magic = [0u8; 2];
        reader.read_exact(&mut magic)?;
        if magic != CHUNKED_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a chunked trace container",
            ));
        }

        let start = CHUNKED_MAGIC.len() as u64;
        Ok(Self {
            reader,
            chunk: Vec::new(),
            pos: 0,
            chunk_offset: start,
            next_chunk_offset: start,
            done: false,
        })
    }

    /// Load the next non-empty chunk. Returns false once the container is
    /// exhausted; a truncated frame or corrupt payload also ends the stream,
    /// since the wire protocol recovers at event boundaries.
    fn refill(&mut self) -> bool {
        while !self.done {
            let frame = match ChunkFrame::read(&mut self.reader) {
                Ok(frame) => frame,
                Err(e) => {
                    if !e.is_eof() {
                        log::warn!("bad chunk frame, ending stream: {}", e);
                    }
                    self.done = true;
                    return false;
                }
            };

            self.chunk_offset = self.next_chunk_offset;
            self.next_chunk_offset += 8 + frame.data.len() as u64;

            let options = DeflateOptions::default()
                .set_limit(frame.uncompressed_size as usize)
                .set_size_hint(frame.uncompressed_size as usize);
            let mut decoder = DeflateDecoder::new_with_options(&frame.data, options);
            match decoder.decode_zlib() {
                Ok(data) => {
                    if data.len() != frame.uncompressed_size as usize {
                        log::warn!(
                            "chunk at {} inflated to {} bytes, header says {}",
                            self.chunk_offset,
                            data.len(),
                            frame.uncompressed_size
                        );
                    }
                    if data.is_empty() {
                        continue;
                    }
                    self.chunk = data;
                    self.pos = 0;
                    return true;
                }
                Err(e) => {
                    log::error!("corrupt chunk at {}: {:?}", self.chunk_offset, e);
                    self.done = true;
                    return false;
                }
            }
        }
        false
    }
}

impl<R: Read + Seek> TraceFile for ChunkedFile<R> {
    fn get_byte(&mut self) -> Option<u8> {
        if self.pos >= self.chunk.len() && !self.refill() {
            return None;
        }
        let byte = self.chunk[self.pos];
        self.pos += 1;
        Some(byte)
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mut filled = 0;
        while filled < buf.len() {
            if self.pos >= self.chunk.len() && !self.refill() {
                break;
            }
            let n = (buf.len() - filled).min(self.chunk.len() - self.pos);
            buf[filled..filled + n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }
        filled
    }

    fn current_offset(&self) -> Offset {
        Offset {
            chunk: self.chunk_offset,
            offset: self.pos as u64,
        }
    }
}
