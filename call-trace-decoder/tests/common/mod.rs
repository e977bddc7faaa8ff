//! Shared helpers for integration tests: a little trace writer that speaks
//! the wire format, plus minimal zlib/gzip encoders (stored deflate blocks
//! only) so compressed-container tests don't need a compressor dependency.

#![allow(dead_code)]

use call_trace_decoder::{formats::CHUNKED_MAGIC, wire, Decoder, RawFile};

pub fn encode_uint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

/// Builds trace streams byte by byte. Signature payloads are written only
/// where a test asks for them, mirroring a writer that inlines each
/// signature on its first emission.
pub struct TraceWriter {
    buf: Vec<u8>,
}

impl TraceWriter {
    pub fn new(version: u64) -> Self {
        let mut writer = Self { buf: Vec::new() };
        writer.uint(version);
        writer
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn uint(&mut self, value: u64) {
        self.buf.extend_from_slice(&encode_uint(value));
    }

    pub fn string(&mut self, bytes: &[u8]) {
        self.uint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    // === Events ===

    pub fn enter(&mut self, fid: u64) {
        self.byte(wire::EVENT_ENTER);
        self.uint(fid);
    }

    pub fn enter_with_sig(&mut self, fid: u64, name: &str, args: &[&str]) {
        self.enter(fid);
        self.string(name.as_bytes());
        self.uint(args.len() as u64);
        for arg in args {
            self.string(arg.as_bytes());
        }
    }

    pub fn leave(&mut self, call_no: u64) {
        self.byte(wire::EVENT_LEAVE);
        self.uint(call_no);
    }

    // === Call details ===

    pub fn call_end(&mut self) {
        self.byte(wire::CALL_END);
    }

    pub fn arg(&mut self, index: u64) {
        self.byte(wire::CALL_ARG);
        self.uint(index);
    }

    pub fn ret(&mut self) {
        self.byte(wire::CALL_RET);
    }

    // === Values ===

    pub fn value_null(&mut self) {
        self.byte(wire::TYPE_NULL);
    }

    pub fn value_bool(&mut self, value: bool) {
        self.byte(if value { wire::TYPE_TRUE } else { wire::TYPE_FALSE });
    }

    /// The wire stores the magnitude; the tag implies the sign, so only
    /// non-positive values are representable here.
    pub fn value_sint(&mut self, value: i64) {
        assert!(value <= 0, "positive values go on the wire as UINT");
        self.byte(wire::TYPE_SINT);
        self.uint(value.unsigned_abs());
    }

    pub fn value_uint(&mut self, value: u64) {
        self.byte(wire::TYPE_UINT);
        self.uint(value);
    }

    pub fn value_float(&mut self, value: f32) {
        self.byte(wire::TYPE_FLOAT);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn value_double(&mut self, value: f64) {
        self.byte(wire::TYPE_DOUBLE);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn value_string(&mut self, bytes: &[u8]) {
        self.byte(wire::TYPE_STRING);
        self.string(bytes);
    }

    pub fn value_blob(&mut self, data: &[u8]) {
        self.byte(wire::TYPE_BLOB);
        self.uint(data.len() as u64);
        self.buf.extend_from_slice(data);
    }

    pub fn value_pointer(&mut self, addr: u64) {
        self.byte(wire::TYPE_OPAQUE);
        self.uint(addr);
    }

    /// Array header; the caller writes `len` values after it
    pub fn value_array(&mut self, len: u64) {
        self.byte(wire::TYPE_ARRAY);
        self.uint(len);
    }

    /// Enum with its inline signature; the caller writes the nested nominal
    /// value after it
    pub fn value_enum_with_sig(&mut self, id: u64, name: &str) {
        self.byte(wire::TYPE_ENUM);
        self.uint(id);
        self.string(name.as_bytes());
    }

    pub fn value_enum(&mut self, id: u64) {
        self.byte(wire::TYPE_ENUM);
        self.uint(id);
    }

    pub fn value_bitmask_with_sig(&mut self, id: u64, flags: &[(&str, u64)], mask: u64) {
        self.byte(wire::TYPE_BITMASK);
        self.uint(id);
        self.uint(flags.len() as u64);
        for (name, value) in flags {
            self.string(name.as_bytes());
            self.uint(*value);
        }
        self.uint(mask);
    }

    pub fn value_bitmask(&mut self, id: u64, mask: u64) {
        self.byte(wire::TYPE_BITMASK);
        self.uint(id);
        self.uint(mask);
    }

    /// Struct with its inline signature; the caller writes one value per
    /// member after it
    pub fn value_struct_with_sig(&mut self, id: u64, name: &str, members: &[&str]) {
        self.byte(wire::TYPE_STRUCT);
        self.uint(id);
        self.string(name.as_bytes());
        self.uint(members.len() as u64);
        for member in members {
            self.string(member.as_bytes());
        }
    }

    pub fn value_struct(&mut self, id: u64) {
        self.byte(wire::TYPE_STRUCT);
        self.uint(id);
    }
}

/// Decoder over an in-memory byte stream
pub fn decoder_over(bytes: Vec<u8>) -> Decoder {
    Decoder::from_file(Box::new(RawFile::from_bytes(bytes))).expect("open in-memory trace")
}

// === Minimal compressed-stream encoders ===
//
// Stored (uncompressed) deflate blocks are enough for the decoder side and
// keep the tests free of a compressor dependency.

fn deflate_stored(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    if data.is_empty() {
        // single final stored block of length zero
        out.extend_from_slice(&[0x01, 0x00, 0x00, 0xff, 0xff]);
        return out;
    }
    let mut blocks = data.chunks(0xffff).peekable();
    while let Some(block) = blocks.next() {
        let bfinal = if blocks.peek().is_none() { 0x01 } else { 0x00 };
        out.push(bfinal);
        let len = block.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(block);
    }
    out
}

fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for &byte in data {
        a = (a + u32::from(byte)) % 65521;
        b = (b + a) % 65521;
    }
    (b << 16) | a
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    !crc
}

/// Wrap raw bytes in a zlib stream (stored blocks, real adler32)
pub fn zlib_stored(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x78, 0x01];
    out.extend_from_slice(&deflate_stored(data));
    out.extend_from_slice(&adler32(data).to_be_bytes());
    out
}

/// Wrap raw bytes in a gzip stream (stored blocks, real crc32)
pub fn gzip_stored(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff];
    out.extend_from_slice(&deflate_stored(data));
    out.extend_from_slice(&crc32(data).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out
}

/// Wrap pre-split trace bytes in the chunk-container format, one frame per
/// input slice
pub fn chunked_container(chunks: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&CHUNKED_MAGIC);
    for chunk in chunks {
        let compressed = zlib_stored(chunk);
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&compressed);
    }
    out
}
