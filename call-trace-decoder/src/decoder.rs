//! Main decoder API
//!
//! This module drives the whole pipeline: bytes come out of a
//! [`TraceFile`], primitive decoders turn them into varuints, strings and
//! floats, the value decoder builds tagged value trees (interning signatures
//! on the way), and the event demultiplexer reassembles interleaved
//! ENTER/LEAVE events into complete [`Call`]s.
//!
//! The decoder is strictly single-threaded and non-reentrant: one consumer
//! drives [`Decoder::next_call`] to completion. Parse several traces
//! concurrently by creating one decoder per trace.

use std::path::Path;
use std::rc::Rc;

use crate::config::DecoderConfig;
use crate::formats::{open_trace_file, Offset, TraceFile};
use crate::sigtable::SigTable;
use crate::types::{
    BitmaskFlag, BitmaskSig, Call, DecoderError, EnumSig, FunctionSig, Result, StructSig, Value,
};
use crate::wire;

/// Counts of what the decoder has interned so far, plus the calls whose
/// LEAVE has not arrived yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderStats {
    pub functions: usize,
    pub enums: usize,
    pub bitmasks: usize,
    pub structs: usize,
    pub outstanding_calls: usize,
}

/// Streaming decoder for a binary API-call trace.
///
/// Calls are emitted in LEAVE order (the order invocations completed); each
/// call's `no` records ENTER order.
///
/// # Example
///
/// ```no_run
/// use call_trace_decoder::Decoder;
/// use std::path::Path;
///
/// let mut decoder = Decoder::open(Path::new("app.trace")).unwrap();
/// while let Some(call) = decoder.next_call().unwrap() {
///     println!("{:6} {}", call.no, call.name());
/// }
/// ```
pub struct Decoder {
    file: Option<Box<dyn TraceFile>>,
    config: DecoderConfig,
    version: u64,
    next_call_no: u64,
    functions: SigTable<FunctionSig>,
    enums: SigTable<EnumSig>,
    bitmasks: SigTable<BitmaskSig>,
    structs: SigTable<StructSig>,
    /// Calls whose ENTER has been parsed but whose LEAVE has not, in ENTER
    /// order. Nesting is typically shallow, so removal is a linear scan.
    outstanding: Vec<Call>,
    /// Sticky end-of-stream marker; set by the first short read.
    eof: bool,
}

impl Decoder {
    /// Open a trace file, detecting its compression by magic bytes.
    ///
    /// Fails if the file cannot be read or its format version is newer than
    /// [`wire::TRACE_VERSION`].
    pub fn open(path: &Path) -> Result<Decoder> {
        Self::open_with_config(path, DecoderConfig::default())
    }

    pub fn open_with_config(path: &Path, config: DecoderConfig) -> Result<Decoder> {
        let file = open_trace_file(path)?;
        Self::from_file_with_config(file, config)
    }

    /// Decode from an already-constructed byte source.
    pub fn from_file(file: Box<dyn TraceFile>) -> Result<Decoder> {
        Self::from_file_with_config(file, DecoderConfig::default())
    }

    pub fn from_file_with_config(
        file: Box<dyn TraceFile>,
        config: DecoderConfig,
    ) -> Result<Decoder> {
        let mut decoder = Decoder {
            file: Some(file),
            config,
            version: 0,
            next_call_no: 0,
            functions: SigTable::new(),
            enums: SigTable::new(),
            bitmasks: SigTable::new(),
            structs: SigTable::new(),
            outstanding: Vec::new(),
            eof: false,
        };
        decoder.version = decoder.read_uint();
        if decoder.version > wire::TRACE_VERSION {
            return Err(DecoderError::UnsupportedVersion(decoder.version));
        }
        log::debug!("trace format version {}", decoder.version);
        Ok(decoder)
    }

    /// Format version read from the trace header
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            functions: self.functions.len(),
            enums: self.enums.len(),
            bitmasks: self.bitmasks.len(),
            structs: self.structs.len(),
            outstanding_calls: self.outstanding.len(),
        }
    }

    /// Decode events until the next complete call can be emitted.
    ///
    /// Returns `Ok(None)` at a clean end of stream. Truncation mid-call drops
    /// the partial call with a warning and still ends cleanly; an unknown
    /// event or value tag is fatal, since the wire format cannot resynchronize
    /// past it.
    pub fn next_call(&mut self) -> Result<Option<Call>> {
        loop {
            let Some(event) = self.read_byte() else {
                self.flush_outstanding();
                return Ok(None);
            };
            match event {
                wire::EVENT_ENTER => self.parse_enter()?,
                wire::EVENT_LEAVE => {
                    if let Some(call) = self.parse_leave()? {
                        if self.config.emits(&call) {
                            return Ok(Some(call));
                        }
                    }
                }
                code => return Err(DecoderError::UnknownEvent(code)),
            }
        }
    }

    /// Release the byte source and all decoder state. Idempotent; calls
    /// still outstanding are reported as incomplete.
    pub fn close(&mut self) {
        self.flush_outstanding();
        self.file = None;
        self.functions.clear();
        self.enums.clear();
        self.bitmasks.clear();
        self.structs.clear();
    }

    fn flush_outstanding(&mut self) {
        for call in self.outstanding.drain(..) {
            log::warn!("incomplete call {}: {}", call.no, call);
        }
    }

    // === Event demultiplexer ===

    /// ENTER assigns the call number and parses the first batch of call
    /// details. The call is never emitted here - it waits on `outstanding`
    /// until its LEAVE arrives.
    fn parse_enter(&mut self) -> Result<()> {
        let sig = self.parse_function_sig();
        let call_no = self.next_call_no;
        self.next_call_no += 1;

        let mut call = Call::new(call_no, sig);
        if self.parse_call_details(&mut call)? {
            self.outstanding.push(call);
        }
        Ok(())
    }

    fn parse_leave(&mut self) -> Result<Option<Call>> {
        let call_no = self.read_uint();
        let position = self.outstanding.iter().position(|call| call.no == call_no);
        let Some(position) = position else {
            if self.eof {
                return Ok(None);
            }
            log::warn!("leave event for unknown call {}", call_no);
            // consume the orphan's details into a throwaway call so the
            // stream stays aligned; signatures defined inside still intern
            let placeholder = Rc::new(FunctionSig {
                id: 0,
                name: "<unknown>".to_string(),
                arg_names: Vec::new(),
            });
            let mut orphan = Call::new(call_no, placeholder);
            self.parse_call_details(&mut orphan)?;
            return Ok(None);
        };

        let mut call = self.outstanding.remove(position);
        if self.parse_call_details(&mut call)? {
            Ok(Some(call))
        } else {
            log::warn!("incomplete call {}: {}", call.no, call);
            Ok(None)
        }
    }

    /// Argument/return records up to CALL_END. Returns false when the stream
    /// ends mid-call, in which case the caller drops the partial call.
    fn parse_call_details(&mut self, call: &mut Call) -> Result<bool> {
        loop {
            let Some(code) = self.read_byte() else {
                return Ok(false);
            };
            match code {
                wire::CALL_END => return Ok(true),
                wire::CALL_ARG => {
                    let index = self.read_uint() as usize;
                    if let Some(value) = self.parse_value()? {
                        call.set_arg(index, value);
                    }
                }
                wire::CALL_RET => {
                    call.ret = self.parse_value()?;
                }
                code => {
                    return Err(DecoderError::UnknownCallDetail {
                        function: call.name().to_string(),
                        code,
                    })
                }
            }
        }
    }

    // === Signature parsing ===
    //
    // Shared shape across the four kinds: capture the offset before the id,
    // then the first occurrence of an id parses and interns the payload, a
    // repeat at a recorded offset re-parses and discards it, and any other
    // occurrence consumes no signature bytes at all.

    fn parse_function_sig(&mut self) -> Rc<FunctionSig> {
        let offset = self.current_offset();
        let id = self.read_uint();
        let seen = self.functions.lookup(id);
        let inlined = self.functions.inlined_at(offset);
        match seen {
            None => {
                let name = self.read_name();
                let num_args = self.read_uint();
                let mut arg_names = Vec::new();
                for _ in 0..num_args {
                    if self.eof {
                        break;
                    }
                    arg_names.push(self.read_name());
                }
                let sig = Rc::new(FunctionSig { id, name, arg_names });
                self.functions.insert(id, Rc::clone(&sig), offset);
                sig
            }
            Some(sig) => {
                if inlined {
                    self.read_name();
                    let num_args = self.read_uint();
                    for _ in 0..num_args {
                        if self.eof {
                            break;
                        }
                        self.read_name();
                    }
                }
                sig
            }
        }
    }

    fn parse_enum(&mut self) -> Result<Value> {
        let offset = self.current_offset();
        let id = self.read_uint();
        let seen = self.enums.lookup(id);
        let inlined = self.enums.inlined_at(offset);
        let sig = match seen {
            None => {
                let name = self.read_name();
                // the nominal value nests an arbitrary value parse
                let value = self.parse_value()?.map_or(0, |value| value.as_sint());
                let sig = Rc::new(EnumSig { id, name, value });
                self.enums.insert(id, Rc::clone(&sig), offset);
                sig
            }
            Some(sig) => {
                if inlined {
                    self.read_name();
                    let _ = self.parse_value()?;
                }
                sig
            }
        };
        Ok(Value::Enum(sig))
    }

    fn parse_bitmask(&mut self) -> Result<Value> {
        let offset = self.current_offset();
        let id = self.read_uint();
        let seen = self.bitmasks.lookup(id);
        let inlined = self.bitmasks.inlined_at(offset);
        let sig = match seen {
            None => {
                let num_flags = self.read_uint();
                let mut flags = Vec::new();
                for i in 0..num_flags {
                    if self.eof {
                        break;
                    }
                    let name = self.read_name();
                    let value = self.read_uint();
                    if value == 0 && i != 0 {
                        log::warn!(
                            "bitmask flag {} has value zero but is not the first flag",
                            name
                        );
                    }
                    flags.push(BitmaskFlag { name, value });
                }
                let sig = Rc::new(BitmaskSig { id, flags });
                self.bitmasks.insert(id, Rc::clone(&sig), offset);
                sig
            }
            Some(sig) => {
                if inlined {
                    let num_flags = self.read_uint();
                    for _ in 0..num_flags {
                        if self.eof {
                            break;
                        }
                        self.read_name();
                        self.read_uint();
                    }
                }
                sig
            }
        };

        let value = self.read_uint();
        Ok(Value::Bitmask(sig, value))
    }

    fn parse_struct(&mut self) -> Result<Value> {
        let offset = self.current_offset();
        let id = self.read_uint();
        let seen = self.structs.lookup(id);
        let inlined = self.structs.inlined_at(offset);
        let sig = match seen {
            None => {
                let name = self.read_name();
                let num_members = self.read_uint();
                let mut member_names = Vec::new();
                for _ in 0..num_members {
                    if self.eof {
                        break;
                    }
                    member_names.push(self.read_name());
                }
                let sig = Rc::new(StructSig {
                    id,
                    name,
                    member_names,
                });
                self.structs.insert(id, Rc::clone(&sig), offset);
                sig
            }
            Some(sig) => {
                if inlined {
                    self.read_name();
                    let num_members = self.read_uint();
                    for _ in 0..num_members {
                        if self.eof {
                            break;
                        }
                        self.read_name();
                    }
                }
                sig
            }
        };

        let mut members = Vec::new();
        for _ in 0..sig.member_names.len() {
            if self.eof {
                break;
            }
            match self.parse_value()? {
                Some(value) => members.push(value),
                None => break,
            }
        }
        Ok(Value::Struct(sig, members))
    }

    // === Value decoder ===

    /// One tagged value. `Ok(None)` means the stream ended at the tag byte;
    /// the caller decides whether that is a clean boundary or truncation.
    fn parse_value(&mut self) -> Result<Option<Value>> {
        let Some(tag) = self.read_byte() else {
            return Ok(None);
        };
        let value = match tag {
            wire::TYPE_NULL => Value::Null,
            wire::TYPE_FALSE => Value::Bool(false),
            wire::TYPE_TRUE => Value::Bool(true),
            // the wire carries the absolute value; the tag implies the sign
            wire::TYPE_SINT => Value::SInt((self.read_uint() as i64).wrapping_neg()),
            wire::TYPE_UINT => Value::UInt(self.read_uint()),
            wire::TYPE_FLOAT => Value::Float(self.read_f32()),
            wire::TYPE_DOUBLE => Value::Double(self.read_f64()),
            wire::TYPE_STRING => Value::String(self.read_string()),
            wire::TYPE_ENUM => self.parse_enum()?,
            wire::TYPE_BITMASK => self.parse_bitmask()?,
            wire::TYPE_ARRAY => self.parse_array()?,
            wire::TYPE_STRUCT => self.parse_struct()?,
            wire::TYPE_BLOB => Value::Blob(self.read_blob()),
            wire::TYPE_OPAQUE => Value::Pointer(self.read_uint()),
            tag => return Err(DecoderError::UnknownValueType(tag)),
        };
        Ok(Some(value))
    }

    fn parse_array(&mut self) -> Result<Value> {
        let len = self.read_uint();
        let mut values = Vec::new();
        for _ in 0..len {
            if self.eof {
                break;
            }
            match self.parse_value()? {
                Some(value) => values.push(value),
                None => break,
            }
        }
        Ok(Value::Array(values))
    }

    // === Primitive decoders ===

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.file.as_deref_mut().and_then(|file| file.get_byte());
        if byte.is_none() {
            self.eof = true;
        }
        byte
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> usize {
        let n = match self.file.as_deref_mut() {
            Some(file) => file.read(buf),
            None => 0,
        };
        if n < buf.len() {
            self.eof = true;
        }
        n
    }

    fn current_offset(&self) -> Offset {
        self.file
            .as_deref()
            .map(|file| file.current_offset())
            .unwrap_or_default()
    }

    /// Base-128 little-endian varuint, 7 data bits per byte, bit 7 is the
    /// continuation bit. End of stream mid-value yields the partial
    /// accumulated value; truncation is detected at the next event boundary.
    fn read_uint(&mut self) -> u64 {
        let mut value = 0u64;
        let mut shift = 0u32;
        while let Some(byte) = self.read_byte() {
            if shift < 64 {
                value |= u64::from(byte & 0x7f) << shift;
            }
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        value
    }

    /// Length-prefixed string bytes with a NUL appended (not counted in the
    /// wire length). A short read keeps whatever arrived.
    fn read_string(&mut self) -> Vec<u8> {
        let len = self.read_uint() as usize;
        let mut buf = vec![0u8; len];
        let n = self.read_exact(&mut buf);
        buf.truncate(n);
        buf.push(0);
        buf
    }

    /// Signature-name string, lossily decoded without the NUL
    fn read_name(&mut self) -> String {
        let mut bytes = self.read_string();
        bytes.pop();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn read_f32(&mut self) -> f32 {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf);
        f32::from_le_bytes(buf)
    }

    fn read_f64(&mut self) -> f64 {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf);
        f64::from_le_bytes(buf)
    }

    fn read_blob(&mut self) -> Vec<u8> {
        let size = self.read_uint() as usize;
        let mut buf = vec![0u8; size];
        let n = self.read_exact(&mut buf);
        buf.truncate(n);
        buf
    }
}

impl Iterator for Decoder {
    type Item = Result<Call>;

    /// Iterate over complete calls. A fatal decode error is yielded once;
    /// iteration should stop there, since the stream cannot resynchronize.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_call() {
            Ok(Some(call)) => Some(Ok(call)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
