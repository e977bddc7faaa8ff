//! Wire-format constants for the trace stream.
//!
//! A trace file begins with a varuint format version, followed by a sequence
//! of events:
//!
//! | Event | Code | Payload |
//! |-------|------|---------|
//! | ENTER | 0x00 | varuint function id, inline [`FunctionSig`] on first emission, call details |
//! | LEAVE | 0x01 | varuint call number, call details |
//!
//! Call details are records terminated by `CALL_END`:
//!
//! | Record | Code | Payload |
//! |--------|------|---------|
//! | END    | 0x00 | — |
//! | ARG    | 0x01 | varuint argument index, one value |
//! | RET    | 0x02 | one value |
//!
//! A value is a tag byte followed by its payload. Integers are varuints
//! (base-128 little-endian, bit 7 is the continuation bit); strings are
//! varuint-length-prefixed with no terminator on the wire; floats and doubles
//! are raw little-endian IEEE-754.
//!
//! Function, enum, bitmask and struct signatures are interned by numeric id.
//! The signature payload is present on the wire only the first time the
//! writer emits a given id; the decoder deduplicates repeated payloads by
//! stream offset.
//!
//! These codes must stay in lockstep with the trace writer.
//!
//! [`FunctionSig`]: crate::types::FunctionSig

/// Highest trace format version this decoder understands.
pub const TRACE_VERSION: u64 = 5;

pub const EVENT_ENTER: u8 = 0x00;
pub const EVENT_LEAVE: u8 = 0x01;

pub const CALL_END: u8 = 0x00;
pub const CALL_ARG: u8 = 0x01;
pub const CALL_RET: u8 = 0x02;

pub const TYPE_NULL: u8 = 0;
pub const TYPE_FALSE: u8 = 1;
pub const TYPE_TRUE: u8 = 2;
pub const TYPE_SINT: u8 = 3;
pub const TYPE_UINT: u8 = 4;
pub const TYPE_FLOAT: u8 = 5;
pub const TYPE_DOUBLE: u8 = 6;
pub const TYPE_STRING: u8 = 7;
pub const TYPE_ENUM: u8 = 8;
pub const TYPE_BITMASK: u8 = 9;
pub const TYPE_ARRAY: u8 = 10;
pub const TYPE_STRUCT: u8 = 11;
pub const TYPE_BLOB: u8 = 12;
pub const TYPE_OPAQUE: u8 = 13;
