//! Core types for the trace decoder library
//!
//! This module defines everything the decoder emits when processing a trace
//! file: interned signatures, the recursive value tree, and complete calls.
//! The decoder only reconstructs calls - it does not interpret blob or opaque
//! payloads, and it does not validate function semantics.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors that can occur while decoding a trace
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("unsupported trace format version {0}")]
    UnsupportedVersion(u64),

    #[error("unknown event 0x{0:02x}")]
    UnknownEvent(u8),

    #[error("({function}) unknown call detail 0x{code:02x}")]
    UnknownCallDetail { function: String, code: u8 },

    #[error("unknown value type 0x{0:02x}")]
    UnknownValueType(u8),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Signature of a traced API function: name plus argument names, interned by
/// numeric id. Signatures live as long as the decoder and are shared by every
/// call that references them.
#[derive(Debug, PartialEq, Eq)]
pub struct FunctionSig {
    pub id: u64,
    pub name: String,
    pub arg_names: Vec<String>,
}

/// Signature of a named enum constant carrying an arbitrary signed value.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumSig {
    pub id: u64,
    pub name: String,
    pub value: i64,
}

/// One named flag of a bitmask.
#[derive(Debug, PartialEq, Eq)]
pub struct BitmaskFlag {
    pub name: String,
    pub value: u64,
}

/// Signature of a bitmask type. At most one flag has value zero, and if
/// present it is the first; the decoder warns on violations but keeps going.
#[derive(Debug, PartialEq, Eq)]
pub struct BitmaskSig {
    pub id: u64,
    pub flags: Vec<BitmaskFlag>,
}

/// Signature of a struct type: name plus member names in wire order.
#[derive(Debug, PartialEq, Eq)]
pub struct StructSig {
    pub id: u64,
    pub name: String,
    pub member_names: Vec<String>,
}

/// A decoded value - the recursive tagged tree the decoder produces for every
/// argument and return value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    SInt(i64),
    UInt(u64),
    Float(f32),
    /// 8-byte doubles keep their full precision in a distinct variant rather
    /// than narrowing to f32.
    Double(f64),
    /// Raw string bytes with a trailing NUL appended (the NUL is not counted
    /// in the wire length).
    String(Vec<u8>),
    Enum(Rc<EnumSig>),
    Bitmask(Rc<BitmaskSig>, u64),
    Array(Vec<Value>),
    /// Member values positional by member index; truncated streams may leave
    /// the vector shorter than the signature.
    Struct(Rc<StructSig>, Vec<Value>),
    Blob(Vec<u8>),
    /// Address-valued handle whose referent is not serialized.
    Pointer(u64),
}

impl Value {
    /// Convert to a signed integer, the conversion the wire uses when an enum
    /// signature nests an arbitrary value.
    pub fn as_sint(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Bool(b) => *b as i64,
            Value::SInt(v) => *v,
            Value::UInt(v) => *v as i64,
            Value::Float(v) => *v as i64,
            Value::Double(v) => *v as i64,
            Value::Enum(sig) => sig.value,
            _ => 0,
        }
    }

    /// Convert to an unsigned integer if the variant has a natural one.
    pub fn as_uint(&self) -> u64 {
        match self {
            Value::Null => 0,
            Value::Bool(b) => *b as u64,
            Value::SInt(v) => *v as u64,
            Value::UInt(v) => *v,
            Value::Float(v) => *v as u64,
            Value::Double(v) => *v as u64,
            Value::Enum(sig) => sig.value as u64,
            Value::Bitmask(_, v) => *v,
            Value::Pointer(addr) => *addr,
            _ => 0,
        }
    }

    /// Truthiness of the value
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::SInt(v) => *v != 0,
            Value::UInt(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Double(v) => *v != 0.0,
            Value::String(_) => true,
            Value::Enum(sig) => sig.value != 0,
            Value::Bitmask(_, v) => *v != 0,
            Value::Array(values) => !values.is_empty(),
            Value::Struct(..) => true,
            Value::Blob(buf) => !buf.is_empty(),
            Value::Pointer(addr) => *addr != 0,
        }
    }

    /// String contents without the trailing NUL, lossily decoded.
    /// Returns `None` for non-string variants.
    pub fn to_string_lossy(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::String(bytes) => {
                let is_nul_terminated = bytes.last() == Some(&0);
                Some(String::from_utf8_lossy(if is_nul_terminated {
                    &bytes[..bytes.len() - 1]
                } else {
                    bytes
                }))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::SInt(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(bytes) => {
                let end = if bytes.last() == Some(&0) {
                    bytes.len() - 1
                } else {
                    bytes.len()
                };
                write!(f, "{:?}", String::from_utf8_lossy(&bytes[..end]))
            }
            Value::Enum(sig) => write!(f, "{}", sig.name),
            Value::Bitmask(_, v) => write!(f, "0x{:x}", v),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Struct(sig, members) => {
                write!(f, "{} {{", sig.name)?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match sig.member_names.get(i) {
                        Some(name) => write!(f, " {} = {}", name, member)?,
                        None => write!(f, " {}", member)?,
                    }
                }
                write!(f, " }}")
            }
            Value::Blob(buf) => write!(f, "blob({})", buf.len()),
            Value::Pointer(addr) => write!(f, "0x{:x}", addr),
        }
    }
}

/// One complete invocation record: an ENTER/LEAVE pair reassembled by the
/// decoder. Ownership transfers to the caller on emission.
#[derive(Debug, Clone)]
pub struct Call {
    /// Monotonic call number assigned at ENTER time. Emission happens in
    /// LEAVE order, so `no` is how callers recover invocation order.
    pub no: u64,
    pub sig: Rc<FunctionSig>,
    /// Arguments addressed by index. They may arrive out of order on the
    /// wire; slots never filled stay `None`.
    pub args: Vec<Option<Value>>,
    pub ret: Option<Value>,
}

impl Call {
    pub(crate) fn new(no: u64, sig: Rc<FunctionSig>) -> Self {
        Self {
            no,
            sig,
            args: Vec::new(),
            ret: None,
        }
    }

    /// Name of the traced function
    pub fn name(&self) -> &str {
        &self.sig.name
    }

    /// Argument by index, if it was recorded
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn set_arg(&mut self, index: usize, value: Value) {
        if index >= self.args.len() {
            self.args.resize(index + 1, None);
        }
        self.args[index] = Some(value);
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.sig.name)?;
        for (i, slot) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if let Some(name) = self.sig.arg_names.get(i) {
                write!(f, "{} = ", name)?;
            }
            match slot {
                Some(value) => write!(f, "{}", value)?,
                None => write!(f, "?")?,
            }
        }
        write!(f, ")")?;
        if let Some(ret) = &self.ret {
            write!(f, " = {}", ret)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::SInt(-3).as_sint(), -3);
        assert_eq!(Value::UInt(42).as_sint(), 42);
        assert_eq!(Value::Null.as_sint(), 0);
        assert_eq!(Value::Bool(true).as_sint(), 1);

        assert_eq!(Value::Bitmask(Rc::new(BitmaskSig { id: 0, flags: vec![] }), 6).as_uint(), 6);
        assert_eq!(Value::Pointer(0xdead).as_uint(), 0xdead);

        assert!(Value::UInt(1).as_bool());
        assert!(!Value::Null.as_bool());
        assert!(!Value::Double(0.0).as_bool());
    }

    #[test]
    fn test_string_lossy_trims_nul() {
        let value = Value::String(b"abc\0".to_vec());
        assert_eq!(value.to_string_lossy().unwrap(), "abc");
        assert_eq!(Value::UInt(1).to_string_lossy(), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Null), "NULL");
        assert_eq!(format!("{}", Value::SInt(-7)), "-7");
        assert_eq!(
            format!("{}", Value::Array(vec![Value::UInt(1), Value::UInt(2)])),
            "[1, 2]"
        );
        assert_eq!(format!("{}", Value::Blob(vec![0; 16])), "blob(16)");

        let sig = Rc::new(StructSig {
            id: 0,
            name: "P".to_string(),
            member_names: vec!["x".to_string(), "y".to_string()],
        });
        let value = Value::Struct(sig, vec![Value::UInt(1), Value::UInt(2)]);
        assert_eq!(format!("{}", value), "P { x = 1, y = 2 }");
    }

    #[test]
    fn test_call_sparse_args() {
        let sig = Rc::new(FunctionSig {
            id: 0,
            name: "f".to_string(),
            arg_names: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        });
        let mut call = Call::new(3, sig);
        call.set_arg(2, Value::UInt(9));
        assert_eq!(call.args.len(), 3);
        assert!(call.arg(0).is_none());
        assert!(call.arg(1).is_none());
        assert_eq!(call.arg(2), Some(&Value::UInt(9)));
        assert_eq!(call.name(), "f");
        assert_eq!(format!("{}", call), "f(a = ?, b = ?, c = 9)");
    }
}
