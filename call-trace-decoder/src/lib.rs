//! Call Trace Decoder Library
//!
//! A streaming decoder for binary API-call trace files, as captured from a
//! graphics driver. A trace is a sequence of API invocations; each call has a
//! numeric identifier, a named signature, an ordered argument list and an
//! optional return value. Values are typed and recursive: primitives,
//! strings, enums, bitmasks, arrays, structs, blobs and opaque handles.
//!
//! # Architecture
//!
//! The library is intentionally minimal and focused on decoding:
//! - Reads the compressed byte stream (chunk container, gzip, or raw)
//! - Decodes the self-describing wire format, interning function, enum,
//!   bitmask and struct signatures by numeric id
//! - Reassembles interleaved ENTER/LEAVE events into complete calls,
//!   preserving invocation order through call numbers
//!
//! The library does NOT:
//! - Write traces or seek backwards
//! - Validate function semantics
//! - Interpret blob or opaque payloads
//! - Pretty-print or replay calls
//!
//! All higher-level functionality belongs to the applications consuming the
//! call stream.
//!
//! # Example Usage
//!
//! ```no_run
//! use call_trace_decoder::{Decoder, DecoderConfig};
//! use std::path::Path;
//!
//! let config = DecoderConfig::new()
//!     .with_function_filter(vec!["glClear".to_string()]);
//!
//! let decoder = Decoder::open_with_config(Path::new("app.trace"), config).unwrap();
//!
//! for call in decoder {
//!     match call {
//!         Ok(call) => println!("{:6} {}", call.no, call),
//!         Err(e) => {
//!             eprintln!("decode error: {}", e);
//!             break;
//!         }
//!     }
//! }
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod formats;
pub mod types;
pub mod wire;

// Re-export main types for convenience
pub use config::DecoderConfig;
pub use decoder::{Decoder, DecoderStats};
pub use formats::{ChunkedFile, GzipFile, Offset, RawFile, TraceFile};
pub use types::{
    BitmaskFlag, BitmaskSig, Call, DecoderError, EnumSig, FunctionSig, Result, StructSig, Value,
};
pub use wire::TRACE_VERSION;

// Internal modules (not exposed in public API)
mod sigtable;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
