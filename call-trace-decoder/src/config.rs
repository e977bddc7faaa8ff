//! Decoder configuration types
//!
//! The configuration is deliberately small: the decoder's job is to
//! reconstruct calls, and anything smarter belongs to the application layer.
//! The types are serde-friendly so applications can embed them in their own
//! config files.

use serde::{Deserialize, Serialize};

use crate::types::Call;

/// Configuration for the decoder library
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Optional: only emit calls to these functions. Everything is still
    /// parsed (signature tables and call numbering are unaffected); calls
    /// that don't match are dropped at emission.
    #[serde(default)]
    pub function_filter: Option<Vec<String>>,
}

impl DecoderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict emission to calls whose function name is in `names`
    pub fn with_function_filter(mut self, names: Vec<String>) -> Self {
        self.function_filter = Some(names);
        self
    }

    pub(crate) fn emits(&self, call: &Call) -> bool {
        match &self.function_filter {
            Some(names) => names.iter().any(|name| name == call.name()),
            None => true,
        }
    }
}
