//! Object keys

use crate::{GatewayError, Result};
use std::fmt;

/// Longest key accepted, in bytes (the S3 object key limit)
pub const MAX_KEY_LEN: usize = 1024;

/// A validated file key.
///
/// The same string is the object-store key and, prefixed with `/`, the
/// edge path that gets invalidated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    /// Validate and wrap a key
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(GatewayError::InvalidKey("key cannot be empty".to_string()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(GatewayError::InvalidKey(format!(
                "key is {} bytes, maximum is {}",
                key.len(),
                MAX_KEY_LEN
            )));
        }
        Ok(Self(key))
    }

    /// The key as stored
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path the edge serves this key under
    pub fn edge_path(&self) -> String {
        format!("/{}", self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Key {
    type Error = GatewayError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for Key {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}
