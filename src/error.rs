//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// `NotFound` is the normal miss path rather than a failure; callers usually
/// match on it instead of propagating it.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key was empty when constructing a cache item
    #[error("Invalid key: key cannot be empty")]
    InvalidKey,

    /// Key not found in cache (absent or expired)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// A persisted record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing the persisted store failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Returns true for the miss path (absent or expired key).
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = CacheError::NotFound("foo".to_string());
        assert_eq!(err.to_string(), "Key not found: foo");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_key_is_not_a_miss() {
        assert!(!CacheError::InvalidKey.is_not_found());
    }

    #[test]
    fn test_serialization_error_from() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: CacheError = json_err.into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
