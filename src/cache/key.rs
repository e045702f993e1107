//! Cache key derivation.

use std::fmt;

/// Identifies a cached resource by the request's `Host` header value and its
/// request-target, exactly as the client sent them.
///
/// The two parts are kept as separate fields so that distinct pairs can never
/// collide, whatever characters either part contains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    host: String,
    target: String,
}

impl CacheKey {
    /// Build a key from the `Host` value and the request-target.
    pub fn new(host: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            target: target.into(),
        }
    }

    /// The `Host` header part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The request-target part.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.host, self.target)
    }
}
