//! `Cache-Control` directive parsing.

use std::collections::HashMap;

use hyper::header::{self, HeaderMap};

/// Parsed `Cache-Control` directives: lowercase name → optional integer value.
///
/// A directive written as `name` or with a non-integer value (`private="x"`)
/// is present with no value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheControl {
    directives: HashMap<String, Option<u64>>,
}

impl CacheControl {
    // Directive names, lowercase as stored.
    pub const MAX_AGE: &'static str = "max-age";
    pub const NO_CACHE: &'static str = "no-cache";
    pub const NO_STORE: &'static str = "no-store";
    pub const PRIVATE: &'static str = "private";
    pub const MUST_REVALIDATE: &'static str = "must-revalidate";

    /// Parse every `Cache-Control` field in `headers`.
    ///
    /// Returns `None` when the header is absent, so callers can tell
    /// "no directives" apart from "no header".
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let mut values = headers.get_all(header::CACHE_CONTROL).iter().peekable();
        values.peek()?;

        let mut directives = HashMap::new();
        for value in values {
            let Ok(value) = value.to_str() else {
                continue;
            };
            directives.extend(parse_directives(value));
        }
        Some(Self { directives })
    }

    /// Parse a single header value.
    pub fn parse(value: &str) -> Self {
        Self {
            directives: parse_directives(value).collect(),
        }
    }

    /// Whether directive `name` is present, with or without a value.
    pub fn has(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    /// Integer value of a directive; `None` if absent or valueless.
    pub fn value(&self, name: &str) -> Option<u64> {
        self.directives.get(name).copied().flatten()
    }

    /// `max-age` in seconds, if present and an integer.
    pub fn max_age(&self) -> Option<u64> {
        self.value(Self::MAX_AGE)
    }
}

fn parse_directives(value: &str) -> impl Iterator<Item = (String, Option<u64>)> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .map(|directive| match directive.split_once('=') {
            Some((name, value)) => (
                name.trim().to_ascii_lowercase(),
                value.trim().trim_matches('"').parse().ok(),
            ),
            None => (directive.to_ascii_lowercase(), None),
        })
}
