//! HTTP caching policy.
//!
//! Pure decision functions over buffered messages: whether a response may be
//! stored, when it expires, whether a cached copy must be revalidated, and how
//! to build the conditional request that does so. Nothing here performs I/O
//! or touches shared state.
//!
//! # Decision Flow
//! ```text
//! origin response ──▶ cacheability() ──▶ Storable ──▶ cache.put
//!                                   └──▶ NotCacheable(reason)
//!
//! cached response ──▶ needs_revalidation(now)
//!                        ├─ requires_validation_always ─┐
//!                        └─ !is_fresh(now) ─────────────┴▶ build_conditional_request
//! ```

pub mod date;
pub mod directives;

use std::fmt;
use std::time::{Duration, SystemTime};

use hyper::header;
use hyper::StatusCode;

use crate::http::message::{HttpRequest, HttpResponse};

pub use date::{format_http_date, parse_http_date};
pub use directives::CacheControl;

/// Why a response may or may not be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cacheability {
    Storable,
    NotCacheable(NotCacheableReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotCacheableReason {
    Status(StatusCode),
    NoStore,
    Private,
}

impl fmt::Display for NotCacheableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotCacheableReason::Status(status) => write!(f, "Response code is {}", status.as_u16()),
            NotCacheableReason::NoStore => f.write_str(CacheControl::NO_STORE),
            NotCacheableReason::Private => f.write_str(CacheControl::PRIVATE),
        }
    }
}

/// Classify a response for storage. Only `200 OK` responses without
/// `no-store` or `private` are storable.
pub fn cacheability(response: &HttpResponse) -> Cacheability {
    if response.status != StatusCode::OK {
        return Cacheability::NotCacheable(NotCacheableReason::Status(response.status));
    }
    let Some(cc) = CacheControl::from_headers(&response.headers) else {
        return Cacheability::Storable;
    };
    if cc.has(CacheControl::NO_STORE) {
        Cacheability::NotCacheable(NotCacheableReason::NoStore)
    } else if cc.has(CacheControl::PRIVATE) {
        Cacheability::NotCacheable(NotCacheableReason::Private)
    } else {
        Cacheability::Storable
    }
}

/// Shorthand for `cacheability(response) == Cacheability::Storable`.
pub fn is_cacheable(response: &HttpResponse) -> bool {
    cacheability(response) == Cacheability::Storable
}

/// True if every use of the cached response must be revalidated:
/// `no-cache`, `must-revalidate` or `max-age=0`.
pub fn requires_validation_always(response: &HttpResponse) -> bool {
    CacheControl::from_headers(&response.headers).is_some_and(|cc| {
        cc.has(CacheControl::NO_CACHE)
            || cc.has(CacheControl::MUST_REVALIDATE)
            || cc.max_age() == Some(0)
    })
}

/// When the response stops being fresh, or `None` if it never expires.
///
/// `Cache-Control: max-age=N` expires N seconds after the `Date` header.
/// `Cache-Control` without `max-age` never expires. Without `Cache-Control`
/// the `Expires` header is used. A missing or unparseable date means the
/// response never expires.
pub fn compute_expiry(response: &HttpResponse) -> Option<SystemTime> {
    match CacheControl::from_headers(&response.headers) {
        Some(cc) => {
            let max_age = cc.max_age()?;
            let date = header_date(response, header::DATE)?;
            date.checked_add(Duration::from_secs(max_age))
        }
        None => header_date(response, header::EXPIRES),
    }
}

fn header_date(response: &HttpResponse, name: header::HeaderName) -> Option<SystemTime> {
    response
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
}

/// True until the computed expiry passes. Responses without an expiry stay
/// fresh forever.
pub fn is_fresh(response: &HttpResponse, now: SystemTime) -> bool {
    compute_expiry(response).map_or(true, |expiry| expiry > now)
}

/// Whether a cached response must be confirmed with the origin before it is
/// served at `now`.
pub fn needs_revalidation(response: &HttpResponse, now: SystemTime) -> bool {
    requires_validation_always(response) || !is_fresh(response, now)
}

/// Copy `original` and add `If-None-Match` / `If-Modified-Since` from the
/// cached response's `ETag` / `Last-Modified`, whichever are present.
pub fn build_conditional_request(original: &HttpRequest, cached: &HttpResponse) -> HttpRequest {
    let mut request = original.clone();
    if let Some(etag) = cached.headers.get(header::ETAG) {
        request.headers.insert(header::IF_NONE_MATCH, etag.clone());
    }
    if let Some(last_modified) = cached.headers.get(header::LAST_MODIFIED) {
        request.headers.insert(header::IF_MODIFIED_SINCE, last_modified.clone());
    }
    request
}

/// How a freshly stored response will be treated on later hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOutcome {
    RequiresRevalidation,
    ExpiresAt(SystemTime),
    NeverExpires,
}

/// Classify a storable response for the "cached, ..." log line.
pub fn storage_outcome(response: &HttpResponse) -> StorageOutcome {
    if requires_validation_always(response) {
        StorageOutcome::RequiresRevalidation
    } else if let Some(expiry) = compute_expiry(response) {
        StorageOutcome::ExpiresAt(expiry)
    } else {
        StorageOutcome::NeverExpires
    }
}

impl fmt::Display for StorageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageOutcome::RequiresRevalidation => f.write_str("cached, but requires re-validation"),
            StorageOutcome::ExpiresAt(at) => write!(f, "cached, expires at {}", format_http_date(*at)),
            StorageOutcome::NeverExpires => f.write_str("cached, does not expire"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hyper::header::{HeaderMap, HeaderValue};
    use hyper::{Method, Version};
    use std::time::UNIX_EPOCH;

    const T: u64 = 1_700_000_000;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn response(status: StatusCode, headers: &[(&'static str, String)]) -> HttpResponse {
        let mut response = HttpResponse::empty(status);
        for (name, value) in headers {
            response.headers.append(*name, HeaderValue::from_str(value).unwrap());
        }
        response
    }

    fn ok(headers: &[(&'static str, String)]) -> HttpResponse {
        response(StatusCode::OK, headers)
    }

    fn cc(value: &str) -> (&'static str, String) {
        ("cache-control", value.to_string())
    }

    fn date(secs: u64) -> (&'static str, String) {
        ("date", format_http_date(at(secs)))
    }

    fn expires(secs: u64) -> (&'static str, String) {
        ("expires", format_http_date(at(secs)))
    }

    #[test]
    fn only_200_is_cacheable() {
        for status in [StatusCode::NOT_FOUND, StatusCode::NOT_MODIFIED, StatusCode::CREATED] {
            let r = response(status, &[cc("max-age=60")]);
            assert!(!is_cacheable(&r));
            assert_eq!(
                cacheability(&r),
                Cacheability::NotCacheable(NotCacheableReason::Status(status))
            );
        }
    }

    #[test]
    fn cacheable_without_cache_control() {
        assert!(is_cacheable(&ok(&[])));
    }

    #[test]
    fn no_store_and_private_are_never_cacheable() {
        assert_eq!(
            cacheability(&ok(&[cc("max-age=60, no-store")])),
            Cacheability::NotCacheable(NotCacheableReason::NoStore)
        );
        assert_eq!(
            cacheability(&ok(&[cc("private")])),
            Cacheability::NotCacheable(NotCacheableReason::Private)
        );
        assert!(is_cacheable(&ok(&[cc("public, max-age=60")])));
        assert!(is_cacheable(&ok(&[cc("no-cache")])));
    }

    #[test]
    fn not_cacheable_reason_text() {
        assert_eq!(
            NotCacheableReason::Status(StatusCode::NOT_FOUND).to_string(),
            "Response code is 404"
        );
        assert_eq!(NotCacheableReason::NoStore.to_string(), "no-store");
    }

    #[test]
    fn validation_always_directives() {
        assert!(requires_validation_always(&ok(&[cc("no-cache")])));
        assert!(requires_validation_always(&ok(&[cc("must-revalidate, max-age=60")])));
        assert!(requires_validation_always(&ok(&[cc("max-age=0")])));
        assert!(!requires_validation_always(&ok(&[cc("max-age=1")])));
        assert!(!requires_validation_always(&ok(&[])));
    }

    #[test]
    fn expiry_from_max_age_and_date() {
        let r = ok(&[cc("max-age=60"), date(T)]);
        assert_eq!(compute_expiry(&r), Some(at(T + 60)));
    }

    #[test]
    fn max_age_wins_over_expires() {
        let r = ok(&[cc("max-age=60"), date(T), expires(T + 5)]);
        assert_eq!(compute_expiry(&r), Some(at(T + 60)));
    }

    #[test]
    fn cache_control_without_max_age_never_expires() {
        let r = ok(&[cc("public"), date(T), expires(T + 5)]);
        assert_eq!(compute_expiry(&r), None);
    }

    #[test]
    fn falls_back_to_expires() {
        assert_eq!(compute_expiry(&ok(&[expires(T + 5)])), Some(at(T + 5)));
        assert_eq!(compute_expiry(&ok(&[])), None);
    }

    #[test]
    fn malformed_dates_never_expire() {
        let bad_date = ok(&[cc("max-age=60"), ("date", "yesterday".into())]);
        assert_eq!(compute_expiry(&bad_date), None);
        assert!(is_fresh(&bad_date, at(u32::MAX as u64)));

        let missing_date = ok(&[cc("max-age=60")]);
        assert_eq!(compute_expiry(&missing_date), None);

        let bad_expires = ok(&[("expires", "0".into())]);
        assert_eq!(compute_expiry(&bad_expires), None);

        let bad_max_age = ok(&[cc("max-age=soon"), date(T)]);
        assert_eq!(compute_expiry(&bad_max_age), None);
    }

    #[test]
    fn freshness_window() {
        let r = ok(&[cc("max-age=60"), date(T)]);
        assert!(is_fresh(&r, at(T)));
        assert!(is_fresh(&r, at(T + 59)));
        assert!(!is_fresh(&r, at(T + 60)));
        assert!(!is_fresh(&r, at(T + 61)));
    }

    #[test]
    fn revalidation_decision() {
        let fresh = ok(&[cc("max-age=60"), date(T)]);
        assert!(!needs_revalidation(&fresh, at(T + 10)));
        assert!(needs_revalidation(&fresh, at(T + 60)));

        // Never expires, but always revalidated.
        let no_cache = ok(&[cc("no-cache")]);
        assert!(is_fresh(&no_cache, at(T)));
        assert!(is_cacheable(&no_cache));
        assert!(needs_revalidation(&no_cache, at(T)));

        assert!(!needs_revalidation(&ok(&[]), at(T)));
    }

    fn request() -> HttpRequest {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("example.com"));
        HttpRequest {
            method: Method::GET,
            uri: "/a".parse().unwrap(),
            version: Version::HTTP_11,
            headers,
            body: Bytes::new(),
        }
    }

    #[test]
    fn conditional_request_carries_both_validators() {
        let cached = ok(&[
            ("etag", "\"abc\"".into()),
            ("last-modified", "Sun, 06 Nov 1994 08:49:37 GMT".into()),
        ]);
        let original = request();
        let conditional = build_conditional_request(&original, &cached);

        assert_eq!(conditional.headers.get(header::IF_NONE_MATCH).unwrap(), "\"abc\"");
        assert_eq!(
            conditional.headers.get(header::IF_MODIFIED_SINCE).unwrap(),
            "Sun, 06 Nov 1994 08:49:37 GMT"
        );
        assert_eq!(conditional.headers.get(header::HOST).unwrap(), "example.com");
        assert_eq!(conditional.uri, original.uri);
        assert!(original.headers.get(header::IF_NONE_MATCH).is_none());
    }

    #[test]
    fn conditional_request_omits_missing_validators() {
        let etag_only = ok(&[("etag", "W/\"1\"".into())]);
        let conditional = build_conditional_request(&request(), &etag_only);
        assert!(conditional.headers.contains_key(header::IF_NONE_MATCH));
        assert!(!conditional.headers.contains_key(header::IF_MODIFIED_SINCE));

        let neither = build_conditional_request(&request(), &ok(&[]));
        assert!(!neither.headers.contains_key(header::IF_NONE_MATCH));
        assert!(!neither.headers.contains_key(header::IF_MODIFIED_SINCE));
    }

    #[test]
    fn storage_outcome_messages() {
        assert_eq!(
            storage_outcome(&ok(&[cc("no-cache"), date(T)])),
            StorageOutcome::RequiresRevalidation
        );
        assert_eq!(
            storage_outcome(&ok(&[cc("max-age=60"), date(T)])),
            StorageOutcome::ExpiresAt(at(T + 60))
        );
        assert_eq!(storage_outcome(&ok(&[])), StorageOutcome::NeverExpires);
        assert_eq!(
            StorageOutcome::ExpiresAt(at(784_111_777)).to_string(),
            "cached, expires at Sun, 06 Nov 1994 08:49:37 GMT"
        );
    }
}
