//! Buffered HTTP messages exchanged between the handler, the cache and the
//! upstream client.
//!
//! Bodies are fully collected into [`Bytes`], so a message can be cloned
//! cheaply, stored in the cache and written more than once.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::header::{self, HeaderMap, HeaderName};
use hyper::{Method, Request, Response, StatusCode, Uri, Version};

/// Body type used for every message the proxy writes.
pub type ProxyBody = Full<Bytes>;

/// Headers describing how the original message was framed on the wire.
/// They are recomputed by hyper from the buffered body, so they are never copied.
const FRAMING_HEADERS: [HeaderName; 5] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
];

fn strip_framing(headers: &mut HeaderMap) {
    for name in &FRAMING_HEADERS {
        headers.remove(name);
    }
}

/// A fully buffered HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpRequest {
    /// Collect the body of an incoming request.
    pub async fn from_incoming(request: Request<Incoming>) -> Result<Self, hyper::Error> {
        let (parts, body) = request.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
        })
    }

    /// The raw `Host` header value, if present and valid UTF-8.
    pub fn host(&self) -> Option<&str> {
        self.headers.get(header::HOST).and_then(|v| v.to_str().ok())
    }

    /// The request-target as it appeared on the request line.
    pub fn target(&self) -> String {
        self.uri.to_string()
    }

    /// Convert into a hyper request for sending upstream.
    pub fn into_hyper(self) -> Request<ProxyBody> {
        let mut request = Request::new(Full::new(self.body));
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers;
        strip_framing(request.headers_mut());
        request
    }
}

impl std::fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {:?}", self.method, self.uri, self.version)
    }
}

/// A fully buffered HTTP response. This is also the value stored in the cache.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// An empty response with the given status.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Collect any hyper response body into a buffered response.
    pub async fn collect<B>(response: Response<B>) -> Result<Self, B::Error>
    where
        B: Body,
    {
        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            body,
        })
    }

    /// Status line summary used in log events, e.g. `HTTP/1.1 200 OK`.
    pub fn status_line(&self) -> String {
        format!(
            "{:?} {} {}",
            self.version,
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("")
        )
    }

    /// Convert into a hyper response for writing to the client.
    ///
    /// The status line is always written as HTTP/1.1; the server connection
    /// decides the wire version.
    pub fn into_hyper(self) -> Response<ProxyBody> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        strip_framing(response.headers_mut());
        response
    }
}
