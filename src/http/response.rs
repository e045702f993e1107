//! Responses the proxy generates itself.
//!
//! # Design Decisions
//! - Error responses carry no body; the status line says it all
//! - Upstream transport failures map to 502 Bad Gateway
//! - Anything the proxy cannot parse or route maps to 400 Bad Request

use hyper::{StatusCode, Version};

use crate::http::message::HttpResponse;

/// 400, answered in the client's own protocol version.
pub fn bad_request(version: Version) -> HttpResponse {
    let mut response = HttpResponse::empty(StatusCode::BAD_REQUEST);
    response.version = version;
    response
}

/// 502, sent when the origin could not produce a complete response.
pub fn bad_gateway() -> HttpResponse {
    HttpResponse::empty(StatusCode::BAD_GATEWAY)
}

/// `200 OK` sent before switching a CONNECT request into a tunnel.
pub fn connection_established() -> HttpResponse {
    HttpResponse::empty(StatusCode::OK)
}
