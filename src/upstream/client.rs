//! Single-exchange HTTP/1.1 client over a freshly opened TCP connection.

use std::time::Duration;

use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::http::message::{HttpRequest, HttpResponse};

/// Failures talking to the origin server.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("failed to connect to {authority}: {source}")]
    Connect {
        authority: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {authority} after {timeout:?}")]
    ConnectTimeout { authority: String, timeout: Duration },

    #[error("HTTP handshake with upstream failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("upstream exchange failed: {0}")]
    Exchange(#[source] hyper::Error),

    #[error("failed to read upstream response body: {0}")]
    Body(#[source] hyper::Error),
}

/// An open connection to an origin server.
#[derive(Debug)]
pub struct UpstreamConnection {
    stream: TcpStream,
    authority: String,
}

impl UpstreamConnection {
    /// Resolve `host` and connect to it on `port`.
    pub async fn connect(
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Self, UpstreamError> {
        let authority = format!("{}:{}", host, port);
        let connect = TcpStream::connect((host, port));

        let result = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect).await.map_err(|_| {
                UpstreamError::ConnectTimeout {
                    authority: authority.clone(),
                    timeout,
                }
            })?,
            None => connect.await,
        };

        let stream = result.map_err(|source| UpstreamError::Connect {
            authority: authority.clone(),
            source,
        })?;
        let _ = stream.set_nodelay(true);

        tracing::debug!(upstream = %authority, "Connected to upstream");
        Ok(Self { stream, authority })
    }

    /// `host:port` this connection was opened to.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Write `request` in full and read exactly one complete response.
    pub async fn send_and_receive(self, request: HttpRequest) -> Result<HttpResponse, UpstreamError> {
        let io = TokioIo::new(self.stream);
        let (mut sender, connection) = http1::Builder::new()
            .preserve_header_case(true)
            .title_case_headers(true)
            .handshake(io)
            .await
            .map_err(UpstreamError::Handshake)?;

        let authority = self.authority;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(upstream = %authority, error = %e, "Upstream connection ended with error");
            }
        });

        let response = sender
            .send_request(request.into_hyper())
            .await
            .map_err(UpstreamError::Exchange)?;

        HttpResponse::collect(response).await.map_err(UpstreamError::Body)
    }

    /// Give up HTTP framing and hand out the raw socket.
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}
