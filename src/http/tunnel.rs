//! CONNECT tunnel relay.
//!
//! # Data Flow
//! ```text
//! Client ←──── opaque bytes ────→ Proxy ←──── opaque bytes ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - One copy loop per direction, both polled by a single `select!`
//! - The first direction to end (EOF or error) ends the tunnel
//! - Both write halves are shut down before the sockets drop
//! - Bytes are never inspected

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::observability::metrics;

const BUFFER_SIZE: usize = 16 * 1024;

/// Which peer ended the tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedBy {
    Client,
    Upstream,
}

/// Summary of a finished tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelStats {
    pub client_to_upstream: u64,
    pub upstream_to_client: u64,
    pub closed_by: ClosedBy,
}

/// Relay bytes between `client` and `upstream` until either side closes.
///
/// I/O errors end the tunnel the same way EOF does; they are logged, never
/// returned.
pub async fn relay<C, U>(client: C, upstream: U) -> TunnelStats
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut upstream_read, mut upstream_write) = tokio::io::split(upstream);

    let mut client_to_upstream = 0u64;
    let mut upstream_to_client = 0u64;

    let (closed_by, result) = tokio::select! {
        result = pump(&mut client_read, &mut upstream_write, &mut client_to_upstream) => {
            (ClosedBy::Client, result)
        }
        result = pump(&mut upstream_read, &mut client_write, &mut upstream_to_client) => {
            (ClosedBy::Upstream, result)
        }
    };
    if let Err(e) = result {
        tracing::debug!(error = %e, ?closed_by, "Tunnel I/O error");
    }

    let _ = upstream_write.shutdown().await;
    let _ = client_write.shutdown().await;

    metrics::record_tunnel_bytes("client_to_upstream", client_to_upstream);
    metrics::record_tunnel_bytes("upstream_to_client", upstream_to_client);

    TunnelStats {
        client_to_upstream,
        upstream_to_client,
        closed_by,
    }
}

/// Copy until `reader` reaches EOF, counting relayed bytes as they are written.
async fn pump<R, W>(reader: &mut R, writer: &mut W, relayed: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *relayed += n as u64;
    }
}
