//! Shared utilities for proxy integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use caching_proxy::cache::ResponseCache;
use caching_proxy::net::Listener;
use caching_proxy::policy::format_http_date;
use caching_proxy::{HttpServer, ProxyConfig, Shutdown};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A running proxy bound to an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub cache: Arc<ResponseCache>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A reqwest client that sends every request through this proxy on a
    /// fresh connection.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::http(self.url()).unwrap())
            .pool_max_idle_per_host(0)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a proxy on 127.0.0.1 with room for `capacity` cached responses.
pub async fn start_proxy(capacity: usize) -> TestProxy {
    start_proxy_with(|config| config.cache.capacity = capacity).await
}

/// Start a proxy on 127.0.0.1 after applying `configure` to the test defaults.
pub async fn start_proxy_with(configure: impl FnOnce(&mut ProxyConfig)) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.connect_secs = 2;
    config.timeouts.shutdown_secs = 1;
    configure(&mut config);

    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config);
    let cache = server.cache();

    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestProxy {
        addr,
        cache,
        shutdown,
    }
}

/// A mock origin server that records every request head it receives.
pub struct MockOrigin {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockOrigin {
    /// Start an origin whose reply to the n-th request (0-based) is produced
    /// by `respond(n)`. The connection is closed after each reply.
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(usize) -> String + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let respond = Arc::new(respond);

        let (recorded, counter) = (Arc::clone(&requests), Arc::clone(&calls));
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let (recorded, counter, respond) =
                    (Arc::clone(&recorded), Arc::clone(&counter), Arc::clone(&respond));
                tokio::spawn(async move {
                    let Some(request) = read_request(&mut socket).await else {
                        return;
                    };
                    recorded.lock().push(request);
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    let _ = socket.write_all(respond(n).as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            addr,
            requests,
            calls,
        }
    }

    /// An origin that always returns the same response.
    pub async fn fixed(response: String) -> Self {
        Self::start(move |_| response.clone()).await
    }

    /// An origin that accepts and then drops every connection without replying.
    pub async fn dropping() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                drop(socket);
            }
        });
        Self {
            addr,
            requests: Arc::default(),
            calls: Arc::default(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Number of complete requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Request heads and bodies in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

/// Read one request (head plus Content-Length body) as text.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < head_end + content_length {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    Some(String::from_utf8_lossy(&data).to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Start a TCP server that echoes back everything it reads.
pub async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// An address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Open a CONNECT tunnel to `target` and return the stream and the response head.
pub async fn open_tunnel(proxy: SocketAddr, target: SocketAddr) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let head = read_head(&mut stream).await.unwrap();
    (stream, head)
}

/// Read a response head byte by byte so nothing after it is consumed.
pub async fn read_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await?;
        head.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&head).to_string())
}

/// Write `payload` into a tunnel and read the same number of bytes back.
pub async fn echo_through(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    stream.write_all(payload).await.unwrap();
    let mut echoed = vec![0u8; payload.len()];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut echoed))
        .await
        .unwrap()
        .unwrap();
    echoed
}

/// Send raw bytes to the proxy and read until it closes the connection.
pub async fn raw_exchange(proxy: SocketAddr, request: &str) -> std::io::Result<String> {
    let mut stream = TcpStream::connect(proxy).await?;
    stream.write_all(request.as_bytes()).await?;
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "proxy kept connection open"))??;
    Ok(String::from_utf8_lossy(&response).to_string())
}

/// Build an origin response with a body and extra header lines.
pub fn response(status: &str, headers: &[(&str, String)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {}\r\n", status);
    for (name, value) in headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n{}", body.len(), body));
    out
}

/// An HTTP date `offset_secs` seconds before now.
pub fn date_ago(offset_secs: u64) -> String {
    format_http_date(SystemTime::now() - Duration::from_secs(offset_secs))
}
