//! Shared utilities for integration testing.
//!
//! The fake upstream speaks raw HTTP/1.1 over TCP so tests control framing
//! exactly: declared lengths, chunk timing, truncation and stalls.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use render_mcp_proxy::{HttpServer, ProxyConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const TEST_API_KEY: &str = "rnd_test_key";
pub const TEST_SECRET: &str = "s3cret";

/// `{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}` gzipped.
pub const GZIP_TOOLS_LIST: &[u8] = &[
    31, 139, 8, 0, 0, 0, 0, 0, 2, 3, 171, 86, 202, 42, 206, 207, 43, 42, 72, 86, 178, 82, 50, 210,
    51, 80, 210, 81, 202, 76, 81, 178, 50, 212, 81, 42, 74, 45, 46, 205, 41, 81, 178, 170, 86, 42,
    201, 207, 207, 41, 86, 178, 138, 142, 173, 173, 5, 0, 118, 114, 230, 182, 46, 0, 0, 0,
];
pub const TOOLS_LIST: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#;

/// A request as the upstream saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Recorded {
    /// All values of `name`, lowercase match.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).into_iter().next()
    }
}

/// Scripted upstream behavior, applied to every connection.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Complete response with `Content-Length`.
    Full {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: Vec<u8>,
    },
    /// Chunked response; each chunk is written after its delay. With
    /// `hold_open` the stream never ends and keeps sending comment pings.
    Chunked {
        headers: Vec<(&'static str, String)>,
        chunks: Vec<(Duration, Vec<u8>)>,
        hold_open: bool,
    },
    /// Read the request, never answer.
    Hang,
    /// Declare `declared` bytes, send fewer, then close.
    Truncated { declared: usize, body: Vec<u8> },
    /// Event stream that sends `first`, waits `gap`, then closes without
    /// the terminating chunk.
    BrokenStream { first: Vec<u8>, gap: Duration },
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Reply::Full {
            status,
            headers: vec![("Content-Type", "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn sse(chunks: Vec<(u64, &str)>, hold_open: bool) -> Self {
        Reply::Chunked {
            headers: vec![("Content-Type", "text/event-stream".to_string())],
            chunks: chunks
                .into_iter()
                .map(|(ms, c)| (Duration::from_millis(ms), c.as_bytes().to_vec()))
                .collect(),
            hold_open,
        }
    }

    pub fn gzip_json() -> Self {
        Reply::Full {
            status: 200,
            headers: vec![
                ("Content-Type", "application/json".to_string()),
                ("Content-Encoding", "gzip".to_string()),
            ],
            body: GZIP_TOOLS_LIST.to_vec(),
        }
    }
}

/// Scripted upstream on an ephemeral port.
pub struct FakeUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
    closed: Arc<Notify>,
}

impl FakeUpstream {
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Notify::new());

        let recorded = requests.clone();
        let notify = closed.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let reply = reply.clone();
                let recorded = recorded.clone();
                let notify = notify.clone();
                tokio::spawn(async move {
                    serve_connection(socket, reply, recorded, notify).await;
                });
            }
        });

        Self {
            addr,
            requests,
            closed,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/mcp", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("upstream saw no request")
    }

    /// Whether a held-open stream saw its connection closed within `within`.
    pub async fn wait_closed(&self, within: Duration) -> bool {
        tokio::time::timeout(within, self.closed.notified()).await.is_ok()
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    reply: Reply,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    closed: Arc<Notify>,
) {
    let request = match read_request(&mut socket).await {
        Some(r) => r,
        None => return,
    };
    recorded.lock().unwrap().push(request);

    match reply {
        Reply::Full {
            status,
            headers,
            body,
        } => {
            let mut head = format!("HTTP/1.1 {}\r\n", status_line(status));
            for (name, value) in &headers {
                head.push_str(&format!("{}: {}\r\n", name, value));
            }
            head.push_str(&format!(
                "Content-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            ));
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
        Reply::Chunked {
            headers,
            chunks,
            hold_open,
        } => {
            let mut head = "HTTP/1.1 200 OK\r\n".to_string();
            for (name, value) in &headers {
                head.push_str(&format!("{}: {}\r\n", name, value));
            }
            head.push_str("Transfer-Encoding: chunked\r\n\r\n");
            if socket.write_all(head.as_bytes()).await.is_err() {
                closed.notify_one();
                return;
            }
            for (delay, chunk) in chunks {
                tokio::time::sleep(delay).await;
                if write_chunk(&mut socket, &chunk).await.is_err() {
                    closed.notify_one();
                    return;
                }
            }
            if !hold_open {
                let _ = socket.write_all(b"0\r\n\r\n").await;
                let _ = socket.shutdown().await;
                return;
            }
            hold_until_closed(socket).await;
            closed.notify_one();
        }
        Reply::Hang => {
            let mut buf = [0u8; 1024];
            while let Ok(n) = socket.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
            closed.notify_one();
        }
        Reply::Truncated { declared, body } => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                declared
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        }
        Reply::BrokenStream { first, gap } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n";
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = write_chunk(&mut socket, &first).await;
            tokio::time::sleep(gap).await;
            let _ = socket.shutdown().await;
        }
    }
}

// Pings keep the relay writing so a vanished caller surfaces as a write error.
async fn hold_until_closed(mut socket: TcpStream) {
    let mut buf = [0u8; 1024];
    loop {
        tokio::select! {
            read = socket.read(&mut buf) => match read {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            },
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if write_chunk(&mut socket, b": ping\n\n").await.is_err() {
                    return;
                }
            }
        }
    }
}

async fn write_chunk(socket: &mut TcpStream, chunk: &[u8]) -> std::io::Result<()> {
    socket
        .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
        .await?;
    socket.write_all(chunk).await?;
    socket.write_all(b"\r\n").await?;
    socket.flush().await
}

async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = data[header_end + 4..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }

    Some(Recorded {
        method,
        path,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        202 => "202 Accepted",
        400 => "400 Bad Request",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Config pointing at `upstream_url` with a key, a secret and a short deadline.
pub fn proxy_config(upstream_url: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.upstream.url = upstream_url.to_string();
    config.upstream.api_key = Some(TEST_API_KEY.to_string());
    config.upstream.timeout_ms = 5_000;
    config.security.path_secret = Some(TEST_SECRET.to_string());
    config
}

/// A proxy serving on an ephemeral port.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestProxy {
    pub async fn start(config: ProxyConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = HttpServer::new(config, shutdown.clone()).unwrap();
        let handle = tokio::spawn(async move {
            let _ = server.run(listener).await;
        });
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// The relay endpoint behind the test secret.
    pub fn mcp_url(&self) -> String {
        self.url(&format!("/mcp/{}", TEST_SECRET))
    }

    /// Cancel the shutdown token and wait for the server to stop.
    pub async fn stop(self, within: Duration) -> bool {
        self.shutdown.cancel();
        tokio::time::timeout(within, self.handle).await.is_ok()
    }
}

/// Client that neither proxies nor negotiates compression.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .no_gzip()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// An address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/mcp", addr)
}

/// Write `request` verbatim and read until the proxy closes the connection.
pub async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    String::from_utf8_lossy(&response).to_string()
}
