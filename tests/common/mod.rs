#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatai::config::Config;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the fake gateway sends back for every request
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: &'static str,
    /// Wait before the status line is written
    pub head_delay: Duration,
    /// Body pieces, each written after its delay
    pub chunks: Vec<(Duration, String)>,
}

impl CannedResponse {
    /// `200 OK` event stream with one `data:` line per fragment, then `[DONE]`.
    pub fn sse(fragments: &[&str]) -> Self {
        let mut chunks: Vec<(Duration, String)> = fragments
            .iter()
            .map(|f| (Duration::ZERO, sse_data(f)))
            .collect();
        chunks.push((Duration::ZERO, "data: [DONE]\n\n".to_string()));
        Self::raw_sse(chunks)
    }

    pub fn raw_sse(chunks: Vec<(Duration, String)>) -> Self {
        Self {
            status: 200,
            reason: "OK",
            content_type: "text/event-stream",
            head_delay: Duration::ZERO,
            chunks,
        }
    }

    pub fn error(status: u16, reason: &'static str, body: &str) -> Self {
        Self {
            status,
            reason,
            content_type: "application/json",
            head_delay: Duration::ZERO,
            chunks: vec![(Duration::ZERO, body.to_string())],
        }
    }
}

/// `data:` line carrying one content delta
pub fn sse_data(content: &str) -> String {
    let chunk = serde_json::json!({ "choices": [{ "delta": { "content": content } }] });
    format!("data: {chunk}\n\n")
}

#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub request_line: String,
    /// Header names lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start(response: CannedResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let addr = listener.local_addr().expect("test server addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        let handle = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let response = response.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    serve(socket, response, recorded).await;
                });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    /// Default configuration pointed at this server.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.base_url = self.base_url();
        config.set_api_key("sk-test".to_string());
        config
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    mut socket: TcpStream,
    response: CannedResponse,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    recorded.lock().expect("requests lock").push(request);

    tokio::time::sleep(response.head_delay).await;
    let head = format!(
        "HTTP/1.1 {} {}\r\ncontent-type: {}\r\nconnection: close\r\n\r\n",
        response.status, response.reason, response.content_type
    );
    if socket.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    for (delay, chunk) in response.chunks {
        tokio::time::sleep(delay).await;
        if socket.write_all(chunk.as_bytes()).await.is_err() {
            return;
        }
        let _ = socket.flush().await;
    }
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_lowercase(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buffer.len() < head_end + content_length {
        let read = socket.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    let body_end = buffer.len().min(head_end + content_length);
    let body = String::from_utf8_lossy(&buffer[head_end..body_end]).to_string();

    Some(RecordedRequest {
        request_line,
        headers,
        body,
    })
}

/// A local address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind throwaway listener");
    let addr = listener.local_addr().expect("throwaway addr");
    drop(listener);
    addr
}
