//! In-process stand-in for a TGI server, used by unit tests.
//!
//! Accepts plain HTTP/1.1 on an ephemeral port, records each request, and
//! answers with whatever the handler returns for the request path. Bare
//! connect-and-close probes are tolerated and not recorded.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A canned response.
#[derive(Debug, Clone)]
pub(crate) struct FakeResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl FakeResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    /// An SSE body with one event per `(text, special)` token. The last event
    /// carries the concatenated non-special text as `generated_text`.
    pub fn sse(tokens: &[(&str, bool)]) -> Self {
        let full: String = tokens
            .iter()
            .filter(|(_, special)| !special)
            .map(|(text, _)| *text)
            .collect();

        let mut body = String::new();
        for (i, (text, special)) in tokens.iter().enumerate() {
            let generated_text = if i + 1 == tokens.len() {
                serde_json::Value::from(full.clone())
            } else {
                serde_json::Value::Null
            };
            let event = serde_json::json!({
                "index": i,
                "token": {"id": i, "text": text, "logprob": -0.1, "special": special},
                "generated_text": generated_text,
                "details": serde_json::Value::Null,
            });
            body.push_str(&format!("data:{event}\n\n"));
        }

        Self {
            status: 200,
            content_type: "text/event-stream",
            body,
        }
    }
}

/// A request as seen by the fake server.
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

type Handler = dyn Fn(&str) -> FakeResponse + Send + Sync;

pub(crate) struct FakeTgi {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl FakeTgi {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> FakeResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake TGI listener");
        let port = listener.local_addr().expect("local addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = requests.clone();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let recorded = recorded.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(socket, handler, recorded).await;
                });
            }
        });

        Self {
            port,
            requests,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Drop for FakeTgi {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    handler: Arc<Handler>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            // Readiness probe: connected and closed without sending anything.
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).into_owned();

    let response = (handler.as_ref())(path.as_str());
    recorded.lock().expect("requests lock").push(RecordedRequest {
        method,
        path,
        body,
    });

    let reply = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason_phrase(response.status),
        response.content_type,
        response.body.len(),
        response.body
    );
    socket.write_all(reply.as_bytes()).await?;
    socket.shutdown().await
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        422 => "Unprocessable Entity",
        424 => "Failed Dependency",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}
