//! Fixtures shared by the unit tests: characters, messages, pinned
//! clock/entropy, and a tiny HTTP server that records what it receives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::character::{Character, DialogueExample};
use crate::core::entropy::{Clock, Entropy};
use crate::core::message::{Message, Sender};

pub fn character_with_examples(examples: &[(&str, &str)]) -> Character {
    Character {
        id: "user-alice".to_string(),
        name: "Alice".to_string(),
        description: "A helpful assistant".to_string(),
        personality: "Friendly, curious".to_string(),
        tags: vec!["helpful".to_string(), "kind".to_string()],
        dialogue_examples: examples
            .iter()
            .map(|(user, character)| DialogueExample {
                user: user.to_string(),
                character: character.to_string(),
            })
            .collect(),
        ..Character::default()
    }
}

static MESSAGE_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub fn message(sender: Sender, content: &str) -> Message {
    let n = MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    Message::new(format!("msg-test-{n}"), sender, content, fixed_time())
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(fixed_time())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Replays the given values in a loop.
pub struct ScriptedEntropy {
    values: Vec<u32>,
    cursor: AtomicUsize,
}

impl ScriptedEntropy {
    pub fn new(values: &[u32]) -> Self {
        assert!(!values.is_empty(), "scripted entropy needs at least one value");
        Self {
            values: values.to_vec(),
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Entropy for ScriptedEntropy {
    fn next_u32(&self) -> u32 {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.values[index % self.values.len()]
    }
}

/// Counts upward so every generated id is distinct.
#[derive(Default)]
pub struct CountingEntropy(AtomicUsize);

impl Entropy for CountingEntropy {
    fn next_u32(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) as u32
    }
}

#[derive(Debug, Clone)]
pub struct StubResponse {
    status: u16,
    body: String,
    delay: Duration,
}

impl StubResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    /// Header lookup by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Serve `response` to every request until the test's runtime shuts down.
pub async fn spawn_stub_server(response: StubResponse) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let recorded = Arc::clone(&recorded);
            let response = response.clone();
            tokio::spawn(async move {
                let _ = serve_connection(stream, &response, &recorded).await;
            });
        }
    });

    StubServer { addr, requests }
}

async fn serve_connection(
    mut stream: TcpStream,
    response: &StubResponse,
    recorded: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    while buffer.len() < header_end + content_length {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    let body_end = buffer.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buffer[header_end..body_end]).to_string();

    recorded.lock().unwrap().push(RecordedRequest {
        method,
        path,
        headers,
        body,
    });

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let reply = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    stream.write_all(reply.as_bytes()).await?;
    stream.shutdown().await
}
