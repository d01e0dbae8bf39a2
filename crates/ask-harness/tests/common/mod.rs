#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use ask_harness::{AskClient, AskConfig, Diagnostics, Frame, View};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpStream};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const COMPLETIONS_PATH: &str = "/api/v1/chat/completions";

/// View that keeps every call it receives.
#[derive(Debug, Default)]
pub struct RecordingView {
    pub question: Option<String>,
    pub frames: Vec<Frame>,
    pub releases: usize,
    pub clears: usize,
    pub finished: Option<Frame>,
}

impl View for RecordingView {
    fn show_question(&mut self, question: &str) -> io::Result<()> {
        self.question = Some(question.to_string());
        Ok(())
    }

    fn refresh(&mut self, frame: &Frame) -> io::Result<()> {
        assert!(self.finished.is_none(), "refresh after finish");
        self.frames.push(frame.clone());
        Ok(())
    }

    fn release(&mut self) -> io::Result<()> {
        self.releases += 1;
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.clears += 1;
        Ok(())
    }

    fn finish(&mut self, frame: &Frame) -> io::Result<()> {
        assert!(self.finished.is_none(), "finish called twice");
        self.finished = Some(frame.clone());
        Ok(())
    }
}

/// Unstyled diagnostics captured in memory.
pub fn diagnostics() -> Diagnostics<Vec<u8>> {
    Diagnostics::new(Vec::new(), false)
}

pub fn diagnostics_text(diag: Diagnostics<Vec<u8>>) -> String {
    String::from_utf8(diag.into_inner()).expect("utf8 diagnostics")
}

/// A chunk carrying `content` in its first choice.
pub fn content_chunk(content: &str) -> String {
    serde_json::json!({
        "id": "gen-test",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": content}}]
    })
    .to_string()
}

/// Builds an event-stream body from raw lines, one blank line after each.
pub fn sse_body<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|line| format!("{}\n\n", line.as_ref()))
        .collect()
}

pub fn stream_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream")
}

/// Serves `response` for every POST to the completions path.
pub async fn serve(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS_PATH))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

pub fn client_for(server: &MockServer) -> AskClient {
    let config =
        AskConfig::new("test-key").endpoint(format!("{}{COMPLETIONS_PATH}", server.uri()));
    AskClient::new(config).expect("client")
}

/// How a [`serve_partial`] server ends the response after its first chunk.
#[derive(Debug, Clone, Copy)]
pub enum Ending {
    /// Close the connection without the terminating chunk.
    Hangup,
    /// Keep the connection open and send nothing more.
    Stall(Duration),
}

/// Serves one chunked event-stream response that delivers `body` and then
/// ends as `ending` says. Returns the address to point the client at.
pub async fn serve_partial(body: String, ending: Ending) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        read_request(&mut socket).await;
        let head = "HTTP/1.1 200 OK\r\n\
                    Content-Type: text/event-stream\r\n\
                    Transfer-Encoding: chunked\r\n\r\n";
        let chunk = format!("{:x}\r\n{body}\r\n", body.len());
        socket.write_all(head.as_bytes()).await.expect("write head");
        socket.write_all(chunk.as_bytes()).await.expect("write chunk");
        socket.flush().await.expect("flush");
        match ending {
            Ending::Hangup => drop(socket),
            Ending::Stall(hold) => {
                tokio::time::sleep(hold).await;
                drop(socket);
            }
        }
    });
    addr
}

async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut scratch = [0u8; 1024];
    loop {
        let read = socket.read(&mut scratch).await.expect("read request");
        if read == 0 {
            return;
        }
        buf.extend_from_slice(&scratch[..read]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return;
        }
    }
}

pub fn client_at(addr: SocketAddr, timeout: Duration) -> AskClient {
    let config = AskConfig::new("test-key")
        .endpoint(format!("http://{addr}{COMPLETIONS_PATH}"))
        .timeout(timeout);
    AskClient::new(config).expect("client")
}
