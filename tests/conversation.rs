//! End-to-end tests for the conversation flow.
//!
//! The HTTP tests run a one-shot server on a local port; nothing leaves the
//! machine.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crcbot::chat::{ConversationStore, PlainTextRenderer, attach};
use crcbot::{ChatClient, ChatTransport, Error, Message, MessageKind, Result};

struct Scripted {
    replies: RefCell<VecDeque<Result<String>>>,
}

impl Scripted {
    fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl ChatTransport for Scripted {
    async fn send(&self, _message: &str) -> Result<String> {
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(Error::connection("no scripted reply", None)))
    }
}

/// Accept one connection, answer it, and hand back the raw request.
async fn serve_once(status_line: &'static str, body: String) -> (SocketAddr, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        let request = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(request) = complete_request(&buf) {
                break request;
            }
            if n == 0 {
                break String::from_utf8_lossy(&buf).into_owned();
            }
        };
        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });
    (addr, handle)
}

fn complete_request(buf: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(buf).ok()?;
    let (head, body) = text.split_once("\r\n\r\n")?;
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    (body.len() >= length).then(|| text.to_string())
}

fn client_for(addr: SocketAddr) -> ChatClient {
    ChatClient::with_options(
        Some(format!("http://{addr}")),
        Some(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn transcript_renders_and_scrolls_with_each_append() {
    let store = ConversationStore::new(Scripted::new(vec![
        Ok("Office hours are Tuesday at noon.".to_string()),
        Ok("Here: http://x.edu/syllabus.pdf".to_string()),
    ]));
    let renderer = Rc::new(RefCell::new(
        PlainTextRenderer::with_writer(Vec::new(), false).with_user_echo(true),
    ));
    attach(&store, Rc::clone(&renderer));

    store.submit("office hours?").await.unwrap();
    assert_eq!(renderer.borrow().scrolled_to(), 2);
    store.submit("syllabus please").await.unwrap();
    assert_eq!(renderer.borrow().scrolled_to(), 4);

    let output = String::from_utf8(renderer.borrow().get_ref().clone()).unwrap();
    assert_eq!(
        output,
        "You: office hours?\n\
         Chatbot is thinking...\n\
         Chatbot: Office hours are Tuesday at noon.\n\
         You: syllabus please\n\
         Chatbot is thinking...\n\
         Chatbot: [Download Paper] Here: http://x.edu/syllabus.pdf\n"
    );
}

#[tokio::test]
async fn failed_request_renders_no_reply() {
    let store = ConversationStore::new(Scripted::new(vec![Err(Error::api(503, "down"))]));
    let renderer = Rc::new(RefCell::new(
        PlainTextRenderer::with_writer(Vec::new(), false).with_user_echo(true),
    ));
    attach(&store, Rc::clone(&renderer));

    assert!(store.submit("hello").await.unwrap_err().is_transport());
    let output = String::from_utf8(renderer.borrow().get_ref().clone()).unwrap();
    assert_eq!(output, "You: hello\nChatbot is thinking...\n");
    assert_eq!(store.history(), vec![Message::user("hello")]);
}

#[tokio::test]
async fn posts_raw_message_and_classifies_reply() {
    let (addr, server) = serve_once(
        "HTTP/1.1 200 OK",
        r#"{"response":"https://x.edu/notes.docx"}"#.to_string(),
    )
    .await;
    let store = ConversationStore::new(client_for(addr));

    let reply = store.submit("  lecture notes ").await.unwrap();
    assert_eq!(
        reply,
        Some(Message::bot("https://x.edu/notes.docx", MessageKind::DocumentLink))
    );

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /chat HTTP/1.1\r\n"));
    assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
    assert!(request.ends_with(r#"{"message":"  lecture notes "}"#));
    assert_eq!(
        store.history(),
        vec![
            Message::user("lecture notes"),
            Message::bot("https://x.edu/notes.docx", MessageKind::DocumentLink),
        ]
    );
}

#[tokio::test]
async fn non_success_status_is_a_failure() {
    let (addr, server) =
        serve_once("HTTP/1.1 500 Internal Server Error", "{}".to_string()).await;
    let store = ConversationStore::new(client_for(addr));

    let err = store.submit("hello").await.unwrap_err();
    assert_eq!(err.status_code(), Some(500));
    server.await.unwrap();
    assert!(!store.is_pending());
    assert_eq!(store.history(), vec![Message::user("hello")]);
}

#[tokio::test]
async fn missing_response_field_is_a_failure() {
    let (addr, server) =
        serve_once("HTTP/1.1 200 OK", r#"{"reply":"hi"}"#.to_string()).await;
    let store = ConversationStore::new(client_for(addr));

    let err = store.submit("hello").await.unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }));
    server.await.unwrap();
    assert_eq!(store.message_count(), 1);
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let store = ConversationStore::new(client_for(addr));
    store.set_draft("anyone there?");

    let err = store.submit_draft().await.unwrap_err();
    assert!(err.is_connection(), "unexpected error: {err}");
    assert!(!store.is_pending());
    assert_eq!(store.draft(), "");
    assert_eq!(store.history(), vec![Message::user("anyone there?")]);
}

#[tokio::test]
async fn slow_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });
    let client = ChatClient::with_options(
        Some(format!("http://{addr}")),
        Some(Duration::from_millis(200)),
    )
    .unwrap();
    let store = ConversationStore::new(client);

    let err = store.submit("hello").await.unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(!store.is_pending());
    server.abort();
}
