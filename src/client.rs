use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, StatusCode};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::types::{ChatRequest, ChatResponse};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
/// Environment variable consulted for the base URL.
pub const BASE_URL_ENV: &str = "CRCBOT_BASE_URL";
const CHAT_PATH: &str = "chat";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Something that can deliver one user message and return the reply text.
///
/// [`ChatClient`] is the HTTP implementation; the conversation store is
/// generic over this trait so it can be driven without a server. The store is
/// single-threaded, so implementations need not be `Send`.
#[async_trait::async_trait(?Send)]
pub trait ChatTransport {
    /// Send `message` and return the `response` field of the reply.
    ///
    /// Exactly one attempt is made.
    async fn send(&self, message: &str) -> Result<String>;
}

/// Client for the chatbot's `POST /chat` endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client.
    ///
    /// The base URL can be provided directly or read from the CRCBOT_BASE_URL
    /// environment variable, falling back to `http://localhost:3001`.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = resolve_base_url(base_url);
        let base_url = parse_base_url(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The normalized base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The full URL chat requests are posted to.
    pub fn endpoint(&self) -> Result<Url> {
        Ok(self.base_url.join(CHAT_PATH)?)
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    async fn post_chat(&self, message: &str) -> Result<String> {
        let url = self.endpoint()?;
        tracing::debug!(%url, bytes = message.len(), "posting chat message");

        let response = self
            .client
            .post(url)
            .headers(self.default_headers())
            .json(&ChatRequest::new(message))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(
                    format!("Timed out reading response: {}", e),
                    Some(self.timeout.as_secs_f64()),
                )
            } else {
                Error::http_client(format!("Failed to read response: {}", e), Some(Box::new(e)))
            }
        })?;

        parse_reply(status, &body)
    }
}

#[async_trait::async_trait(?Send)]
impl ChatTransport for ChatClient {
    async fn send(&self, message: &str) -> Result<String> {
        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let result = self.post_chat(message).await;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());
        if result.is_err() {
            CLIENT_REQUEST_ERRORS.click();
        }
        result
    }
}

fn resolve_base_url(explicit: Option<String>) -> String {
    choose_base_url(explicit, std::env::var(BASE_URL_ENV).ok())
}

/// First non-blank of the explicit value and the environment, else the default.
fn choose_base_url(explicit: Option<String>, from_env: Option<String>) -> String {
    let non_blank = |url: &String| !url.trim().is_empty();
    explicit
        .filter(non_blank)
        .or_else(|| from_env.filter(non_blank))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Parse a base URL and make sure relative joins land underneath it.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::url(
            format!("unsupported scheme {:?} in base URL", url.scheme()),
            None,
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Interpret a finished HTTP exchange.
///
/// Non-2xx is an API error carrying the body. A 2xx body that is not JSON is a
/// serialization error; JSON without a string `response` field is malformed.
fn parse_reply(status: StatusCode, body: &str) -> Result<String> {
    if !status.is_success() {
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        } else {
            body.to_string()
        };
        return Err(Error::api(status.as_u16(), message));
    }

    let value: serde_json::Value = serde_json::from_str(body)?;
    let reply: ChatResponse = serde_json::from_value(value).map_err(|e| {
        Error::malformed_response(format!("reply has no usable response field: {}", e))
    })?;
    Ok(reply.response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ChatClient::new(Some("http://localhost:3001".to_string())).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:3001/");
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(
            client.endpoint().unwrap().as_str(),
            "http://localhost:3001/chat"
        );

        let client = ChatClient::with_options(
            Some("https://bot.example.edu/api".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(
            client.endpoint().unwrap().as_str(),
            "https://bot.example.edu/api/chat"
        );
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn explicit_base_url_wins() {
        assert_eq!(
            resolve_base_url(Some("http://127.0.0.1:9000".to_string())),
            "http://127.0.0.1:9000"
        );
        assert_eq!(
            choose_base_url(
                Some("http://127.0.0.1:9000".to_string()),
                Some("http://10.0.0.5:3001".to_string()),
            ),
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn blank_base_url_falls_back_to_environment() {
        let from_env = Some("http://10.0.0.5:3001".to_string());
        assert_eq!(
            choose_base_url(Some(String::new()), from_env.clone()),
            "http://10.0.0.5:3001"
        );
        assert_eq!(
            choose_base_url(Some("  ".to_string()), from_env.clone()),
            "http://10.0.0.5:3001"
        );
        assert_eq!(choose_base_url(None, from_env), "http://10.0.0.5:3001");
        assert_eq!(
            choose_base_url(Some(String::new()), Some(" ".to_string())),
            DEFAULT_BASE_URL
        );
        assert_eq!(choose_base_url(None, None), DEFAULT_BASE_URL);
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(matches!(
            ChatClient::new(Some("not a url".to_string())),
            Err(Error::Url { .. })
        ));
        assert!(matches!(
            ChatClient::new(Some("ftp://x.edu/".to_string())),
            Err(Error::Url { .. })
        ));
    }

    #[test]
    fn parse_reply_success() {
        let reply = parse_reply(StatusCode::OK, r#"{"response":"Office hours are at noon."}"#);
        assert_eq!(reply.unwrap(), "Office hours are at noon.");
    }

    #[test]
    fn parse_reply_non_success_keeps_body() {
        let err = parse_reply(StatusCode::INTERNAL_SERVER_ERROR, "model crashed").unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.to_string(), "API error (500): model crashed");

        let err = parse_reply(StatusCode::NOT_FOUND, "").unwrap_err();
        assert_eq!(err.to_string(), "API error (404): Not Found");
    }

    #[test]
    fn parse_reply_not_json() {
        let err = parse_reply(StatusCode::OK, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
        assert!(err.is_transport());
    }

    #[test]
    fn parse_reply_missing_field() {
        let err = parse_reply(StatusCode::OK, r#"{"answer":"hi"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        assert!(err.is_transport());
    }
}
