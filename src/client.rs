use std::env;
use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::decode_events;
use crate::types::{
    ChatPayload, ChatResponse, ChatStreamRequest, Conversation, ErrorDetail, HealthStatus,
    MAX_CHAT_MESSAGE_CHARS, StreamEvent,
};

/// Endpoint used when neither the caller nor the environment names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";
/// Environment variable consulted for the endpoint.
pub const ENDPOINT_ENV_VAR: &str = "CHATFOLD_ENDPOINT";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw response body of a streaming chat request.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Something that can carry a conversation to the chat endpoint and hand back
/// the raw response body.
///
/// Implementations perform exactly one request per call and never retry.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send the whole conversation and return the response body.
    async fn open_stream(&self, conversation: &Conversation) -> Result<ByteStream>;
}

/// HTTP client for the chat backend.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new chat client.
    ///
    /// The base URL can be provided directly or read from the `CHATFOLD_ENDPOINT`
    /// environment variable; otherwise `http://localhost:8000/` is used.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds connecting and waiting for response headers.  It does
    /// not bound how long a response body may keep streaming.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url,
            None => env::var(ENDPOINT_ENV_VAR).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        };
        let base_url = parse_base_url(&base_url)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL all endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The connect and response-header timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn request_error(&self, e: reqwest::Error) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Send a request, waiting at most `timeout` for the response headers.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| {
                CLIENT_REQUEST_ERRORS.click();
                Error::timeout(
                    "Timed out waiting for response headers",
                    Some(self.timeout.as_secs_f64()),
                )
            })?
            .map_err(|e| self.request_error(e))?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(error = %err, "chat endpoint returned an error status");
            return Err(err);
        }
        Ok(response)
    }

    /// Process error responses and convert them to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let status_code = status.as_u16();

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let error_message = serde_json::from_str::<ErrorDetail>(&error_body)
            .ok()
            .and_then(|detail| detail.message())
            .unwrap_or_else(|| {
                if error_body.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                } else {
                    error_body.clone()
                }
            });

        match status_code {
            400 => Error::bad_request(error_message),
            404 => Error::not_found(error_message),
            408 => Error::timeout(error_message, None).with_status_code(status_code),
            422 => Error::validation(error_message, None).with_status_code(status_code),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(error_message, retry_after)
                .with_status_code(status_code),
            _ => Error::api(status_code, error_message),
        }
    }

    /// Check that the backend is up.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self.endpoint("")?;
        let response = self
            .execute(self.client.get(url).headers(Self::default_headers()))
            .await?;
        response.json::<HealthStatus>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse health response: {e}"),
                Some(Box::new(e)),
            )
        })
    }

    /// Send one message without history and wait for the complete reply.
    ///
    /// The message must contain something other than whitespace and be at most
    /// 2000 characters long.  Both are checked before any request is made.
    pub async fn send(&self, message: &str) -> Result<String> {
        validate_chat_message(message)?;
        let url = self.endpoint("chat")?;
        let payload = ChatPayload {
            message: message.to_string(),
        };
        let response = self
            .execute(
                self.client
                    .post(url)
                    .headers(Self::default_headers())
                    .json(&payload),
            )
            .await?;
        let reply = response.json::<ChatResponse>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )
        })?;
        Ok(reply.response)
    }

    /// Send the conversation and decode the streamed reply.
    pub async fn stream(
        &self,
        conversation: &Conversation,
    ) -> Result<impl Stream<Item = Result<StreamEvent>> + use<>> {
        let body = self.open_stream(conversation).await?;
        Ok(decode_events(body))
    }
}

#[async_trait::async_trait]
impl Transport for ChatClient {
    async fn open_stream(&self, conversation: &Conversation) -> Result<ByteStream> {
        let url = self.endpoint("chat/stream")?;
        let mut headers = Self::default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        tracing::debug!(messages = conversation.len(), %url, "opening chat stream");

        let response = self
            .execute(
                self.client
                    .post(url)
                    .headers(headers)
                    .json(&ChatStreamRequest::new(conversation)),
            )
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Error::streaming("response has no body", None));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Box::pin(body))
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(Error::url(format!("{raw} cannot be used as a base URL"), None));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Check a message against the single-shot endpoint's limits.
pub fn validate_chat_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(Error::validation(
            "User message cannot be empty",
            Some("message".to_string()),
        ));
    }
    let chars = message.chars().count();
    if chars > MAX_CHAT_MESSAGE_CHARS {
        return Err(Error::validation(
            format!("message is {chars} characters; the limit is {MAX_CHAT_MESSAGE_CHARS}"),
            Some("message".to_string()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::chat::{ChatArgs, ChatConfig, ChatSession, ConfigFile};

    // Held by every test that reads or writes CHATFOLD_ENDPOINT.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_endpoint_env<R>(value: Option<&str>, f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let previous = env::var(ENDPOINT_ENV_VAR).ok();
        // SAFETY: the variable is only touched while ENV_LOCK is held.
        unsafe {
            match value {
                Some(value) => env::set_var(ENDPOINT_ENV_VAR, value),
                None => env::remove_var(ENDPOINT_ENV_VAR),
            }
        }
        let result = f();
        // SAFETY: as above.
        unsafe {
            match previous {
                Some(previous) => env::set_var(ENDPOINT_ENV_VAR, previous),
                None => env::remove_var(ENDPOINT_ENV_VAR),
            }
        }
        result
    }

    #[test]
    fn endpoint_falls_back_to_environment_then_default() {
        let from_env =
            with_endpoint_env(Some("http://from-env:8000"), || ChatClient::new(None)).unwrap();
        assert_eq!(from_env.base_url().as_str(), "http://from-env:8000/");

        let explicit = with_endpoint_env(Some("http://from-env:8000"), || {
            ChatClient::new(Some("http://explicit:9000".to_string()))
        })
        .unwrap();
        assert_eq!(explicit.base_url().as_str(), "http://explicit:9000/");

        let default = with_endpoint_env(None, || ChatClient::new(None)).unwrap();
        assert_eq!(default.base_url().as_str(), DEFAULT_BASE_URL);
    }

    #[test]
    fn config_file_endpoint_beats_environment() {
        let file = ConfigFile::from_yaml_str("endpoint: http://from-file:8000/\n").unwrap();
        let session = with_endpoint_env(Some("http://from-env:8000"), || {
            ChatSession::new(ChatConfig::merge(ChatArgs::default(), Some(file)))
        })
        .unwrap();
        assert_eq!(
            session.transport().base_url().as_str(),
            "http://from-file:8000/"
        );

        let session = with_endpoint_env(Some("http://from-env:8000"), || {
            ChatSession::new(ChatConfig::merge(ChatArgs::default(), None))
        })
        .unwrap();
        assert_eq!(session.transport().base_url().as_str(), "http://from-env:8000/");
    }

    #[test]
    fn client_creation() {
        let client = ChatClient::new(Some("http://chat.example.com:9000".to_string())).unwrap();
        assert_eq!(client.base_url().as_str(), "http://chat.example.com:9000/");
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);

        let client = ChatClient::with_options(
            Some("http://chat.example.com/api".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.base_url().as_str(), "http://chat.example.com/api/");
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn endpoints_resolve_under_the_base_path() {
        let client = ChatClient::new(Some("http://chat.example.com/api".to_string())).unwrap();
        assert_eq!(
            client.endpoint("chat/stream").unwrap().as_str(),
            "http://chat.example.com/api/chat/stream"
        );
        assert_eq!(
            client.endpoint("").unwrap().as_str(),
            "http://chat.example.com/api/"
        );
    }

    #[test]
    fn invalid_base_url() {
        let err = ChatClient::new(Some("not a url".to_string())).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
        let err = ChatClient::new(Some("mailto:someone@example.com".to_string())).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
    }

    #[test]
    fn chat_message_validation() {
        assert!(validate_chat_message("hello").is_ok());
        assert!(validate_chat_message("   \n").unwrap_err().is_validation());
        assert!(validate_chat_message(&"é".repeat(2000)).is_ok());
        assert!(
            validate_chat_message(&"x".repeat(2001))
                .unwrap_err()
                .is_validation()
        );
    }

    #[tokio::test]
    async fn send_validates_before_any_request() {
        // Nothing listens on port 9; validation must fail first.
        let client = ChatClient::new(Some("http://127.0.0.1:9/".to_string())).unwrap();
        let err = client.send("  ").await.unwrap_err();
        assert!(err.is_validation());
    }
}
