//! Error types for chatfold.
//!
//! Transport failures (the request could not be made, the server refused it,
//! or the body broke off mid-stream) are propagated to the caller.  Malformed
//! stream segments are represented too, but the decoder only ever logs them.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// The main error type for chatfold.
#[derive(Clone, Debug)]
pub enum Error {
    /// The endpoint answered with a non-success status not covered below.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Human-readable error message.
        message: String,
    },

    /// Bad request due to invalid parameters (HTTP 400).
    BadRequest {
        /// Human-readable error message.
        message: String,
    },

    /// The endpoint does not exist (HTTP 404).
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// The request timed out, locally or as reported by the server.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
        /// HTTP status, when the server reported the timeout (408).
        status_code: Option<u16>,
    },

    /// Connection error.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Server returned a 500 internal error.
    InternalServer {
        /// Human-readable error message.
        message: String,
    },

    /// Server is overloaded or a gateway in front of it failed (HTTP 502-504).
    ServiceUnavailable {
        /// Human-readable error message.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
        /// HTTP status (502, 503 or 504) when the server reported it.
        status_code: Option<u16>,
    },

    /// HTTP client error.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The response arrived without a body to stream, or the body broke off.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A single stream segment carried a `data:` line that was not valid JSON.
    MalformedEvent {
        /// Human-readable error message.
        message: String,
        /// The raw segment text.
        segment: String,
    },

    /// Error during JSON serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during validation of request parameters (client side or HTTP 422).
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
        /// HTTP status, when the server rejected the request (422).
        status_code: Option<u16>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            message: message.into(),
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
            status_code: None,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new internal server error.
    pub fn internal_server(message: impl Into<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
        }
    }

    /// Creates a new service unavailable error.
    pub fn service_unavailable(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::ServiceUnavailable {
            message: message.into(),
            retry_after,
            status_code: None,
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new malformed event error.
    pub fn malformed_event(message: impl Into<String>, segment: impl Into<String>) -> Self {
        Error::MalformedEvent {
            message: message.into(),
            segment: segment.into(),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
            status_code: None,
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Record the HTTP status the server answered with.
    ///
    /// Only variants that can arise both locally and from a response keep it;
    /// the others already imply their status and are returned unchanged.
    pub fn with_status_code(mut self, code: u16) -> Self {
        match &mut self {
            Error::Timeout { status_code, .. }
            | Error::ServiceUnavailable { status_code, .. }
            | Error::Validation { status_code, .. } => *status_code = Some(code),
            _ => {}
        }
        self
    }

    /// Returns true if this error means the request or its response stream failed.
    ///
    /// A transport error aborts the current turn.  The conversation keeps
    /// whatever had been applied before the failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Api { .. }
                | Error::BadRequest { .. }
                | Error::NotFound { .. }
                | Error::Timeout { .. }
                | Error::Connection { .. }
                | Error::InternalServer { .. }
                | Error::ServiceUnavailable { .. }
                | Error::HttpClient { .. }
                | Error::Streaming { .. }
        )
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if this error is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns true if this error is a malformed stream segment.
    pub fn is_malformed_event(&self) -> bool {
        matches!(self, Error::MalformedEvent { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if this error is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Error::InternalServer { .. } | Error::ServiceUnavailable { .. }
        )
    }

    /// Returns true if resubmitting the whole turn could plausibly succeed.
    ///
    /// Nothing in this crate retries; the hint is for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status_code, .. } => {
                matches!(status_code, 408 | 409 | 429 | 500..=599)
            }
            Error::Timeout { .. } => true,
            Error::Connection { .. } => true,
            Error::Streaming { .. } => true,
            Error::ServiceUnavailable { .. } => true,
            Error::InternalServer { .. } => true,
            _ => false,
        }
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            Error::BadRequest { .. } => Some(400),
            Error::NotFound { .. } => Some(404),
            Error::InternalServer { .. } => Some(500),
            Error::Timeout { status_code, .. }
            | Error::ServiceUnavailable { status_code, .. }
            | Error::Validation { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                message,
            } => {
                write!(f, "API error ({status_code}): {message}")
            }
            Error::BadRequest { message } => {
                write!(f, "Bad request: {message}")
            }
            Error::NotFound { message } => {
                write!(f, "Not found: {message}")
            }
            Error::Timeout {
                message, duration, ..
            } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::Connection { message, .. } => {
                write!(f, "Connection error: {message}")
            }
            Error::InternalServer { message } => {
                write!(f, "Internal server error: {message}")
            }
            Error::ServiceUnavailable {
                message,
                retry_after,
                ..
            } => {
                if let Some(retry_after) = retry_after {
                    write!(
                        f,
                        "Service unavailable: {message} (retry after {retry_after} seconds)"
                    )
                } else {
                    write!(f, "Service unavailable: {message}")
                }
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
            Error::Streaming { message, .. } => {
                write!(f, "Streaming error: {message}")
            }
            Error::MalformedEvent { message, .. } => {
                write!(f, "Malformed stream event: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Validation { message, param, .. } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Streaming { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for chatfold operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(Error::connection("refused", None).is_transport());
        assert!(Error::api(418, "teapot").is_transport());
        assert!(Error::streaming("response has no body", None).is_transport());
        assert!(!Error::malformed_event("bad json", "data: {").is_transport());
        assert!(!Error::validation("empty", None).is_transport());
    }

    #[test]
    fn retryable_statuses() {
        assert!(Error::api(429, "slow down").is_retryable());
        assert!(Error::api(503, "busy").is_retryable());
        assert!(!Error::api(418, "teapot").is_retryable());
        assert!(!Error::bad_request("nope").is_retryable());
    }

    #[test]
    fn display_includes_context() {
        let err = Error::validation("message too long", Some("message".to_string()));
        assert_eq!(
            err.to_string(),
            "Validation error: message too long (parameter: message)"
        );
        assert_eq!(
            Error::api(418, "teapot").to_string(),
            "API error (418): teapot"
        );
        assert_eq!(Error::bad_request("x").status_code(), Some(400));
    }

    #[test]
    fn reported_statuses_are_kept() {
        let gateway = Error::service_unavailable("bad gateway", None).with_status_code(502);
        let busy = Error::service_unavailable("busy", Some(3)).with_status_code(503);
        assert_eq!(gateway.status_code(), Some(502));
        assert_eq!(busy.status_code(), Some(503));
        assert_eq!(
            Error::validation("bad body", None)
                .with_status_code(422)
                .status_code(),
            Some(422)
        );
        assert_eq!(
            Error::timeout("slow", None).with_status_code(408).status_code(),
            Some(408)
        );
        // Local failures carry no status.
        assert_eq!(Error::timeout("slow", Some(60.0)).status_code(), None);
        assert_eq!(Error::validation("empty", None).status_code(), None);
        // Variants that imply their status ignore the override.
        assert_eq!(
            Error::bad_request("x").with_status_code(499).status_code(),
            Some(400)
        );
    }

    #[test]
    fn json_errors_keep_source() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Serialization { .. }));
        assert!(error::Error::source(&err).is_some());
    }
}
