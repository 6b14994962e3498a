//! Error Handling
//!
//! This module defines the crate's core error types: the top-level [`Error`]
//! enum, the [`GraphApiError`] payload describing errors reported by the
//! Graph API itself, and the [`ErrorKind`] classification derived from the
//! API's error codes and subcodes.

use std::error::Error as StdError;
use std::fmt;

use serde_json::{Map, Value};

/// The **top-level error enum** for the `instagram-graph-rs` crate.
///
/// This enum aggregates the categories of failure that can occur while
/// building, sending, and interpreting Graph API calls. It uses
/// `#[non_exhaustive]` to allow for future additions of error variants
/// without breaking client code.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The Graph API answered with an error payload.
    ///
    /// The wrapped [`GraphApiError`] carries the classified [`ErrorKind`],
    /// the upstream message, and the raw error codes for callers that need
    /// to branch on them.
    #[error("The Graph API returned an error: {0}")]
    Graph(Box<GraphApiError>),

    /// The transport failed before any Graph payload was available
    /// (connection refused, DNS failure, TLS error, timeout).
    ///
    /// Transport failures are never interpreted as Graph error bodies.
    #[error("A transport error occurred: {0}")]
    Transport(#[from] TransportError),

    /// A required credential could not be resolved before sending.
    #[error("Missing credentials: {0}")]
    MissingCredentials(MissingCredential),

    /// A batch held a number of requests outside the permitted `1..=50`.
    #[error("A batch must contain between 1 and 50 requests, but this one has {0}")]
    BatchSize(usize),

    /// Pagination was attempted on a request that did not use `GET`.
    #[error("You can only paginate on a GET request")]
    Pagination,

    /// An OAuth endpoint replied without the key the flow needs.
    #[error("The OAuth endpoint did not return `{missing}`")]
    TokenExchange {
        /// The wire key that was absent from the decoded reply.
        missing: &'static str,
    },

    /// Validation of the login redirect failed.
    ///
    /// Raised when the redirect URL carries no authorization code, or when
    /// its `state` value does not match the one persisted before the
    /// redirect (a cross-site request forgery indicator).
    #[error("Login redirect validation failed: {0}")]
    Csrf(&'static str),

    /// An **internal logic error** within the crate, or an error caused by
    /// invalid input that should have been caught earlier (e.g. a malformed
    /// base URL, or a serialization failure while composing a batch).
    #[error("An internal library error occurred: {0}")]
    Internal(BoxError),
}

impl Error {
    pub(crate) fn internal(err: impl Into<BoxError>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<GraphApiError> for Error {
    fn from(err: GraphApiError) -> Self {
        Self::Graph(Box::new(err))
    }
}

/// Identifies which credential was missing and where it was expected.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MissingCredential {
    /// No access token was set on the request and the client has no default.
    #[error("no access token was set on the request and no default is configured")]
    AccessToken,

    /// A batched request had no app and the batch itself has no fallback app.
    #[error("a batched request had no app and no fallback app is set on the batch")]
    BatchApp,

    /// A batched request had no access token and the batch has no fallback
    /// token.
    #[error("a batched request had no access token and no fallback token is set on the batch")]
    BatchAccessToken,

    /// A user access token was required but an app access token was given.
    #[error("a user access token is required here, not an app access token")]
    UserAccessToken,

    /// The operation needs an app but the client was built without one.
    #[error("the client was built without an app")]
    App,

    /// No app ID was supplied and the environment fallback is unset.
    #[error("no app ID was supplied and the INSTAGRAM_APP_ID environment variable is unset")]
    AppId,

    /// No app secret was supplied and the environment fallback is unset.
    #[error("no app secret was supplied and the INSTAGRAM_APP_SECRET environment variable is unset")]
    AppSecret,
}

/// A failure raised by the [`Transport`](crate::client::Transport) while
/// attempting to deliver a request.
///
/// This wraps whatever the underlying HTTP client reported. No response
/// reached the crate, so there is no status code or body to classify.
#[derive(thiserror::Error, Debug)]
#[error("{source}")]
#[non_exhaustive]
pub struct TransportError {
    #[source]
    pub(crate) source: BoxError,
}

impl TransportError {
    /// Wraps an arbitrary error from a transport implementation.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_builder() {
            // Request composition errors point to internal misconfiguration
            // or invalid input rather than a network condition.
            Self::internal(value)
        } else {
            Self::Transport(TransportError::new(value))
        }
    }
}

/// The classification of a Graph API error payload.
///
/// Selected from the API's `code` / `error_subcode` pair by an ordered rule
/// table (subcode rules take precedence over code rules, code tables over
/// the authorization range, and the range over the `OAuthException` type
/// fallback). Callers deciding on retry policy should treat [`Throttled`]
/// and [`ServerError`] as retryable and everything else as terminal.
///
/// [`Throttled`]: ErrorKind::Throttled
/// [`ServerError`]: ErrorKind::ServerError
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The access token is invalid, expired, or was revoked.
    Authentication,
    /// The token is valid but lacks a permission the call requires.
    Authorization,
    /// The app or user hit a rate limit; back off before retrying.
    Throttled,
    /// A transient upstream failure; the call may be retried.
    ServerError,
    /// The request itself was rejected as invalid.
    ClientError,
    /// A resumable upload session must be resumed or restarted.
    ResumableUpload {
        /// Byte offset the upload should resume from, when the API sent one.
        start_offset: Option<u64>,
        /// Byte offset the resumed chunk should end at.
        end_offset: Option<u64>,
    },
    /// Anything the rule table does not recognize.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Throttled => "throttled",
            Self::ServerError => "server error",
            Self::ClientError => "client error",
            Self::ResumableUpload { .. } => "resumable upload",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// An **error object returned by the Graph API** in a response body.
///
/// This is distinct from the crate's own [`Error`] enum: a `GraphApiError`
/// describes a failure the API itself reported, already classified into an
/// [`ErrorKind`]. It is constructed eagerly when an erroneous response is
/// decoded and surfaced at the send boundary, so a response object can still
/// be inspected without triggering the failure.
///
/// # Example (from a Graph API response)
/// ```json
/// {
///   "error": {
///     "message": "(#4) Application request limit reached",
///     "type": "OAuthException",
///     "code": 4,
///     "fbtrace_id": "A4K..."
///   }
/// }
/// ```
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct GraphApiError {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
    pub(crate) code: Option<i64>,
    pub(crate) subcode: Option<i64>,
    pub(crate) error_type: Option<String>,
    pub(crate) status: u16,
    pub(crate) raw_body: String,
}

impl GraphApiError {
    /// The classification derived from the error's codes.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The human-readable message the API sent, or
    /// `"Unknown error from Graph."` when it sent none.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The API's `code` field, if present.
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// The API's `error_subcode` field, if present.
    pub fn subcode(&self) -> Option<i64> {
        self.subcode
    }

    /// The API's `type` field (e.g. `"OAuthException"`), if present.
    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }

    /// The HTTP status code of the response that carried this error.
    pub fn http_status(&self) -> u16 {
        self.status
    }

    /// The unparsed response body, for logging and debugging.
    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    /// Classifies a decoded error payload.
    ///
    /// `body` is the full decoded response object. Replies from the token
    /// endpoints put `code`/`message` at the top level instead of under an
    /// `error` key; those are normalized to the nested shape before the
    /// rule table runs.
    pub(crate) fn classify(body: &Map<String, Value>, status: u16, raw_body: &str) -> Self {
        let nested_has_code = body
            .get("error")
            .and_then(Value::as_object)
            .is_some_and(|e| e.contains_key("code"));

        let empty = Map::new();
        let error: &Map<String, Value> = if !nested_has_code && body.contains_key("code") {
            body
        } else {
            body.get("error").and_then(Value::as_object).unwrap_or(&empty)
        };

        let code = error.get("code").and_then(int_value);
        let subcode = error.get("error_subcode").and_then(int_value);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error from Graph.")
            .to_owned();
        let error_type = error
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let kind = match subcode {
            Some(458 | 459 | 460 | 463 | 464 | 467) => ErrorKind::Authentication,
            Some(1363030 | 1363019 | 1363033 | 1363021 | 1363041) => ErrorKind::ResumableUpload {
                start_offset: None,
                end_offset: None,
            },
            Some(1363037) => {
                let data = error.get("error_data").and_then(Value::as_object);
                let offset = |key| {
                    data.and_then(|d| d.get(key))
                        .and_then(int_value)
                        .and_then(|n| u64::try_from(n).ok())
                };
                ErrorKind::ResumableUpload {
                    start_offset: offset("start_offset"),
                    end_offset: offset("end_offset"),
                }
            }
            _ => match code {
                Some(100 | 102 | 190) => ErrorKind::Authentication,
                Some(1 | 2) => ErrorKind::ServerError,
                Some(4 | 17 | 32 | 341 | 613) => ErrorKind::Throttled,
                Some(506) => ErrorKind::ClientError,
                Some(10 | 200..=299) => ErrorKind::Authorization,
                _ => match error_type.as_deref() {
                    Some("OAuthException") => ErrorKind::Authentication,
                    _ => ErrorKind::Other,
                },
            },
        };

        Self {
            kind,
            message,
            code,
            subcode,
            error_type,
            status,
            raw_body: raw_body.to_owned(),
        }
    }
}

impl fmt::Display for GraphApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;

        if let Some(code) = self.code {
            write!(f, " (code: {code}")?;
            if let Some(subcode) = self.subcode {
                write!(f, ", subcode: {subcode}")?;
            }
            write!(f, ")")?;
        }

        if let Some(error_type) = &self.error_type {
            write!(f, " (type: {error_type})")?;
        }

        write!(f, " (HTTP {})", self.status)
    }
}

/// Reads an integer that the API may send as a number or as a numeric
/// string (resumable-upload offsets in particular arrive as `"10"`).
pub(crate) fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// A convenient type alias for a boxed, trait-object error that can be sent
/// across threads.
pub type BoxError = Box<dyn StdError + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(body: Value, status: u16) -> GraphApiError {
        let raw = body.to_string();
        let map = body.as_object().cloned().unwrap_or_default();
        GraphApiError::classify(&map, status, &raw)
    }

    #[test]
    fn code_tables_select_the_kind() {
        let cases = [
            (100, ErrorKind::Authentication),
            (102, ErrorKind::Authentication),
            (190, ErrorKind::Authentication),
            (1, ErrorKind::ServerError),
            (2, ErrorKind::ServerError),
            (4, ErrorKind::Throttled),
            (17, ErrorKind::Throttled),
            (32, ErrorKind::Throttled),
            (341, ErrorKind::Throttled),
            (613, ErrorKind::Throttled),
            (506, ErrorKind::ClientError),
            (10, ErrorKind::Authorization),
            (200, ErrorKind::Authorization),
            (210, ErrorKind::Authorization),
            (299, ErrorKind::Authorization),
        ];
        for (code, expected) in cases {
            let err = classify(json!({"error": {"code": code, "message": "m"}}), 400);
            assert_eq!(*err.kind(), expected, "code {code}");
        }
    }

    #[test]
    fn subcode_takes_precedence_over_code() {
        // code 4 alone means throttled; subcode 460 turns it into an
        // authentication failure.
        let err = classify(
            json!({"error": {"code": 4, "error_subcode": 460, "message": "m"}}),
            401,
        );
        assert_eq!(*err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn resumable_upload_subcodes() {
        let err = classify(json!({"error": {"error_subcode": 1363033}}), 400);
        assert_eq!(
            *err.kind(),
            ErrorKind::ResumableUpload {
                start_offset: None,
                end_offset: None
            }
        );

        let err = classify(
            json!({"error": {
                "error_subcode": 1363037,
                "error_data": {"start_offset": "10", "end_offset": "20"}
            }}),
            400,
        );
        assert_eq!(
            *err.kind(),
            ErrorKind::ResumableUpload {
                start_offset: Some(10),
                end_offset: Some(20)
            }
        );
    }

    #[test]
    fn oauth_exception_type_is_the_last_resort() {
        let err = classify(
            json!({"error": {"type": "OAuthException", "message": "bad"}}),
            401,
        );
        assert_eq!(*err.kind(), ErrorKind::Authentication);

        // A recognized code wins over the type string.
        let err = classify(
            json!({"error": {"code": 4, "type": "OAuthException"}}),
            401,
        );
        assert_eq!(*err.kind(), ErrorKind::Throttled);
    }

    #[test]
    fn flat_token_endpoint_errors_are_normalized() {
        let err = classify(
            json!({"code": 190, "message": "Invalid OAuth access token."}),
            401,
        );
        assert_eq!(*err.kind(), ErrorKind::Authentication);
        assert_eq!(err.code(), Some(190));
        assert_eq!(err.message(), "Invalid OAuth access token.");
    }

    #[test]
    fn unknown_payloads_fall_back_to_other() {
        let err = classify(json!({"error": {"code": 999}}), 500);
        assert_eq!(*err.kind(), ErrorKind::Other);
        assert_eq!(err.message(), "Unknown error from Graph.");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn numeric_strings_count_as_codes() {
        let err = classify(json!({"error": {"code": "190"}}), 401);
        assert_eq!(*err.kind(), ErrorKind::Authentication);
        assert_eq!(err.code(), Some(190));
    }
}
