use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::api::types::CollectionIdError;
use crate::digest::DigestError;
use crate::errors::RequestFailure;

/// Underlying failure kept inside every [`VBaseApiError`].
#[derive(Debug, Error)]
pub enum Cause {
    #[error(transparent)]
    Request(#[from] RequestFailure),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid content digest: {0}")]
    Digest(#[from] DigestError),

    #[error("Invalid collection id: {0}")]
    CollectionId(#[from] CollectionIdError),

    #[error("{0} cannot be a base URL")]
    CannotBeBase(Url),

    #[error("No API key configured")]
    MissingApiKey,

    #[error("{0}")]
    Input(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    NotFound,
    Validation,
    ServiceUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "AuthenticationError"),
            Self::NotFound => write!(f, "NotFoundError"),
            Self::Validation => write!(f, "ValidationError"),
            Self::ServiceUnavailable => write!(f, "ServiceUnavailableError"),
        }
    }
}

/// Every failure the client reports. Match on the variant (or
/// [`VBaseApiError::kind`]) to handle one kind, or treat it as a whole.
#[derive(Debug, Error)]
pub enum VBaseApiError {
    #[error("[E001] Authentication failed: {0}{}", render(ErrorKind::Authentication, .0))]
    Authentication(#[source] Cause),

    #[error("[E002] Not found: {0}{}", render(ErrorKind::NotFound, .0))]
    NotFound(#[source] Cause),

    #[error("[E003] Invalid request: {0}{}", render(ErrorKind::Validation, .0))]
    Validation(#[source] Cause),

    #[error("[E004] Service unavailable: {0}{}", render(ErrorKind::ServiceUnavailable, .0))]
    ServiceUnavailable(#[source] Cause),
}

impl Cause {
    /// HTTP status of the failed exchange, if the service answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request(failure) => Some(failure.status),
            Self::Transport(err) => err.status(),
            _ => None,
        }
    }
}

fn suggestions_for(kind: ErrorKind, cause: &Cause) -> Vec<&'static str> {
    match kind {
        ErrorKind::Authentication => vec![
            "Check that the API key is set and has not expired",
            "Set VBASE_API_KEY or pass the key in the client configuration",
            "Confirm the key has the scopes this operation needs",
        ],
        ErrorKind::NotFound => vec![
            "Check that the collection id is correct",
            "Verify the collection belongs to the account of this API key",
            "List your collections to see the available ids",
        ],
        ErrorKind::Validation => {
            let mut suggestions =
                vec!["Fix the request before retrying, it will fail the same way again"];

            match cause {
                Cause::Digest(_) => suggestions.push(
                    "Content digests are 32-byte SHA-256 hashes written as 64 hex digits, optionally prefixed with 0x",
                ),
                Cause::CollectionId(_) => suggestions.push(
                    "Collection ids may only contain letters, digits and `_.:-`, and can't be dots only",
                ),
                Cause::CannotBeBase(_) => suggestions.push(
                    "Use an absolute http:// or https:// base URL, e.g. https://app.vbase.com/api/v1/",
                ),
                _ => {}
            }

            suggestions
        }
        ErrorKind::ServiceUnavailable => {
            let mut suggestions = vec![
                "Retry the request, stamp creation is idempotent and safe to repeat",
                "Check your network connection and the configured base URL",
            ];

            if matches!(cause, Cause::Transport(err) if err.is_timeout()) {
                suggestions.push("Increase the request timeout if the service is slow to answer");
            }

            if matches!(cause.status(), Some(StatusCode::TOO_MANY_REQUESTS)) {
                suggestions.push("Reduce request frequency to stay within the account rate limit");
            }

            suggestions
        }
    }
}

fn render(kind: ErrorKind, cause: &Cause) -> String {
    let mut out = String::from("\n\nSuggestions:");
    for suggestion in suggestions_for(kind, cause) {
        out.push_str("\n  • ");
        out.push_str(suggestion);
    }
    out
}

impl VBaseApiError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
        }
    }

    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "E001",
            Self::NotFound(_) => "E002",
            Self::Validation(_) => "E003",
            Self::ServiceUnavailable(_) => "E004",
        }
    }

    pub const fn cause(&self) -> &Cause {
        match self {
            Self::Authentication(cause)
            | Self::NotFound(cause)
            | Self::Validation(cause)
            | Self::ServiceUnavailable(cause) => cause,
        }
    }

    /// Only transient failures are worth repeating.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }

    /// HTTP status of the failed exchange, if the service answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        self.cause().status()
    }

    /// The same suggestions the `Display` output lists.
    pub fn suggestions(&self) -> Vec<&'static str> {
        suggestions_for(self.kind(), self.cause())
    }

    /// Maps a non-success response onto the error taxonomy.
    pub fn from_failure(failure: RequestFailure) -> Self {
        let status = failure.status;
        let cause = Cause::from(failure);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Authentication(cause),
            StatusCode::NOT_FOUND => Self::NotFound(cause),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                Self::ServiceUnavailable(cause)
            }
            s if s.is_client_error() => Self::Validation(cause),
            _ => Self::ServiceUnavailable(cause),
        }
    }

    /// Connection, timeout and body-read failures are all transient.
    pub fn transport(err: reqwest::Error) -> Self {
        Self::ServiceUnavailable(Cause::Transport(err))
    }

    pub fn decode(url: Url, source: serde_json::Error) -> Self {
        Self::ServiceUnavailable(Cause::Decode { url, source })
    }
}

impl From<RequestFailure> for VBaseApiError {
    fn from(failure: RequestFailure) -> Self {
        Self::from_failure(failure)
    }
}

impl From<DigestError> for VBaseApiError {
    fn from(err: DigestError) -> Self {
        Self::Validation(Cause::Digest(err))
    }
}

impl From<CollectionIdError> for VBaseApiError {
    fn from(err: CollectionIdError) -> Self {
        Self::Validation(Cause::CollectionId(err))
    }
}
