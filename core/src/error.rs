//! Error types for the Shelf API client.
//!
//! # Design
//! `ApiError` has one variant per outcome the pipeline can classify: three
//! authentication preconditions, a deliberate cancellation, two transport
//! failures, a server rejection carrying its status code, and two "the body
//! was unusable" cases. `DecodeError` is narrower: it describes why a single
//! raw record could not become an entity, and never escapes a list decode.

use thiserror::Error;

/// Errors settled by the request/response pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No API token is configured, so no request can be authenticated.
    #[error("missing API token")]
    MissingApiToken,

    /// The endpoint needs a signed-in user and the session has none.
    #[error("no user is signed in")]
    MissingUser,

    /// The session user has no token to sign requests with.
    #[error("signed-in user has no token")]
    MissingUserToken,

    /// The request was cancelled by its owner.
    #[error("request cancelled")]
    UserCancelled,

    /// No HTTP response could be reached.
    #[error("offline: {0}")]
    Offline(String),

    /// The transport failed for a reason other than connectivity.
    #[error("network error: {0}")]
    Network(String),

    /// The API answered with a non-success status.
    #[error("server error {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    ServerError {
        status: u16,
        message: Option<String>,
        code: Option<String>,
    },

    /// A success response whose body is not valid JSON.
    #[error("unable to parse response JSON: {0}")]
    UnableToSerializeJson(String),

    /// Valid JSON that does not describe the expected entity or list.
    #[error("unable to decode response item: {0}")]
    UnableToSerializeItem(String),

    /// The outbound request could not be assembled.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status of a server rejection.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Whether the credentials were rejected (expired or revoked token).
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Whether retrying the same request could plausibly succeed. The SDK
    /// itself never retries; this is for callers.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Offline(_) | Self::Network(_) => true,
            Self::ServerError { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

/// Why a raw record could not be decoded into an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("missing mandatory field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not a valid {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display_includes_message_when_present() {
        let err = ApiError::ServerError {
            status: 404,
            message: Some("collection not found".to_string()),
            code: None,
        };
        assert_eq!(err.to_string(), "server error 404: collection not found");

        let bare = ApiError::ServerError {
            status: 500,
            message: None,
            code: None,
        };
        assert_eq!(bare.to_string(), "server error 500");
    }

    #[test]
    fn status_predicates() {
        let not_found = ApiError::ServerError {
            status: 404,
            message: None,
            code: None,
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_unauthorized());
        assert!(!not_found.is_transient());

        let expired = ApiError::ServerError {
            status: 401,
            message: None,
            code: Some("token_expired".to_string()),
        };
        assert!(expired.is_unauthorized());
        assert_eq!(expired.status(), Some(401));
    }

    #[test]
    fn transient_classification() {
        assert!(ApiError::Offline("no route".to_string()).is_transient());
        assert!(ApiError::ServerError {
            status: 503,
            message: None,
            code: None
        }
        .is_transient());
        assert!(!ApiError::UserCancelled.is_transient());
        assert!(!ApiError::MissingApiToken.is_transient());
        assert!(ApiError::UserCancelled.is_cancelled());
    }
}
