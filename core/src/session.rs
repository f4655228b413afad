//! Credentials injected into every request build.
//!
//! A `SessionContext` is a value, not process-wide state: the client that
//! holds it signs every request with exactly these credentials, and signing
//! out means building a new context rather than mutating a shared one.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::ApiError;

/// The authenticated user a session signs requests for.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: u64,
    pub token: Option<String>,
}

impl SessionUser {
    pub fn new(id: u64, token: impl Into<String>) -> Self {
        Self {
            id,
            token: Some(token.into()),
        }
    }
}

impl fmt::Debug for SessionUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionUser")
            .field("id", &self.id)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// API token plus the optional signed-in user.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    api_token: Option<String>,
    user: Option<SessionUser>,
}

impl SessionContext {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: Some(api_token.into()),
            user: None,
        }
    }

    /// A context with neither token nor user.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, user: SessionUser) -> Self {
        self.user = Some(user);
        self
    }

    /// Same API token, no user.
    #[must_use]
    pub fn signed_out(&self) -> Self {
        Self {
            api_token: self.api_token.clone(),
            user: None,
        }
    }

    #[must_use]
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Value of the `x-api-token` header.
    pub fn api_token_header(&self) -> Result<&str, ApiError> {
        self.api_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingApiToken)
    }

    /// Value of the `authorization` header: `Basic base64(id:token)`.
    pub fn basic_credential(&self) -> Result<String, ApiError> {
        let user = self.user.as_ref().ok_or(ApiError::MissingUser)?;
        let token = user
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingUserToken)?;
        let encoded = STANDARD.encode(format!("{}:{token}", user.id));
        Ok(format!("Basic {encoded}"))
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("user", &self.user)
            .finish()
    }
}
