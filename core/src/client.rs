//! Stateless HTTP request builder and response parser for the Shelf API.
//!
//! # Design
//! `ApiClient` holds a `base_url` and the `SessionContext` it signs with,
//! and carries no mutable state between calls. `build_request` turns an
//! `Endpoint` into an `HttpRequest`; the `parse_*` methods classify an
//! `HttpResponse` and decode its body. The round-trip in between belongs to
//! a `Transport` or to the host, keeping this half deterministic.

use reqwest::Url;
use serde_json::Value;

use crate::decode::Decode;
use crate::dispatch::{decode_tagged, SearchHit};
use crate::endpoint::{AuthScope, Endpoint, Params};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, ResponseMeta};
use crate::session::SessionContext;

pub const API_TOKEN_HEADER: &str = "x-api-token";

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(base_url: &str, session: SessionContext) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Same base URL, different credentials.
    #[must_use]
    pub fn with_session(&self, session: SessionContext) -> Self {
        Self {
            base_url: self.base_url.clone(),
            session,
        }
    }

    /// Assemble the wire request for `endpoint`, signed per its scope.
    ///
    /// # Errors
    /// `MissingApiToken`, `MissingUser` or `MissingUserToken` when the
    /// session cannot sign the request; `InvalidRequest` when the URL does
    /// not parse.
    pub fn build_request(&self, endpoint: &Endpoint) -> Result<HttpRequest, ApiError> {
        let mut headers = vec![
            (API_TOKEN_HEADER.to_string(), self.session.api_token_header()?.to_string()),
            ("accept".to_string(), "application/json".to_string()),
        ];
        if endpoint.auth == AuthScope::User {
            headers.push(("authorization".to_string(), self.session.basic_credential()?));
        }

        let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint.path))
            .map_err(|e| ApiError::InvalidRequest(format!("{}{}: {e}", self.base_url, endpoint.path)))?;

        let body = match &endpoint.params {
            Params::None => None,
            Params::Query(pairs) => {
                url.query_pairs_mut().extend_pairs(pairs);
                None
            }
            Params::Json(value) => {
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(value.to_string())
            }
        };

        Ok(HttpRequest {
            method: endpoint.method,
            url: url.to_string(),
            headers,
            body,
        })
    }

    /// Decode a single-entity response.
    pub fn parse_one<T: Decode>(&self, response: HttpResponse) -> Result<T, ApiError> {
        let (json, meta) = parse_json(response)?;
        T::decode_one(&json, &meta).map_err(|e| ApiError::UnableToSerializeItem(e.to_string()))
    }

    /// Decode a list response, dropping malformed elements.
    pub fn parse_many<T: Decode>(&self, response: HttpResponse) -> Result<Vec<T>, ApiError> {
        let (json, meta) = parse_json(response)?;
        let raw = expect_array(&json)?;
        Ok(T::decode_many(raw, &meta))
    }

    /// Decode a mixed-kind list tagged by `type`.
    pub fn parse_tagged(&self, response: HttpResponse) -> Result<Vec<SearchHit>, ApiError> {
        let (json, meta) = parse_json(response)?;
        let raw = expect_array(&json)?;
        Ok(decode_tagged(raw, &meta))
    }

    /// Accept any success status without reading the body.
    pub fn parse_unit(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

/// Classify the status and parse the body as JSON.
pub fn parse_json(response: HttpResponse) -> Result<(Value, ResponseMeta), ApiError> {
    check_status(&response)?;
    let json = serde_json::from_slice(&response.body)
        .map_err(|e| ApiError::UnableToSerializeJson(e.to_string()))?;
    Ok((json, response.meta()))
}

fn expect_array(json: &Value) -> Result<&[Value], ApiError> {
    json.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| ApiError::UnableToSerializeItem("expected a JSON array".to_string()))
}

/// Map a non-success status to `ServerError`, pulling `message` and `code`
/// out of the body when it is a JSON object.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let body: Option<Value> = serde_json::from_slice(&response.body).ok();
    let field = |name: &str| -> Option<String> {
        match body.as_ref()?.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };
    let err = ApiError::ServerError {
        status: response.status,
        message: field("message"),
        code: field("code"),
    };
    tracing::warn!(status = response.status, error = %err, "API rejected request");
    Err(err)
}
