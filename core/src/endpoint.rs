//! Endpoint descriptors for the Shelf API.
//!
//! An `Endpoint` says what to call and how its parameters travel; turning
//! it into an `HttpRequest` (base URL, headers, credentials) is the
//! `ApiClient`'s job. `Params` is a sum type, so a parameter set is encoded
//! either in the query string or in the body, never both.

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::models::{Credentials, NewComment, NewItem, NewReaction, Registration};

/// How an endpoint's parameters are encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    None,
    Query(Vec<(String, String)>),
    Json(Value),
}

/// Which credentials a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScope {
    /// API token only: login and registration.
    ApiToken,
    /// API token plus the signed-in user's Basic credential.
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
    pub params: Params,
    pub auth: AuthScope,
}

impl Endpoint {
    fn get(path: String) -> Self {
        Self {
            method: HttpMethod::Get,
            path,
            params: Params::None,
            auth: AuthScope::User,
        }
    }

    fn paged(path: String, page: u32, per_page: u32) -> Self {
        Self::get(path).with_query(vec![
            ("page".to_string(), page.to_string()),
            ("per_page".to_string(), per_page.to_string()),
        ])
    }

    fn with_body<B: Serialize>(method: HttpMethod, path: String, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            method,
            path,
            params: Params::Json(value),
            auth: AuthScope::User,
        })
    }

    fn with_query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.params = Params::Query(pairs);
        self
    }

    fn unsigned(mut self) -> Self {
        self.auth = AuthScope::ApiToken;
        self
    }

    pub fn login(credentials: &Credentials) -> Result<Self, ApiError> {
        Ok(Self::with_body(HttpMethod::Post, "/login".to_string(), credentials)?.unsigned())
    }

    pub fn register(registration: &Registration) -> Result<Self, ApiError> {
        Ok(Self::with_body(HttpMethod::Post, "/users".to_string(), registration)?.unsigned())
    }

    #[must_use]
    pub fn current_user() -> Self {
        Self::get("/users/me".to_string())
    }

    #[must_use]
    pub fn collections(page: u32, per_page: u32) -> Self {
        Self::paged("/collections".to_string(), page, per_page)
    }

    #[must_use]
    pub fn collection(id: u64) -> Self {
        Self::get(format!("/collections/{id}"))
    }

    #[must_use]
    pub fn collection_items(collection_id: u64, page: u32, per_page: u32) -> Self {
        Self::paged(format!("/collections/{collection_id}/items"), page, per_page)
    }

    pub fn create_item(collection_id: u64, item: &NewItem) -> Result<Self, ApiError> {
        Self::with_body(HttpMethod::Post, format!("/collections/{collection_id}/items"), item)
    }

    #[must_use]
    pub fn item(id: u64) -> Self {
        Self::get(format!("/items/{id}"))
    }

    #[must_use]
    pub fn delete_item(id: u64) -> Self {
        Self {
            method: HttpMethod::Delete,
            ..Self::get(format!("/items/{id}"))
        }
    }

    #[must_use]
    pub fn item_comments(item_id: u64, page: u32, per_page: u32) -> Self {
        Self::paged(format!("/items/{item_id}/comments"), page, per_page)
    }

    pub fn create_comment(item_id: u64, comment: &NewComment) -> Result<Self, ApiError> {
        Self::with_body(HttpMethod::Post, format!("/items/{item_id}/comments"), comment)
    }

    #[must_use]
    pub fn item_reactions(item_id: u64, page: u32, per_page: u32) -> Self {
        Self::paged(format!("/items/{item_id}/reactions"), page, per_page)
    }

    pub fn add_reaction(item_id: u64, reaction: &NewReaction) -> Result<Self, ApiError> {
        Self::with_body(HttpMethod::Post, format!("/items/{item_id}/reactions"), reaction)
    }

    #[must_use]
    pub fn invites(page: u32, per_page: u32) -> Self {
        Self::paged("/invites".to_string(), page, per_page)
    }

    /// Full-text search; the reply is a tagged list.
    #[must_use]
    pub fn search(query: &str, page: u32, per_page: u32) -> Self {
        Self::get("/search".to_string()).with_query(vec![
            ("q".to_string(), query.to_string()),
            ("page".to_string(), page.to_string()),
            ("per_page".to_string(), per_page.to_string()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn login_and_register_are_unsigned_json_posts() {
        let login = Endpoint::login(&Credentials {
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
        })
        .unwrap();
        assert_eq!(login.method, HttpMethod::Post);
        assert_eq!(login.auth, AuthScope::ApiToken);
        assert_eq!(login.params, Params::Json(json!({"email": "a@b.c", "password": "pw"})));

        let register = Endpoint::register(&Registration {
            username: "ab".to_string(),
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
        })
        .unwrap();
        assert_eq!(register.path, "/users");
        assert_eq!(register.auth, AuthScope::ApiToken);
    }

    #[test]
    fn paged_endpoints_use_query_params() {
        let ep = Endpoint::collection_items(4, 2, 25);
        assert_eq!(ep.method, HttpMethod::Get);
        assert_eq!(ep.path, "/collections/4/items");
        assert_eq!(ep.auth, AuthScope::User);
        assert_eq!(
            ep.params,
            Params::Query(vec![
                ("page".to_string(), "2".to_string()),
                ("per_page".to_string(), "25".to_string()),
            ])
        );
    }

    #[test]
    fn delete_item_is_signed_and_bodyless() {
        let ep = Endpoint::delete_item(11);
        assert_eq!(ep.method, HttpMethod::Delete);
        assert_eq!(ep.path, "/items/11");
        assert_eq!(ep.params, Params::None);
        assert_eq!(ep.auth, AuthScope::User);
    }
}
