//! A small in-memory rendition of the Shelf REST API.
//!
//! Every route checks the `x-api-token` header; all but login and
//! registration also require `authorization: Basic base64(id:token)`.
//! Lists take `page` and `per_page` query parameters. Errors are JSON
//! objects with `message` and `code`.

pub mod data;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

use data::{
    Account, CommentRecord, Db, ItemRecord, LoginInput, NewCommentInput, NewItemInput, NewReactionInput,
    ReactionRecord, RegisterInput,
};

pub const DEFAULT_API_TOKEN: &str = "test-api-token";
const DEFAULT_PER_PAGE: usize = 20;

pub struct AppState {
    api_token: String,
    db: RwLock<Db>,
}

type Shared = Arc<AppState>;
type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;

pub fn app() -> Router {
    app_with_token(DEFAULT_API_TOKEN)
}

pub fn app_with_token(api_token: &str) -> Router {
    let state = Arc::new(AppState {
        api_token: api_token.to_string(),
        db: RwLock::new(Db::seeded()),
    });
    Router::new()
        .route("/login", post(login))
        .route("/users", post(register))
        .route("/users/me", get(current_user))
        .route("/collections", get(list_collections))
        .route("/collections/{id}", get(get_collection))
        .route("/collections/{id}/items", get(list_items).post(create_item))
        .route("/items/{id}", get(get_item).delete(delete_item))
        .route("/items/{id}/comments", get(list_comments).post(create_comment))
        .route("/items/{id}/reactions", get(list_reactions).post(add_reaction))
        .route("/invites", get(list_invites))
        .route("/search", get(search))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_token(listener: TcpListener, api_token: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_token(api_token)).await
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<usize>,
    per_page: Option<usize>,
}

impl PageQuery {
    fn slice<T: Clone>(&self, all: &[T]) -> Vec<T> {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1);
        all.iter().skip((page - 1).saturating_mul(per_page)).take(per_page).cloned().collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: String,
    page: Option<usize>,
    per_page: Option<usize>,
}

fn error(status: StatusCode, code: &str, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({"message": message, "code": code})))
}

fn check_api_token(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let presented = headers.get("x-api-token").and_then(|v| v.to_str().ok());
    if presented == Some(state.api_token.as_str()) {
        Ok(())
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "invalid_api_token", "missing or invalid API token"))
    }
}

/// Resolve the Basic credential to an account id.
fn authenticate(state: &AppState, db: &Db, headers: &HeaderMap) -> ApiResult<u64> {
    check_api_token(state, headers)?;
    let unauthorized = || error(StatusCode::UNAUTHORIZED, "invalid_credentials", "missing or invalid user credentials");
    let encoded = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or_else(unauthorized)?;
    let decoded = decode_base64(encoded).ok_or_else(unauthorized)?;
    let (id, token) = decoded.split_once(':').ok_or_else(unauthorized)?;
    let id: u64 = id.parse().map_err(|_| unauthorized())?;
    match db.account(id) {
        Some(account) if account.token == token => Ok(id),
        _ => Err(unauthorized()),
    }
}

fn decode_base64(input: &str) -> Option<String> {
    let bytes = STANDARD.decode(input).ok()?;
    String::from_utf8(bytes).ok()
}

fn session_body(db: &Db, account: &Account) -> Value {
    json!({"user": db.render_user(account.id), "token": account.token})
}

async fn login(State(state): State<Shared>, headers: HeaderMap, Json(input): Json<LoginInput>) -> ApiResult<Json<Value>> {
    check_api_token(&state, &headers)?;
    let db = state.db.read().await;
    let account = db
        .accounts
        .iter()
        .find(|a| a.email == input.email && a.password == input.password)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "bad_login", "email or password is incorrect"))?;
    Ok(Json(session_body(&db, account)))
}

async fn register(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(input): Json<RegisterInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    check_api_token(&state, &headers)?;
    let mut db = state.db.write().await;
    if db.accounts.iter().any(|a| a.email == input.email || a.username == input.username) {
        return Err(error(StatusCode::CONFLICT, "taken", "username or email already registered"));
    }
    let id = db.next_id();
    let account = Account {
        id,
        username: input.username,
        email: input.email,
        password: input.password,
        token: format!("token-{id}"),
    };
    db.accounts.push(account.clone());
    Ok((StatusCode::CREATED, Json(session_body(&db, &account))))
}

async fn current_user(State(state): State<Shared>, headers: HeaderMap) -> ApiResult<Json<Value>> {
    let db = state.db.read().await;
    let id = authenticate(&state, &db, &headers)?;
    Ok(Json(db.render_user(id)))
}

async fn list_collections(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(paging): Query<PageQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let db = state.db.read().await;
    authenticate(&state, &db, &headers)?;
    let page = paging.slice(&db.collections);
    Ok(Json(page.iter().map(|c| db.render_collection(c)).collect()))
}

async fn get_collection(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> ApiResult<Json<Value>> {
    let db = state.db.read().await;
    authenticate(&state, &db, &headers)?;
    let collection = db
        .collections
        .iter()
        .find(|c| c.id == id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "not_found", "collection not found"))?;
    Ok(Json(db.render_collection(collection)))
}

async fn list_items(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let db = state.db.read().await;
    authenticate(&state, &db, &headers)?;
    if !db.collections.iter().any(|c| c.id == id) {
        return Err(error(StatusCode::NOT_FOUND, "not_found", "collection not found"));
    }
    let items: Vec<ItemRecord> = db.items.iter().filter(|i| i.collection_id == id).cloned().collect();
    Ok(Json(paging.slice(&items).iter().map(|i| db.render_item(i)).collect()))
}

async fn create_item(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(input): Json<NewItemInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut db = state.db.write().await;
    let owner_id = authenticate(&state, &db, &headers)?;
    if !db.collections.iter().any(|c| c.id == id) {
        return Err(error(StatusCode::NOT_FOUND, "not_found", "collection not found"));
    }
    let item = ItemRecord {
        id: db.next_id(),
        created_at: chrono::Utc::now(),
        collection_id: id,
        title: input.title,
        link: input.link,
        tags: input.tags,
        owner_id,
    };
    db.items.push(item.clone());
    Ok((StatusCode::CREATED, Json(db.render_item(&item))))
}

async fn get_item(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<u64>) -> ApiResult<Json<Value>> {
    let db = state.db.read().await;
    authenticate(&state, &db, &headers)?;
    let item = db
        .items
        .iter()
        .find(|i| i.id == id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "not_found", "item not found"))?;
    Ok(Json(db.render_item(item)))
}

async fn delete_item(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<u64>) -> ApiResult<StatusCode> {
    let mut db = state.db.write().await;
    authenticate(&state, &db, &headers)?;
    let before = db.items.len();
    db.items.retain(|i| i.id != id);
    if db.items.len() == before {
        return Err(error(StatusCode::NOT_FOUND, "not_found", "item not found"));
    }
    db.comments.retain(|c| c.item_id != id);
    db.reactions.retain(|r| r.item_id != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_comments(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let db = state.db.read().await;
    authenticate(&state, &db, &headers)?;
    let comments: Vec<CommentRecord> = db.comments.iter().filter(|c| c.item_id == id).cloned().collect();
    Ok(Json(paging.slice(&comments).iter().map(|c| db.render_comment(c)).collect()))
}

async fn create_comment(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(input): Json<NewCommentInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut db = state.db.write().await;
    let author_id = authenticate(&state, &db, &headers)?;
    if !db.items.iter().any(|i| i.id == id) {
        return Err(error(StatusCode::NOT_FOUND, "not_found", "item not found"));
    }
    let comment = CommentRecord {
        id: db.next_id(),
        created_at: chrono::Utc::now(),
        item_id: id,
        body: input.body,
        author_id,
    };
    db.comments.push(comment.clone());
    Ok((StatusCode::CREATED, Json(db.render_comment(&comment))))
}

async fn list_reactions(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Query(paging): Query<PageQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let db = state.db.read().await;
    authenticate(&state, &db, &headers)?;
    let reactions: Vec<ReactionRecord> = db.reactions.iter().filter(|r| r.item_id == id).cloned().collect();
    Ok(Json(paging.slice(&reactions).iter().map(|r| db.render_reaction(r)).collect()))
}

async fn add_reaction(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(input): Json<NewReactionInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut db = state.db.write().await;
    let author_id = authenticate(&state, &db, &headers)?;
    if !db.items.iter().any(|i| i.id == id) {
        return Err(error(StatusCode::NOT_FOUND, "not_found", "item not found"));
    }
    let reaction = ReactionRecord {
        id: db.next_id(),
        created_at: chrono::Utc::now(),
        item_id: id,
        kind: input.kind,
        author_id,
    };
    db.reactions.push(reaction.clone());
    Ok((StatusCode::CREATED, Json(db.render_reaction(&reaction))))
}

async fn list_invites(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(paging): Query<PageQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let db = state.db.read().await;
    authenticate(&state, &db, &headers)?;
    Ok(Json(paging.slice(&db.invites).iter().map(|i| db.render_invite(i)).collect()))
}

async fn search(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let db = state.db.read().await;
    authenticate(&state, &db, &headers)?;
    let hits = db.search(&query.q);
    let paging = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    Ok(Json(paging.slice(&hits)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_decoding_matches_standard_alphabet() {
        assert_eq!(decode_base64("NDI6c2VjcmV0").as_deref(), Some("42:secret"));
        assert_eq!(decode_base64("MTphZGEtdG9rZW4=").as_deref(), Some("1:ada-token"));
        assert_eq!(decode_base64("!!!"), None);
    }

    #[test]
    fn page_query_slices_one_based() {
        let all: Vec<u32> = (1..=5).collect();
        let q = PageQuery {
            page: Some(2),
            per_page: Some(2),
        };
        assert_eq!(q.slice(&all), vec![3, 4]);
        let past_end = PageQuery {
            page: Some(4),
            per_page: Some(2),
        };
        assert!(past_end.slice(&all).is_empty());
        let defaults = PageQuery {
            page: None,
            per_page: None,
        };
        assert_eq!(defaults.slice(&all).len(), 5);
        let huge = PageQuery {
            page: Some(usize::MAX),
            per_page: Some(4),
        };
        assert!(huge.slice(&all).is_empty());
    }
}
