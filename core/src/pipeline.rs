//! Asynchronous request execution on top of `ApiClient`.
//!
//! # Design
//! `Shelf` pairs an `ApiClient` with a `Transport`. Every call builds the
//! wire request synchronously (so credential problems reject at once),
//! spawns a single attempt on the runtime, and classifies the outcome into
//! `ApiError` before decoding. Nothing here retries. `Shelf` is cheap to
//! clone and pagers capture a clone, so the session a pager signs with is
//! fixed when the pager is built.

use std::fmt;
use std::sync::Arc;

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::decode::Decode;
use crate::dispatch::SearchHit;
use crate::endpoint::Endpoint;
use crate::error::ApiError;
use crate::future::CancellableFuture;
use crate::http::HttpResponse;
use crate::models::{
    Collection, Comment, Credentials, Invite, Item, NewComment, NewItem, NewReaction, Reaction,
    Registration, Session, User,
};
use crate::paging::PagingEngine;
use crate::session::SessionContext;
use crate::transport::{ReqwestTransport, Transport, TransportError};

#[derive(Clone)]
pub struct Shelf {
    client: ApiClient,
    transport: Arc<dyn Transport>,
    page_size: u32,
}

impl fmt::Debug for Shelf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shelf")
            .field("client", &self.client)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl Shelf {
    /// Signed with the config's API token and no user.
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let session = config
            .api_token
            .clone()
            .map(SessionContext::new)
            .unwrap_or_default();
        Self {
            client: ApiClient::new(&config.base_url, session),
            transport,
            page_size: config.page_size,
        }
    }

    /// Build with a `ReqwestTransport` honoring the config's timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn connect(config: &ClientConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// A copy signing with `session`. `self` is unchanged.
    #[must_use]
    pub fn with_session(&self, session: SessionContext) -> Self {
        Self {
            client: self.client.with_session(session),
            transport: Arc::clone(&self.transport),
            page_size: self.page_size,
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionContext {
        self.client.session()
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Issue one request and parse its response with `parse`.
    ///
    /// # Panics
    /// Panics when the request has to be spawned outside a tokio runtime.
    pub fn execute<T, P>(&self, endpoint: &Endpoint, parse: P) -> CancellableFuture<T>
    where
        T: Send + 'static,
        P: FnOnce(&ApiClient, HttpResponse) -> Result<T, ApiError> + Send + 'static,
    {
        let request = match self.client.build_request(endpoint) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(path = %endpoint.path, error = %err, "request could not be built");
                return CancellableFuture::rejected(err);
            }
        };
        let client = self.client.clone();
        let transport = Arc::clone(&self.transport);

        CancellableFuture::spawn(async move {
            let method = request.method;
            let url = request.url.clone();
            tracing::debug!(%method, %url, "issuing request");

            let response = transport.send(request).await.map_err(classify_transport)?;
            let status = response.status;
            let result = parse(&client, response);
            match &result {
                Ok(_) => tracing::debug!(%method, %url, status, "request succeeded"),
                Err(ApiError::UserCancelled) => tracing::debug!(%method, %url, "request cancelled"),
                Err(err) => tracing::debug!(%method, %url, status, error = %err, "request failed"),
            }
            result
        })
    }

    pub fn execute_one<T: Decode + Send + 'static>(&self, endpoint: &Endpoint) -> CancellableFuture<T> {
        self.execute(endpoint, |client, response| client.parse_one(response))
    }

    pub fn execute_many<T: Decode + Send + 'static>(&self, endpoint: &Endpoint) -> CancellableFuture<Vec<T>> {
        self.execute(endpoint, |client, response| client.parse_many(response))
    }

    pub fn execute_tagged(&self, endpoint: &Endpoint) -> CancellableFuture<Vec<SearchHit>> {
        self.execute(endpoint, |client, response| client.parse_tagged(response))
    }

    pub fn execute_unit(&self, endpoint: &Endpoint) -> CancellableFuture<()> {
        self.execute(endpoint, |client, response| client.parse_unit(response))
    }

    pub fn login(&self, credentials: &Credentials) -> CancellableFuture<Session> {
        match Endpoint::login(credentials) {
            Ok(endpoint) => self.execute_one(&endpoint),
            Err(err) => CancellableFuture::rejected(err),
        }
    }

    pub fn register(&self, registration: &Registration) -> CancellableFuture<Session> {
        match Endpoint::register(registration) {
            Ok(endpoint) => self.execute_one(&endpoint),
            Err(err) => CancellableFuture::rejected(err),
        }
    }

    pub fn current_user(&self) -> CancellableFuture<User> {
        self.execute_one(&Endpoint::current_user())
    }

    pub fn collections(&self, page: u32) -> CancellableFuture<Vec<Collection>> {
        self.execute_many(&Endpoint::collections(page, self.page_size))
    }

    pub fn collection(&self, id: u64) -> CancellableFuture<Collection> {
        self.execute_one(&Endpoint::collection(id))
    }

    pub fn collection_items(&self, collection_id: u64, page: u32) -> CancellableFuture<Vec<Item>> {
        self.execute_many(&Endpoint::collection_items(collection_id, page, self.page_size))
    }

    pub fn create_item(&self, collection_id: u64, item: &NewItem) -> CancellableFuture<Item> {
        match Endpoint::create_item(collection_id, item) {
            Ok(endpoint) => self.execute_one(&endpoint),
            Err(err) => CancellableFuture::rejected(err),
        }
    }

    pub fn item(&self, id: u64) -> CancellableFuture<Item> {
        self.execute_one(&Endpoint::item(id))
    }

    pub fn delete_item(&self, id: u64) -> CancellableFuture<()> {
        self.execute_unit(&Endpoint::delete_item(id))
    }

    pub fn item_comments(&self, item_id: u64, page: u32) -> CancellableFuture<Vec<Comment>> {
        self.execute_many(&Endpoint::item_comments(item_id, page, self.page_size))
    }

    pub fn create_comment(&self, item_id: u64, comment: &NewComment) -> CancellableFuture<Comment> {
        match Endpoint::create_comment(item_id, comment) {
            Ok(endpoint) => self.execute_one(&endpoint),
            Err(err) => CancellableFuture::rejected(err),
        }
    }

    pub fn item_reactions(&self, item_id: u64, page: u32) -> CancellableFuture<Vec<Reaction>> {
        self.execute_many(&Endpoint::item_reactions(item_id, page, self.page_size))
    }

    pub fn add_reaction(&self, item_id: u64, reaction: &NewReaction) -> CancellableFuture<Reaction> {
        match Endpoint::add_reaction(item_id, reaction) {
            Ok(endpoint) => self.execute_one(&endpoint),
            Err(err) => CancellableFuture::rejected(err),
        }
    }

    pub fn invites(&self, page: u32) -> CancellableFuture<Vec<Invite>> {
        self.execute_many(&Endpoint::invites(page, self.page_size))
    }

    pub fn search(&self, query: &str, page: u32) -> CancellableFuture<Vec<SearchHit>> {
        self.execute_tagged(&Endpoint::search(query, page, self.page_size))
    }

    /// A pager over any list endpoint built from `(page, per_page)`.
    pub fn pager<T, E>(&self, start_page: u32, endpoint: E) -> PagingEngine<T>
    where
        T: Decode + Clone + Send + 'static,
        E: Fn(u32, u32) -> Endpoint + Send + Sync + 'static,
    {
        let shelf = self.clone();
        let page_size = self.page_size;
        PagingEngine::new(start_page, page_size, move |page| {
            shelf.execute_many(&endpoint(page, page_size))
        })
    }

    pub fn collections_pager(&self, start_page: u32) -> PagingEngine<Collection> {
        self.pager(start_page, Endpoint::collections)
    }

    pub fn collection_items_pager(&self, collection_id: u64, start_page: u32) -> PagingEngine<Item> {
        self.pager(start_page, move |page, per_page| {
            Endpoint::collection_items(collection_id, page, per_page)
        })
    }

    pub fn comments_pager(&self, item_id: u64, start_page: u32) -> PagingEngine<Comment> {
        self.pager(start_page, move |page, per_page| {
            Endpoint::item_comments(item_id, page, per_page)
        })
    }

    pub fn invites_pager(&self, start_page: u32) -> PagingEngine<Invite> {
        self.pager(start_page, Endpoint::invites)
    }

    pub fn search_pager(&self, query: &str, start_page: u32) -> PagingEngine<SearchHit> {
        let shelf = self.clone();
        let query = query.to_string();
        let page_size = self.page_size;
        PagingEngine::new(start_page, page_size, move |page| {
            shelf.execute_tagged(&Endpoint::search(&query, page, page_size))
        })
    }
}

fn classify_transport(err: TransportError) -> ApiError {
    match err {
        TransportError::Cancelled => ApiError::UserCancelled,
        TransportError::Offline(detail) => ApiError::Offline(detail),
        TransportError::Other(detail) => ApiError::Network(detail),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::future::FutureState;
    use crate::http::HttpRequest;
    use crate::session::SessionUser;

    /// Replays canned outcomes and records the requests it saw.
    struct ScriptedTransport {
        outcomes: Mutex<Vec<Result<HttpResponse, TransportError>>>,
        seen: Mutex<Vec<HttpRequest>>,
        delay: Duration,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                seen: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
            })
        }

        fn slow(outcome: Result<HttpResponse, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(vec![outcome]),
                seen: Mutex::new(Vec::new()),
                delay: Duration::from_millis(500),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcomes.lock().unwrap().remove(0)
        }
    }

    fn shelf(transport: Arc<ScriptedTransport>) -> Shelf {
        let config = ClientConfig::new("http://api.test")
            .with_api_token("tok")
            .with_page_size(2);
        Shelf::new(&config, transport).with_session(
            SessionContext::new("tok").with_user(SessionUser::new(1, "user-tok")),
        )
    }

    const ITEM: &str = r#"{"id":1,"created_at":"2024-01-01T00:00:00Z","url":"https://shelf.example/items/1"}"#;

    #[tokio::test]
    async fn credential_errors_reject_without_sending() {
        let transport = ScriptedTransport::new(vec![]);
        let config = ClientConfig::new("http://api.test");
        let anon = Shelf::new(&config, transport.clone());
        assert_eq!(anon.current_user().await, Err(ApiError::MissingApiToken));

        let no_user = anon.with_session(SessionContext::new("tok"));
        assert_eq!(no_user.collections(1).await, Err(ApiError::MissingUser));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_outcomes_are_classified() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Cancelled),
            Err(TransportError::Offline("no route".to_string())),
            Err(TransportError::Other("tls".to_string())),
        ]);
        let shelf = shelf(transport);
        assert_eq!(shelf.item(1).await, Err(ApiError::UserCancelled));
        assert_eq!(shelf.item(1).await, Err(ApiError::Offline("no route".to_string())));
        assert_eq!(shelf.item(1).await, Err(ApiError::Network("tls".to_string())));
    }

    #[tokio::test]
    async fn response_outcomes_are_classified() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::json(401, r#"{"message":"token expired","code":"expired"}"#)),
            Ok(HttpResponse::json(200, "{oops")),
            Ok(HttpResponse::json(200, r#"{"id":1}"#)),
            Ok(HttpResponse::json(200, ITEM)),
        ]);
        let shelf = shelf(transport);

        let err = shelf.item(1).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(
            err,
            ApiError::ServerError {
                status: 401,
                message: Some("token expired".to_string()),
                code: Some("expired".to_string()),
            }
        );
        assert!(matches!(shelf.item(1).await, Err(ApiError::UnableToSerializeJson(_))));
        assert!(matches!(shelf.item(1).await, Err(ApiError::UnableToSerializeItem(_))));
        assert_eq!(shelf.item(1).await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn requests_carry_credentials_and_page_size() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::json(200, "[]"))]);
        let shelf = shelf(transport.clone());
        assert!(shelf.collection_items(9, 3).await.unwrap().is_empty());

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "http://api.test/collections/9/items?page=3&per_page=2");
        assert_eq!(seen[0].header("x-api-token"), Some("tok"));
        assert!(seen[0].header("authorization").is_some());
    }

    #[tokio::test]
    async fn cancelling_settles_immediately() {
        let transport = ScriptedTransport::slow(Ok(HttpResponse::json(200, ITEM)));
        let shelf = shelf(transport);
        let pending = shelf.item(1);
        assert_eq!(pending.state(), FutureState::Pending);
        pending.cancel();
        assert_eq!(pending.state(), FutureState::Cancelled);
        assert_eq!(pending.await, Err(ApiError::UserCancelled));
    }

    #[tokio::test]
    async fn pager_fetches_through_the_pipeline() {
        let page_one = format!("[{ITEM},{ITEM}]");
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse::json(200, &page_one)),
            Ok(HttpResponse::json(200, &format!("[{ITEM}]"))),
        ]);
        let shelf = shelf(transport.clone());
        let pager = shelf.collection_items_pager(5, 1);

        assert_eq!(pager.fetch_next().await.unwrap().len(), 2);
        assert_eq!(pager.fetch_next().await.unwrap().len(), 1);
        assert!(pager.reached_end());
        assert!(pager.fetch_next().await.unwrap().is_empty());

        let urls: Vec<String> = transport.seen.lock().unwrap().iter().map(|r| r.url.clone()).collect();
        assert_eq!(
            urls,
            vec![
                "http://api.test/collections/5/items?page=1&per_page=2",
                "http://api.test/collections/5/items?page=2&per_page=2",
            ]
        );
    }
}
