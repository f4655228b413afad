//! End-to-end session against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `Shelf` over real
//! HTTP through `ReqwestTransport`: login, paging through a collection,
//! tagged search, writes, and the error taxonomy for rejected requests.

use std::sync::Arc;

use shelf_core::{
    ApiError, ClientConfig, Credentials, EntityKind, NewComment, NewItem, ReqwestTransport, SearchHit,
    SessionContext, SessionUser, Shelf,
};

const API_TOKEN: &str = "integration-token";

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with_token(listener, API_TOKEN).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn anonymous(base_url: &str, page_size: u32) -> Shelf {
    let config = ClientConfig::new(base_url)
        .with_api_token(API_TOKEN)
        .with_page_size(page_size);
    Shelf::connect(&config).unwrap()
}

async fn signed_in(base_url: &str, page_size: u32) -> Shelf {
    let shelf = anonymous(base_url, page_size);
    let session = shelf
        .login(&Credentials {
            email: "ada@example.com".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap();
    shelf.with_session(
        SessionContext::new(API_TOKEN).with_user(SessionUser::new(session.user.id, session.token)),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn login_and_page_through_a_collection() {
    let base_url = start_server();
    let shelf = signed_in(&base_url, 3).await;

    let me = shelf.current_user().await.unwrap();
    assert_eq!(me.username, "ada");

    // Seeded collection 1 holds 7 items: pages of 3, 3, 1.
    let pager = shelf.collection_items_pager(1, 1);
    let mut loaded = Vec::new();
    loop {
        loaded.extend(pager.fetch_next().await.unwrap());
        // Scrolled to the last loaded row.
        if !pager.should_fetch_more(loaded.len() - 1, loaded.len()) {
            break;
        }
    }
    assert_eq!(loaded.len(), 7);
    assert!(pager.reached_end());
    assert_eq!(pager.current_page(), 4);

    let ids: Vec<u64> = loaded.iter().map(|i| i.id).collect();
    assert_eq!(ids, (1..=7).collect::<Vec<u64>>());

    // After the end no request is made and nothing comes back.
    assert!(pager.fetch_next().await.unwrap().is_empty());

    pager.reset();
    assert_eq!(pager.current_page(), 1);
    assert_eq!(pager.fetch_next().await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn search_drops_unknown_kinds() {
    let base_url = start_server();
    let shelf = signed_in(&base_url, 50).await;

    let hits = shelf.search("rust", 1).await.unwrap();
    // 7 items + 3 comments; the `tag` hit is not a kind this client knows.
    assert_eq!(hits.len(), 10);
    assert!(hits[..7].iter().all(|h| h.kind() == EntityKind::Item));
    assert!(hits[7..].iter().all(|h| matches!(h, SearchHit::Comment(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn write_then_read_back() {
    let base_url = start_server();
    let shelf = signed_in(&base_url, 20).await;

    let item = shelf
        .create_item(
            2,
            &NewItem {
                link: "https://example.com/post".to_string(),
                title: Some("Post".to_string()),
                tags: vec!["demo".to_string()],
            },
        )
        .await
        .unwrap();
    assert_eq!(item.collection_id, Some(2));
    assert_eq!(item.tags, vec!["demo"]);

    let comment = shelf
        .create_comment(
            item.id,
            &NewComment {
                body: "hello".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(comment.item_id, Some(item.id));
    assert_eq!(comment.author.unwrap().username, "ada");

    let comments = shelf.item_comments(item.id, 1).await.unwrap();
    assert_eq!(comments.len(), 1);

    shelf.delete_item(item.id).await.unwrap();
    let err = shelf.item(item.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err,
        ApiError::ServerError {
            status: 404,
            message: Some("item not found".to_string()),
            code: Some("not_found".to_string()),
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_credentials_surface_as_server_errors() {
    let base_url = start_server();

    let wrong_token = Shelf::connect(&ClientConfig::new(&base_url).with_api_token("nope")).unwrap();
    let err = wrong_token
        .login(&Credentials {
            email: "ada@example.com".to_string(),
            password: "hunter2".to_string(),
        })
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    let stale_user = anonymous(&base_url, 20).with_session(
        SessionContext::new(API_TOKEN).with_user(SessionUser::new(1, "revoked")),
    );
    let err = stale_user.collections(1).await.unwrap_err();
    assert_eq!(err.status(), Some(401));

    // No user at all never reaches the network.
    let err = anonymous(&base_url, 20).collections(1).await.unwrap_err();
    assert_eq!(err, ApiError::MissingUser);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_host_is_offline() {
    // Bind then drop to get a port nothing listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let config = ClientConfig::new(&format!("http://{addr}")).with_api_token(API_TOKEN);
    let transport = Arc::new(ReqwestTransport::new(config.timeout).unwrap());
    let shelf = Shelf::new(&config, transport);

    let err = shelf
        .login(&Credentials {
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Offline(_)), "got {err:?}");
}
