//! Client SDK core for the Shelf REST API.
//!
//! # Overview
//! Two halves. `ApiClient` builds `HttpRequest` values and parses
//! `HttpResponse` values without touching the network (host-does-IO).
//! `Shelf` runs those requests through a `Transport` and hands back
//! `CancellableFuture`s, and `PagingEngine` drives page-at-a-time loading
//! of list endpoints on top of it.
//!
//! # Design
//! - Credentials live in an injected `SessionContext` value, never in
//!   global state.
//! - Entities decode from untyped JSON through the `Decode` contract: a
//!   record missing a mandatory field fails, while a list drops only the
//!   bad element.
//! - Mixed-kind lists dispatch on their `type` tag to a closed `SearchHit`
//!   enum.
//! - The SDK never retries; `ApiError` carries enough for callers to decide.

pub mod client;
pub mod config;
pub mod decode;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod future;
pub mod http;
pub mod models;
pub mod paging;
pub mod pipeline;
pub mod session;
pub mod transport;

pub use client::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use decode::{Decode, Record};
pub use dispatch::{decode_tagged, EntityKind, SearchHit};
pub use endpoint::{AuthScope, Endpoint, Params};
pub use error::{ApiError, DecodeError};
pub use future::{CancelHandle, CancellableFuture, FutureState, Settle};
pub use http::{HttpMethod, HttpRequest, HttpResponse, ResponseMeta};
pub use models::{
    Collection, Comment, Credentials, Invite, Item, NewComment, NewItem, NewReaction, Reaction,
    Registration, Session, User,
};
pub use paging::{PageEvent, PageProducer, PagingEngine, PagingSnapshot};
pub use pipeline::Shelf;
pub use session::{SessionContext, SessionUser};
pub use transport::{ReqwestTransport, Transport, TransportError};
