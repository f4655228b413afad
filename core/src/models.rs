//! Entity kinds of the Shelf API and the payloads sent to it.
//!
//! # Design
//! Inbound entities implement `Decode` by hand through `Record`, so each
//! decoder is also the single statement of which fields are mandatory.
//! Outbound payloads are plain `Serialize` structs. Nested previews such as
//! `Collection::preview_items` are partial by construction and never stand
//! in for a full child listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::{Decode, Record};
use crate::error::DecodeError;
use crate::http::ResponseMeta;

/// A Shelf account as embedded in other entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

impl Decode for User {
    fn decode_one(raw: &Value, _meta: &ResponseMeta) -> Result<Self, DecodeError> {
        let record = Record::new(raw)?;
        Ok(Self {
            id: record.id("id")?,
            username: record.string("username")?,
            name: record.opt_string("name"),
            avatar_url: record.opt_url("avatar_url"),
            email: record.opt_string("email"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub item_count: u64,
    pub is_private: bool,
    pub owner: Option<User>,
    /// A handful of items for thumbnails. Not the collection's contents.
    pub preview_items: Vec<Item>,
}

impl Decode for Collection {
    fn decode_one(raw: &Value, meta: &ResponseMeta) -> Result<Self, DecodeError> {
        let record = Record::new(raw)?;
        Ok(Self {
            id: record.id("id")?,
            created_at: record.timestamp("created_at")?,
            url: record.url("url")?,
            name: record.opt_string("name"),
            description: record.opt_string("description"),
            item_count: record.opt_id("item_count").unwrap_or(0),
            is_private: record.opt_bool("is_private").unwrap_or(false),
            owner: record.opt_entity("owner", meta),
            preview_items: record.opt_list("preview_items", meta),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub collection_id: Option<u64>,
    pub tags: Vec<String>,
    pub comment_count: u64,
    pub owner: Option<User>,
}

impl Decode for Item {
    fn decode_one(raw: &Value, meta: &ResponseMeta) -> Result<Self, DecodeError> {
        let record = Record::new(raw)?;
        Ok(Self {
            id: record.id("id")?,
            created_at: record.timestamp("created_at")?,
            url: record.url("url")?,
            title: record.opt_string("title"),
            link: record.opt_url("link"),
            image_url: record.opt_url("image_url"),
            collection_id: record.opt_id("collection_id"),
            tags: record.opt_strings("tags"),
            comment_count: record.opt_id("comment_count").unwrap_or(0),
            owner: record.opt_entity("owner", meta),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub body: Option<String>,
    pub item_id: Option<u64>,
    pub author: Option<User>,
}

impl Decode for Comment {
    fn decode_one(raw: &Value, meta: &ResponseMeta) -> Result<Self, DecodeError> {
        let record = Record::new(raw)?;
        Ok(Self {
            id: record.id("id")?,
            created_at: record.timestamp("created_at")?,
            url: record.url("url")?,
            body: record.opt_string("body"),
            item_id: record.opt_id("item_id"),
            author: record.opt_entity("author", meta),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub kind: Option<String>,
    pub item_id: Option<u64>,
    pub author: Option<User>,
}

impl Decode for Reaction {
    fn decode_one(raw: &Value, meta: &ResponseMeta) -> Result<Self, DecodeError> {
        let record = Record::new(raw)?;
        Ok(Self {
            id: record.id("id")?,
            created_at: record.timestamp("created_at")?,
            url: record.url("url")?,
            kind: record.opt_string("kind"),
            item_id: record.opt_id("item_id"),
            author: record.opt_entity("author", meta),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invite {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub collection_id: Option<u64>,
    pub email: Option<String>,
    pub accepted: bool,
    pub inviter: Option<User>,
}

impl Decode for Invite {
    fn decode_one(raw: &Value, meta: &ResponseMeta) -> Result<Self, DecodeError> {
        let record = Record::new(raw)?;
        Ok(Self {
            id: record.id("id")?,
            created_at: record.timestamp("created_at")?,
            url: record.url("url")?,
            collection_id: record.opt_id("collection_id"),
            email: record.opt_string("email"),
            accepted: record.opt_bool("accepted").unwrap_or(false),
            inviter: record.opt_entity("inviter", meta),
        })
    }
}

/// Reply to login and registration: the account and its request token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub token: String,
}

impl Decode for Session {
    fn decode_one(raw: &Value, meta: &ResponseMeta) -> Result<Self, DecodeError> {
        let record = Record::new(raw)?;
        Ok(Self {
            user: record.entity("user", meta)?,
            token: record.string("token")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReaction {
    pub kind: String,
}
