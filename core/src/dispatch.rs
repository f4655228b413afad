//! Decoding of mixed-kind lists tagged by a `type` field.
//!
//! Search-style endpoints return one array mixing several entity kinds. The
//! kind is read from each element's `type` string and never guessed from its
//! shape; unknown or missing tags drop the element.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use crate::decode::Decode;
use crate::error::DecodeError;
use crate::http::ResponseMeta;
use crate::models::{Collection, Comment, Invite, Item, Reaction};

/// The closed set of kinds a tagged list may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Collection,
    Item,
    Comment,
    Reaction,
    Invite,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Collection => "collection",
            EntityKind::Item => "item",
            EntityKind::Comment => "comment",
            EntityKind::Reaction => "reaction",
            EntityKind::Invite => "invite",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown entity kind `{0}`")]
pub struct UnknownKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collection" => Ok(EntityKind::Collection),
            "item" => Ok(EntityKind::Item),
            "comment" => Ok(EntityKind::Comment),
            "reaction" => Ok(EntityKind::Reaction),
            "invite" => Ok(EntityKind::Invite),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// One element of a tagged list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchHit {
    Collection(Collection),
    Item(Item),
    Comment(Comment),
    Reaction(Reaction),
    Invite(Invite),
}

impl SearchHit {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            SearchHit::Collection(_) => EntityKind::Collection,
            SearchHit::Item(_) => EntityKind::Item,
            SearchHit::Comment(_) => EntityKind::Comment,
            SearchHit::Reaction(_) => EntityKind::Reaction,
            SearchHit::Invite(_) => EntityKind::Invite,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            SearchHit::Collection(c) => c.id,
            SearchHit::Item(i) => i.id,
            SearchHit::Comment(c) => c.id,
            SearchHit::Reaction(r) => r.id,
            SearchHit::Invite(i) => i.id,
        }
    }

    /// Decode one element with the decoder its tag selects.
    fn decode_as(kind: EntityKind, raw: &Value, meta: &ResponseMeta) -> Result<Self, DecodeError> {
        Ok(match kind {
            EntityKind::Collection => SearchHit::Collection(Collection::decode_one(raw, meta)?),
            EntityKind::Item => SearchHit::Item(Item::decode_one(raw, meta)?),
            EntityKind::Comment => SearchHit::Comment(Comment::decode_one(raw, meta)?),
            EntityKind::Reaction => SearchHit::Reaction(Reaction::decode_one(raw, meta)?),
            EntityKind::Invite => SearchHit::Invite(Invite::decode_one(raw, meta)?),
        })
    }
}

impl Decode for SearchHit {
    fn decode_one(raw: &Value, meta: &ResponseMeta) -> Result<Self, DecodeError> {
        let tag = raw
            .get("type")
            .ok_or(DecodeError::MissingField("type"))?
            .as_str()
            .ok_or(DecodeError::WrongType {
                field: "type",
                expected: "string",
            })?;
        let kind = tag.parse::<EntityKind>().map_err(|_| DecodeError::WrongType {
            field: "type",
            expected: "known entity kind",
        })?;
        Self::decode_as(kind, raw, meta)
    }
}

/// Decode a tagged array in input order, dropping untagged, unknown-tag
/// and malformed elements.
pub fn decode_tagged(raw: &[Value], meta: &ResponseMeta) -> Vec<SearchHit> {
    SearchHit::decode_many(raw, meta)
}
