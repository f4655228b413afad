//! The typed decode contract.
//!
//! # Design
//! Entities are built from untyped `serde_json::Value` records rather than
//! derived `Deserialize` impls, because the two field classes need opposite
//! policies: a mandatory field that is absent or mistyped fails the whole
//! record, while a mistyped optional field is read as absent. `Record`
//! encodes both policies once so entity decoders stay declarative.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::http::ResponseMeta;

/// Construct an entity from one raw record.
pub trait Decode: Sized {
    /// Decode a single record, failing if any mandatory field is unusable.
    fn decode_one(raw: &Value, meta: &ResponseMeta) -> Result<Self, DecodeError>;

    /// Decode every element independently, dropping the ones that fail.
    fn decode_many(raw: &[Value], meta: &ResponseMeta) -> Vec<Self> {
        let decoded: Vec<Self> = raw
            .iter()
            .filter_map(|element| match Self::decode_one(element, meta) {
                Ok(entity) => Some(entity),
                Err(err) => {
                    tracing::debug!(error = %err, "dropping malformed list element");
                    None
                }
            })
            .collect();
        let dropped = raw.len() - decoded.len();
        if dropped > 0 {
            tracing::warn!(dropped, total = raw.len(), "list response contained malformed elements");
        }
        decoded
    }
}

/// Field accessor over one JSON object.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> Record<'a> {
    pub fn new(raw: &'a Value) -> Result<Self, DecodeError> {
        raw.as_object()
            .map(|fields| Self { fields })
            .ok_or(DecodeError::NotAnObject)
    }

    fn required(&self, field: &'static str) -> Result<&'a Value, DecodeError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
            Some(value) => Ok(value),
        }
    }

    fn optional(&self, field: &str) -> Option<&'a Value> {
        self.fields.get(field).filter(|value| !value.is_null())
    }

    pub fn id(&self, field: &'static str) -> Result<u64, DecodeError> {
        self.required(field)?
            .as_u64()
            .ok_or(DecodeError::WrongType {
                field,
                expected: "unsigned integer",
            })
    }

    pub fn string(&self, field: &'static str) -> Result<String, DecodeError> {
        self.required(field)?
            .as_str()
            .map(str::to_string)
            .ok_or(DecodeError::WrongType {
                field,
                expected: "string",
            })
    }

    /// RFC 3339 timestamp.
    pub fn timestamp(&self, field: &'static str) -> Result<DateTime<Utc>, DecodeError> {
        let raw = self.required(field)?.as_str().ok_or(DecodeError::WrongType {
            field,
            expected: "timestamp",
        })?;
        parse_timestamp(raw).ok_or(DecodeError::WrongType {
            field,
            expected: "timestamp",
        })
    }

    /// Absolute URL, kept as its serialized string.
    pub fn url(&self, field: &'static str) -> Result<String, DecodeError> {
        let raw = self.required(field)?.as_str().ok_or(DecodeError::WrongType {
            field,
            expected: "url",
        })?;
        Url::parse(raw)
            .map(|_| raw.to_string())
            .map_err(|_| DecodeError::WrongType {
                field,
                expected: "url",
            })
    }

    /// Mandatory nested entity.
    pub fn entity<T: Decode>(&self, field: &'static str, meta: &ResponseMeta) -> Result<T, DecodeError> {
        T::decode_one(self.required(field)?, meta)
    }

    pub fn opt_id(&self, field: &str) -> Option<u64> {
        self.optional(field).and_then(Value::as_u64)
    }

    pub fn opt_string(&self, field: &str) -> Option<String> {
        self.optional(field).and_then(Value::as_str).map(str::to_string)
    }

    pub fn opt_bool(&self, field: &str) -> Option<bool> {
        self.optional(field).and_then(Value::as_bool)
    }

    pub fn opt_timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.optional(field).and_then(Value::as_str).and_then(parse_timestamp)
    }

    pub fn opt_url(&self, field: &str) -> Option<String> {
        self.optional(field)
            .and_then(Value::as_str)
            .filter(|raw| Url::parse(raw).is_ok())
            .map(str::to_string)
    }

    /// Optional nested entity; an undecodable value reads as absent.
    pub fn opt_entity<T: Decode>(&self, field: &str, meta: &ResponseMeta) -> Option<T> {
        self.optional(field).and_then(|raw| T::decode_one(raw, meta).ok())
    }

    /// Optional nested list, element-tolerant like `decode_many`.
    pub fn opt_list<T: Decode>(&self, field: &str, meta: &ResponseMeta) -> Vec<T> {
        self.optional(field)
            .and_then(Value::as_array)
            .map(|raw| T::decode_many(raw, meta))
            .unwrap_or_default()
    }

    /// Optional list of strings; non-string elements are skipped.
    pub fn opt_strings(&self, field: &str) -> Vec<String> {
        self.optional(field)
            .and_then(Value::as_array)
            .map(|raw| raw.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default()
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
