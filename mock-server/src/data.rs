//! In-memory records behind the mock API and their JSON renderings.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

pub const PUBLIC_BASE: &str = "https://shelf.example";

#[derive(Clone, Debug)]
pub struct Account {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub token: String,
}

#[derive(Clone, Debug)]
pub struct CollectionRecord {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub owner_id: u64,
}

#[derive(Clone, Debug)]
pub struct ItemRecord {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub collection_id: u64,
    pub title: Option<String>,
    pub link: String,
    pub tags: Vec<String>,
    pub owner_id: u64,
}

#[derive(Clone, Debug)]
pub struct CommentRecord {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub item_id: u64,
    pub body: String,
    pub author_id: u64,
}

#[derive(Clone, Debug)]
pub struct ReactionRecord {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub item_id: u64,
    pub kind: String,
    pub author_id: u64,
}

#[derive(Clone, Debug)]
pub struct InviteRecord {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    pub collection_id: u64,
    pub email: String,
    pub inviter_id: u64,
}

#[derive(Clone, Debug)]
pub struct TagRecord {
    pub id: u64,
    pub label: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct NewItemInput {
    pub link: String,
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct NewCommentInput {
    pub body: String,
}

#[derive(Deserialize)]
pub struct NewReactionInput {
    pub kind: String,
}

/// Everything the server knows.
#[derive(Debug, Default)]
pub struct Db {
    pub accounts: Vec<Account>,
    pub collections: Vec<CollectionRecord>,
    pub items: Vec<ItemRecord>,
    pub comments: Vec<CommentRecord>,
    pub reactions: Vec<ReactionRecord>,
    pub invites: Vec<InviteRecord>,
    pub tags: Vec<TagRecord>,
    next_id: u64,
}

/// Number of collections `Db::seeded` creates.
pub const SEEDED_COLLECTIONS: u64 = 5;
/// Number of items in seeded collection 1.
pub const SEEDED_ITEMS: u64 = 7;

impl Db {
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn stamp(n: u64) -> DateTime<Utc> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
        base + Duration::hours(n as i64)
    }

    /// One account (`ada@example.com` / `hunter2`), five collections, seven
    /// items in collection 1, a comment thread and a tag.
    pub fn seeded() -> Self {
        let mut db = Db {
            next_id: 1000,
            ..Db::default()
        };
        db.accounts.push(Account {
            id: 1,
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "hunter2".to_string(),
            token: "ada-token".to_string(),
        });
        for id in 1..=SEEDED_COLLECTIONS {
            db.collections.push(CollectionRecord {
                id,
                created_at: Self::stamp(id),
                name: format!("Collection {id}"),
                owner_id: 1,
            });
        }
        for id in 1..=SEEDED_ITEMS {
            db.items.push(ItemRecord {
                id,
                created_at: Self::stamp(100 + id),
                collection_id: 1,
                title: Some(format!("Rust article {id}")),
                link: format!("https://blog.example/posts/{id}"),
                tags: vec!["rust".to_string()],
                owner_id: 1,
            });
        }
        for id in 1..=3 {
            db.comments.push(CommentRecord {
                id,
                created_at: Self::stamp(200 + id),
                item_id: 1,
                body: format!("Great rust read #{id}"),
                author_id: 1,
            });
        }
        db.reactions.push(ReactionRecord {
            id: 1,
            created_at: Self::stamp(300),
            item_id: 1,
            kind: "heart".to_string(),
            author_id: 1,
        });
        db.invites.push(InviteRecord {
            id: 1,
            created_at: Self::stamp(400),
            collection_id: 2,
            email: "bob@example.com".to_string(),
            inviter_id: 1,
        });
        db.tags.push(TagRecord {
            id: 1,
            label: "rust".to_string(),
        });
        db
    }

    pub fn account(&self, id: u64) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn render_user(&self, id: u64) -> Value {
        match self.account(id) {
            Some(account) => json!({
                "id": account.id,
                "username": account.username,
                "email": account.email,
            }),
            None => Value::Null,
        }
    }

    pub fn render_collection(&self, c: &CollectionRecord) -> Value {
        let items: Vec<&ItemRecord> = self.items.iter().filter(|i| i.collection_id == c.id).collect();
        let preview: Vec<Value> = items.iter().take(3).map(|i| self.render_item(i)).collect();
        json!({
            "id": c.id,
            "created_at": c.created_at.to_rfc3339(),
            "url": format!("{PUBLIC_BASE}/collections/{}", c.id),
            "name": c.name,
            "item_count": items.len(),
            "is_private": false,
            "owner": self.render_user(c.owner_id),
            "preview_items": preview,
        })
    }

    pub fn render_item(&self, i: &ItemRecord) -> Value {
        json!({
            "id": i.id,
            "created_at": i.created_at.to_rfc3339(),
            "url": format!("{PUBLIC_BASE}/items/{}", i.id),
            "title": i.title,
            "link": i.link,
            "collection_id": i.collection_id,
            "tags": i.tags,
            "comment_count": self.comments.iter().filter(|c| c.item_id == i.id).count(),
            "owner": self.render_user(i.owner_id),
        })
    }

    pub fn render_comment(&self, c: &CommentRecord) -> Value {
        json!({
            "id": c.id,
            "created_at": c.created_at.to_rfc3339(),
            "url": format!("{PUBLIC_BASE}/comments/{}", c.id),
            "body": c.body,
            "item_id": c.item_id,
            "author": self.render_user(c.author_id),
        })
    }

    pub fn render_reaction(&self, r: &ReactionRecord) -> Value {
        json!({
            "id": r.id,
            "created_at": r.created_at.to_rfc3339(),
            "url": format!("{PUBLIC_BASE}/reactions/{}", r.id),
            "kind": r.kind,
            "item_id": r.item_id,
            "author": self.render_user(r.author_id),
        })
    }

    pub fn render_invite(&self, i: &InviteRecord) -> Value {
        json!({
            "id": i.id,
            "created_at": i.created_at.to_rfc3339(),
            "url": format!("{PUBLIC_BASE}/invites/{}", i.id),
            "collection_id": i.collection_id,
            "email": i.email,
            "accepted": false,
            "inviter": self.render_user(i.inviter_id),
        })
    }

    /// Mixed-kind hits in a fixed order: collections, items, comments, tags.
    /// Tags are a kind the client does not know about.
    pub fn search(&self, query: &str) -> Vec<Value> {
        let q = query.to_lowercase();
        let tagged = |kind: &str, mut value: Value| {
            value["type"] = json!(kind);
            value
        };
        let mut hits = Vec::new();
        for c in self.collections.iter().filter(|c| c.name.to_lowercase().contains(&q)) {
            hits.push(tagged("collection", self.render_collection(c)));
        }
        for i in self.items.iter().filter(|i| {
            i.title.as_deref().is_some_and(|t| t.to_lowercase().contains(&q))
        }) {
            hits.push(tagged("item", self.render_item(i)));
        }
        for c in self.comments.iter().filter(|c| c.body.to_lowercase().contains(&q)) {
            hits.push(tagged("comment", self.render_comment(c)));
        }
        for t in self.tags.iter().filter(|t| t.label.contains(&q)) {
            hits.push(json!({"type": "tag", "id": t.id, "label": t.label}));
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_collection_renders_preview_and_count() {
        let db = Db::seeded();
        let rendered = db.render_collection(&db.collections[0]);
        assert_eq!(rendered["item_count"], SEEDED_ITEMS);
        assert_eq!(rendered["preview_items"].as_array().unwrap().len(), 3);
        assert_eq!(rendered["owner"]["username"], "ada");
        assert_eq!(rendered["url"], "https://shelf.example/collections/1");
    }

    #[test]
    fn search_tags_every_hit() {
        let db = Db::seeded();
        let hits = db.search("rust");
        let kinds: Vec<&str> = hits.iter().map(|h| h["type"].as_str().unwrap()).collect();
        assert_eq!(kinds.iter().filter(|k| **k == "item").count(), SEEDED_ITEMS as usize);
        assert_eq!(kinds.iter().filter(|k| **k == "comment").count(), 3);
        assert_eq!(kinds.last(), Some(&"tag"));
    }

    #[test]
    fn next_id_is_monotonic() {
        let mut db = Db::seeded();
        let a = db.next_id();
        let b = db.next_id();
        assert!(b > a);
    }
}
