//! Generic tenant-scoped document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::CrmError;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 200;

/// Largest cursor offset; SQL `OFFSET` is a signed 64-bit value.
pub const MAX_OFFSET: usize = i64::MAX as usize;

/// One record in a collection. Domain fields are flattened next to the
/// bookkeeping columns when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Changes applied by [`DocumentStore::patch`].
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    /// Fields to overwrite; other fields are kept.
    pub set: Map<String, Value>,
    /// `Some(Some(t))` soft-deletes, `Some(None)` restores.
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}

impl DocumentPatch {
    pub fn set(fields: Map<String, Value>) -> Self {
        Self {
            set: fields,
            deleted_at: None,
        }
    }

    pub fn soft_delete(at: DateTime<Utc>) -> Self {
        Self {
            set: Map::new(),
            deleted_at: Some(Some(at)),
        }
    }

    pub fn restore() -> Self {
        Self {
            set: Map::new(),
            deleted_at: Some(None),
        }
    }
}

/// Filtered, paginated listing.
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// JSON containment filter: every key must match, nested objects match
    /// recursively.
    pub filters: Map<String, Value>,
    /// Case-insensitive substring match against any string field.
    pub text: Option<String>,
    pub include_deleted: bool,
    pub newest_first: bool,
    pub offset: usize,
    pub limit: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Map::new(),
            text: None,
            include_deleted: false,
            newest_first: false,
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListQuery {
    pub fn filter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filters.insert(key.to_string(), value.into());
        self
    }

    /// Build the query for an opaque cursor and requested page size.
    pub fn page(cursor: Option<&str>, limit: Option<usize>) -> Result<Self, CrmError> {
        let offset = match cursor {
            None | Some("") => 0,
            Some(c) => c
                .parse::<usize>()
                .ok()
                .filter(|offset| *offset <= MAX_OFFSET)
                .ok_or_else(|| CrmError::validation(format!("Invalid cursor: {c}")))?,
        };
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(CrmError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self {
            offset,
            limit,
            ..Self::default()
        })
    }

    /// True when `doc` satisfies filters, text and deletion visibility.
    pub fn matches(&self, doc: &Document) -> bool {
        if !self.include_deleted && doc.is_deleted() {
            return false;
        }
        let fields = Value::Object(doc.fields.clone());
        if !self
            .filters
            .iter()
            .all(|(k, v)| fields.get(k).is_some_and(|actual| json_contains(actual, v)))
        {
            return false;
        }
        match &self.text {
            Some(text) => contains_text(&fields, &text.to_lowercase()),
            None => true,
        }
    }
}

/// One page of results. `next_cursor` is absent on the last page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<Document>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// Cut `fetched` (up to `limit + 1` rows starting at `offset`) into a page.
    pub fn from_fetched(mut fetched: Vec<Document>, offset: usize, limit: usize) -> Self {
        let next_cursor = if fetched.len() > limit {
            fetched.truncate(limit);
            Some((offset + limit).to_string())
        } else {
            None
        };
        Self {
            items: fetched,
            next_cursor,
        }
    }
}

/// Containment with the semantics of PostgreSQL `jsonb @>` for the shapes
/// stored here: objects match key-by-key, everything else by equality.
pub fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => e
            .iter()
            .all(|(k, ev)| a.get(k).is_some_and(|av| json_contains(av, ev))),
        _ => actual == expected,
    }
}

fn contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Object(map) => map.values().any(|v| contains_text(v, needle)),
        Value::Array(items) => items.iter().any(|v| contains_text(v, needle)),
        _ => false,
    }
}

/// Tenant-scoped CRUD over named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a record, soft-deleted or not.
    async fn get(
        &self,
        tenant_id: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, CrmError>;

    async fn list(
        &self,
        tenant_id: &str,
        collection: &str,
        query: &ListQuery,
    ) -> Result<Page, CrmError>;

    async fn insert(
        &self,
        tenant_id: &str,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<Document, CrmError>;

    /// Apply `patch`, bumping `updated_at`. `None` when the record is absent.
    async fn patch(
        &self,
        tenant_id: &str,
        collection: &str,
        id: &str,
        patch: DocumentPatch,
    ) -> Result<Option<Document>, CrmError>;

    /// Permanently remove a record. Returns whether it existed.
    async fn delete(&self, tenant_id: &str, collection: &str, id: &str) -> Result<bool, CrmError>;
}
