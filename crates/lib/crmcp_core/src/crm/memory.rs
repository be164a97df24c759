//! In-memory document store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Map, Value};

use super::CrmError;
use super::store::{Document, DocumentPatch, DocumentStore, ListQuery, Page};
use crate::uuid::uuidv7;

/// Documents keyed by `(collection, id)`.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: DashMap<(String, String), Document>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(collection: &str, id: &str) -> (String, String) {
        (collection.to_string(), id.to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(
        &self,
        tenant_id: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, CrmError> {
        Ok(self
            .docs
            .get(&Self::key(collection, id))
            .filter(|d| d.tenant_id == tenant_id)
            .map(|d| d.clone()))
    }

    async fn list(
        &self,
        tenant_id: &str,
        collection: &str,
        query: &ListQuery,
    ) -> Result<Page, CrmError> {
        let mut matching: Vec<Document> = self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .filter(|entry| entry.tenant_id == tenant_id && query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        // v7 ids sort in creation order
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if query.newest_first {
            matching.reverse();
        }
        let fetched = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit + 1)
            .collect();
        Ok(Page::from_fetched(fetched, query.offset, query.limit))
    }

    async fn insert(
        &self,
        tenant_id: &str,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<Document, CrmError> {
        let now = Utc::now();
        let doc = Document {
            id: uuidv7().to_string(),
            tenant_id: tenant_id.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            fields,
        };
        self.docs
            .insert(Self::key(collection, &doc.id), doc.clone());
        Ok(doc)
    }

    async fn patch(
        &self,
        tenant_id: &str,
        collection: &str,
        id: &str,
        patch: DocumentPatch,
    ) -> Result<Option<Document>, CrmError> {
        let Some(mut doc) = self.docs.get_mut(&Self::key(collection, id)) else {
            return Ok(None);
        };
        if doc.tenant_id != tenant_id {
            return Ok(None);
        }
        for (k, v) in patch.set {
            doc.fields.insert(k, v);
        }
        if let Some(deleted_at) = patch.deleted_at {
            doc.deleted_at = deleted_at;
        }
        doc.updated_at = Utc::now();
        Ok(Some(doc.clone()))
    }

    async fn delete(&self, tenant_id: &str, collection: &str, id: &str) -> Result<bool, CrmError> {
        Ok(self
            .docs
            .remove_if(&Self::key(collection, id), |_, d| d.tenant_id == tenant_id)
            .is_some())
    }
}
