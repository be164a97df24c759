//! PostgreSQL document store over the `crm_documents` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::CrmError;
use super::store::{Document, DocumentPatch, DocumentStore, ListQuery, Page};
use crate::uuid::uuidv7;

type DocumentRow = (
    String,
    String,
    Json<Map<String, Value>>,
    DateTime<Utc>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

const DOCUMENT_COLUMNS: &str =
    "id::text, tenant_id::text, data, created_at, updated_at, deleted_at";

fn document_from_row(row: DocumentRow) -> Document {
    let (id, tenant_id, Json(fields), created_at, updated_at, deleted_at) = row;
    Document {
        id,
        tenant_id,
        created_at,
        updated_at,
        deleted_at,
        fields,
    }
}

/// Record ids and tenant ids are UUIDs; anything else cannot match.
fn scope(tenant_id: &str, id: &str) -> Option<(Uuid, Uuid)> {
    Some((Uuid::parse_str(tenant_id).ok()?, Uuid::parse_str(id).ok()?))
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(
        &self,
        tenant_id: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, CrmError> {
        let Some((tenant, id)) = scope(tenant_id, id) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM crm_documents \
             WHERE tenant_id = $1 AND collection = $2 AND id = $3"
        ))
        .bind(tenant)
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(document_from_row))
    }

    async fn list(
        &self,
        tenant_id: &str,
        collection: &str,
        query: &ListQuery,
    ) -> Result<Page, CrmError> {
        let Ok(tenant) = Uuid::parse_str(tenant_id) else {
            return Ok(Page {
                items: Vec::new(),
                next_cursor: None,
            });
        };
        let offset = i64::try_from(query.offset)
            .map_err(|_| CrmError::validation(format!("Invalid cursor: {}", query.offset)))?;
        let direction = if query.newest_first { "DESC" } else { "ASC" };
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM crm_documents \
             WHERE tenant_id = $1 AND collection = $2 \
               AND data @> $3 \
               AND ($4 OR deleted_at IS NULL) \
               AND ($5::text IS NULL OR EXISTS ( \
                     SELECT 1 FROM jsonb_each_text(data) kv \
                     WHERE strpos(lower(kv.value), lower($5)) > 0)) \
             ORDER BY created_at {direction}, id {direction} \
             OFFSET $6 LIMIT $7"
        ))
        .bind(tenant)
        .bind(collection)
        .bind(Json(&query.filters))
        .bind(query.include_deleted)
        .bind(query.text.as_deref())
        .bind(offset)
        .bind(query.limit as i64 + 1)
        .fetch_all(&self.pool)
        .await?;
        let fetched = rows.into_iter().map(document_from_row).collect();
        Ok(Page::from_fetched(fetched, query.offset, query.limit))
    }

    async fn insert(
        &self,
        tenant_id: &str,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<Document, CrmError> {
        let tenant = Uuid::parse_str(tenant_id)
            .map_err(|_| CrmError::not_found("Tenant", tenant_id))?;
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "INSERT INTO crm_documents (id, tenant_id, collection, data) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(uuidv7())
        .bind(tenant)
        .bind(collection)
        .bind(Json(&fields))
        .fetch_one(&self.pool)
        .await?;
        Ok(document_from_row(row))
    }

    async fn patch(
        &self,
        tenant_id: &str,
        collection: &str,
        id: &str,
        patch: DocumentPatch,
    ) -> Result<Option<Document>, CrmError> {
        let Some((tenant, id)) = scope(tenant_id, id) else {
            return Ok(None);
        };
        let (touch_deleted, deleted_at) = match patch.deleted_at {
            Some(value) => (true, value),
            None => (false, None),
        };
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "UPDATE crm_documents SET \
               data = data || $4, \
               deleted_at = CASE WHEN $5 THEN $6 ELSE deleted_at END, \
               updated_at = now() \
             WHERE tenant_id = $1 AND collection = $2 AND id = $3 \
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(tenant)
        .bind(collection)
        .bind(id)
        .bind(Json(&patch.set))
        .bind(touch_deleted)
        .bind(deleted_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(document_from_row))
    }

    async fn delete(&self, tenant_id: &str, collection: &str, id: &str) -> Result<bool, CrmError> {
        let Some((tenant, id)) = scope(tenant_id, id) else {
            return Ok(false);
        };
        let result = sqlx::query(
            "DELETE FROM crm_documents WHERE tenant_id = $1 AND collection = $2 AND id = $3",
        )
        .bind(tenant)
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
