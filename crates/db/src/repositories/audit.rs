use std::collections::BTreeMap;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use hrflow_core::audit::AuditEvent;
use hrflow_core::domain::request::RequestId;

use super::{decode_enum, decode_timestamp, AuditRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAuditRepository {
    pool: DbPool,
}

impl SqlAuditRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditRepository for SqlAuditRepository {
    async fn record(&self, event: &AuditEvent) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&event.metadata)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO audit_event (id, request_id, stage, correlation_id, event_type,
                                      category, actor, outcome, metadata_json, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.event_id)
        .bind(event.request_id.as_ref().map(|id| id.0.as_str()))
        .bind(event.stage.map(|stage| stage.as_str()))
        .bind(&event.correlation_id)
        .bind(&event.event_type)
        .bind(event.category.as_str())
        .bind(&event.actor)
        .bind(event.outcome.as_str())
        .bind(metadata_json)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_request(&self, id: &RequestId) -> Result<Vec<AuditEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, request_id, stage, correlation_id, event_type, category, actor,
                    outcome, metadata_json, occurred_at
             FROM audit_event
             WHERE request_id = ?
             ORDER BY occurred_at ASC, rowid ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

fn row_to_event(row: &SqliteRow) -> Result<AuditEvent, RepositoryError> {
    let category: String = row.try_get("category")?;
    let outcome: String = row.try_get("outcome")?;
    let metadata_json: String = row.try_get("metadata_json")?;
    let occurred_at: String = row.try_get("occurred_at")?;
    let stage = match row.try_get::<Option<String>, _>("stage")? {
        Some(stage) => Some(decode_enum("stage", &stage)?),
        None => None,
    };
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_json)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(AuditEvent {
        event_id: row.try_get("id")?,
        request_id: row.try_get::<Option<String>, _>("request_id")?.map(RequestId),
        stage,
        correlation_id: row.try_get("correlation_id")?,
        event_type: row.try_get("event_type")?,
        category: decode_enum("category", &category)?,
        actor: row.try_get("actor")?,
        outcome: decode_enum("outcome", &outcome)?,
        metadata,
        occurred_at: decode_timestamp("occurred_at", &occurred_at)?,
    })
}
