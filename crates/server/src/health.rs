use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use hrflow_db::{migrations, DbPool};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: CheckStatus,
    pub detail: String,
}

impl HealthCheck {
    fn ready(detail: impl Into<String>) -> Self {
        Self { status: CheckStatus::Ready, detail: detail.into() }
    }

    fn degraded(detail: impl Into<String>) -> Self {
        Self { status: CheckStatus::Degraded, detail: detail.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: CheckStatus,
    pub database: HealthCheck,
    pub schema: HealthCheck,
    pub checked_at: DateTime<Utc>,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// 200 only when the database answers and every bundled migration is applied.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db_pool).await {
        Ok(_) => HealthCheck::ready("database query succeeded"),
        Err(error) => HealthCheck::degraded(format!("database query failed: {error}")),
    };
    let schema = match database.status {
        CheckStatus::Ready => schema_check(&state.db_pool).await,
        CheckStatus::Degraded => HealthCheck::degraded("skipped: database unreachable"),
    };

    let status = if database.status == CheckStatus::Ready && schema.status == CheckStatus::Ready {
        CheckStatus::Ready
    } else {
        CheckStatus::Degraded
    };
    let code = match status {
        CheckStatus::Ready => StatusCode::OK,
        CheckStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };

    (code, Json(HealthResponse { status, database, schema, checked_at: Utc::now() }))
}

async fn schema_check(pool: &DbPool) -> HealthCheck {
    match migrations::pending_versions(pool).await {
        Ok(pending) if pending.is_empty() => HealthCheck::ready("request store migrated"),
        Ok(pending) => HealthCheck::degraded(format!("pending migrations {pending:?}")),
        Err(error) => HealthCheck::degraded(format!("migration ledger unreadable: {error}")),
    }
}
