use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::history::{HistoryEntry, HistoryEventKind};
use crate::utils::errors::AppResult;

/// Almacenamiento de historial, solo-anexado
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// `event_time` nunca es menor que el de la última entrada de la solicitud
    async fn append(
        &self,
        request_id: Uuid,
        event_kind: HistoryEventKind,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<HistoryEntry>;

    /// Orden de inserción
    async fn list_for_request(&self, request_id: Uuid) -> AppResult<Vec<HistoryEntry>>;
}

pub struct PgHistoryRepository {
    pool: PgPool,
}

impl PgHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryRepository {
    async fn append(
        &self,
        request_id: Uuid,
        event_kind: HistoryEventKind,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<HistoryEntry> {
        let entry = sqlx::query_as::<_, HistoryEntry>(
            r#"
            INSERT INTO service_history (id, request_id, event_kind, event_time, details)
            VALUES (
                $1, $2, $3,
                GREATEST($4, (SELECT MAX(event_time) FROM service_history WHERE request_id = $2)),
                $5
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request_id)
        .bind(event_kind)
        .bind(now)
        .bind(details)
        .fetch_one(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn list_for_request(&self, request_id: Uuid) -> AppResult<Vec<HistoryEntry>> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            "SELECT * FROM service_history WHERE request_id = $1 ORDER BY seq",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
