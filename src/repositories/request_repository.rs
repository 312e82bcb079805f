use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::request::{
    RequestStatus, RequestTransition, ServiceRequest, TransitionOutcome,
};
use crate::utils::errors::AppResult;

/// Almacenamiento de solicitudes.
///
/// `apply_transition` comprueba el estado de origen y escribe el destino
/// en una sola operación condicional.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: ServiceRequest) -> AppResult<ServiceRequest>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ServiceRequest>>;

    /// Más recientes primero
    async fn list_all(&self) -> AppResult<Vec<ServiceRequest>>;

    /// Más recientes primero
    async fn list_by_requester(&self, requester_id: &str) -> AppResult<Vec<ServiceRequest>>;

    async fn find_active_for_vehicle(&self, vehicle_id: Uuid) -> AppResult<Option<ServiceRequest>>;

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &RequestTransition,
        now: DateTime<Utc>,
    ) -> AppResult<TransitionOutcome>;
}

pub struct PgRequestRepository {
    pool: PgPool,
}

impl PgRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_status(&self, id: Uuid) -> AppResult<Option<RequestStatus>> {
        let status = sqlx::query_scalar::<_, RequestStatus>(
            "SELECT status FROM service_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(status)
    }
}

#[async_trait]
impl RequestStore for PgRequestRepository {
    async fn insert(&self, request: ServiceRequest) -> AppResult<ServiceRequest> {
        let saved = sqlx::query_as::<_, ServiceRequest>(
            r#"
            INSERT INTO service_requests (id, requester_id, vehicle_id, status, latitude, longitude, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(&request.requester_id)
        .bind(request.vehicle_id)
        .bind(request.status)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(&request.description)
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ServiceRequest>> {
        let request =
            sqlx::query_as::<_, ServiceRequest>("SELECT * FROM service_requests WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(request)
    }

    async fn list_all(&self) -> AppResult<Vec<ServiceRequest>> {
        let requests = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM service_requests ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn list_by_requester(&self, requester_id: &str) -> AppResult<Vec<ServiceRequest>> {
        let requests = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM service_requests WHERE requester_id = $1 ORDER BY created_at DESC",
        )
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn find_active_for_vehicle(&self, vehicle_id: Uuid) -> AppResult<Option<ServiceRequest>> {
        let request = sqlx::query_as::<_, ServiceRequest>(
            r#"
            SELECT * FROM service_requests
            WHERE vehicle_id = $1 AND status IN ('PENDING', 'DISPATCHED')
            LIMIT 1
            "#,
        )
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &RequestTransition,
        now: DateTime<Utc>,
    ) -> AppResult<TransitionOutcome> {
        let updated = match transition {
            RequestTransition::Dispatch {
                vehicle_id,
                eta_minutes,
            } => {
                sqlx::query_as::<_, ServiceRequest>(
                    r#"
                    UPDATE service_requests
                    SET status = 'DISPATCHED',
                        vehicle_id = $2,
                        eta_minutes = $3,
                        dispatched_at = GREATEST($4, created_at),
                        estimated_arrival_at = GREATEST($4, created_at) + make_interval(mins => $3::int)
                    WHERE id = $1 AND status = 'PENDING'
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(vehicle_id)
                .bind(eta_minutes)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?
            }
            RequestTransition::Complete => {
                sqlx::query_as::<_, ServiceRequest>(
                    r#"
                    UPDATE service_requests
                    SET status = 'COMPLETED',
                        completed_at = GREATEST($2, COALESCE(dispatched_at, created_at))
                    WHERE id = $1 AND status = 'DISPATCHED'
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?
            }
            RequestTransition::Cancel => {
                sqlx::query_as::<_, ServiceRequest>(
                    r#"
                    UPDATE service_requests
                    SET status = 'CANCELLED',
                        cancelled_at = GREATEST($2, COALESCE(dispatched_at, created_at))
                    WHERE id = $1 AND status IN ('PENDING', 'DISPATCHED')
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        if let Some(request) = updated {
            return Ok(TransitionOutcome::Applied(request));
        }

        Ok(match self.current_status(id).await? {
            Some(current) => TransitionOutcome::Rejected { current },
            None => TransitionOutcome::NotFound,
        })
    }
}
