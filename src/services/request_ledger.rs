//! Libro de solicitudes
//!
//! Dueño de los registros de solicitudes. Cada transición se delega al
//! almacenamiento como una actualización condicional sobre el estado de
//! origen, así que dos transiciones concurrentes nunca pueden pisarse.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::request::{
    NewServiceRequest, RequestStatus, RequestTransition, ServiceRequest, TransitionOutcome,
    MAX_ETA_MINUTES,
};
use crate::repositories::RequestStore;
use crate::utils::errors::{not_found_error, validation_error, AppError, AppResult};
use crate::utils::validation::{truncate_chars, validate_coordinates, MAX_DETAIL_LENGTH};

#[derive(Clone)]
pub struct RequestLedger {
    store: Arc<dyn RequestStore>,
}

impl RequestLedger {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self { store }
    }

    /// Crear una solicitud en estado `PENDING`
    pub async fn create(&self, new: NewServiceRequest) -> AppResult<ServiceRequest> {
        if new.requester_id.trim().is_empty() {
            return Err(validation_error("requester_id", "Requester id is required"));
        }
        validate_coordinates(new.latitude, new.longitude)?;

        let description = new
            .description
            .as_deref()
            .map(|d| truncate_chars(d.trim(), MAX_DETAIL_LENGTH))
            .filter(|d| !d.is_empty());
        let new = NewServiceRequest { description, ..new };

        let request = self
            .store
            .insert(ServiceRequest::from_new(new, Utc::now()))
            .await?;
        info!(request_id = %request.id, requester_id = %request.requester_id, "📝 Solicitud creada");
        Ok(request)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ServiceRequest> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Request", id))
    }

    pub async fn list_all(&self) -> AppResult<Vec<ServiceRequest>> {
        self.store.list_all().await
    }

    pub async fn list_by_requester(&self, requester_id: &str) -> AppResult<Vec<ServiceRequest>> {
        self.store.list_by_requester(requester_id).await
    }

    /// Solicitud no terminal que referencia al vehículo, si existe
    pub async fn find_active_for_vehicle(&self, vehicle_id: Uuid) -> AppResult<Option<ServiceRequest>> {
        self.store.find_active_for_vehicle(vehicle_id).await
    }

    /// `PENDING -> DISPATCHED`, asigna vehículo y ETA (recortado a `0..=MAX_ETA_MINUTES`)
    pub async fn mark_dispatched(
        &self,
        id: Uuid,
        vehicle_id: Uuid,
        eta_minutes: i64,
    ) -> AppResult<ServiceRequest> {
        self.transition(
            id,
            RequestTransition::Dispatch {
                vehicle_id,
                eta_minutes: eta_minutes.clamp(0, MAX_ETA_MINUTES),
            },
        )
        .await
    }

    /// `DISPATCHED -> COMPLETED`
    pub async fn mark_completed(&self, id: Uuid) -> AppResult<ServiceRequest> {
        self.transition(id, RequestTransition::Complete).await
    }

    /// `PENDING | DISPATCHED -> CANCELLED`.
    ///
    /// Si la solicitud tenía vehículo, liberarlo es responsabilidad del llamador.
    pub async fn mark_cancelled(&self, id: Uuid) -> AppResult<ServiceRequest> {
        self.transition(id, RequestTransition::Cancel).await
    }

    async fn transition(&self, id: Uuid, transition: RequestTransition) -> AppResult<ServiceRequest> {
        let attempted = transition.target();
        match self.store.apply_transition(id, &transition, Utc::now()).await? {
            TransitionOutcome::Applied(request) => {
                info!(request_id = %id, status = %request.status, "Solicitud actualizada");
                Ok(request)
            }
            TransitionOutcome::Rejected { current } => Err(invalid_transition(id, current, attempted)),
            TransitionOutcome::NotFound => Err(not_found_error("Request", id)),
        }
    }
}

pub fn invalid_transition(request_id: Uuid, from: RequestStatus, attempted: RequestStatus) -> AppError {
    AppError::InvalidStateTransition {
        request_id,
        from,
        attempted,
    }
}
