use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::request::{NewServiceRequest, RequestStatus, ServiceRequest};
use crate::services::dispatch_engine::DispatchOptions;
use crate::utils::geo::format_eta;
use crate::utils::validation::validate_not_empty;

// Request para abrir una solicitud de servicio
#[derive(Debug, Deserialize, Validate)]
pub struct CreateServiceRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_empty")]
    pub requester_id: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl From<CreateServiceRequest> for NewServiceRequest {
    fn from(request: CreateServiceRequest) -> Self {
        Self {
            requester_id: request.requester_id,
            latitude: request.latitude,
            longitude: request.longitude,
            description: request.description,
        }
    }
}

// Cuerpo opcional de `/dispatch`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DispatchRequest {
    #[validate(range(min = 1, max = 20))]
    pub candidate_pool_size: Option<u32>,
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: Option<u32>,
}

impl DispatchRequest {
    /// Completar con los valores por defecto del motor
    pub fn merge_into(&self, defaults: DispatchOptions) -> DispatchOptions {
        DispatchOptions {
            candidate_pool_size: self
                .candidate_pool_size
                .map(|size| size as usize)
                .unwrap_or(defaults.candidate_pool_size),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
        }
    }
}

// Response de solicitud
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceRequestResponse {
    pub id: Uuid,
    pub requester_id: String,
    pub vehicle_id: Option<Uuid>,
    pub status: RequestStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub eta_minutes: Option<i64>,
    pub eta_display: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub estimated_arrival_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<ServiceRequest> for ServiceRequestResponse {
    fn from(request: ServiceRequest) -> Self {
        Self {
            id: request.id,
            requester_id: request.requester_id,
            vehicle_id: request.vehicle_id,
            status: request.status,
            latitude: request.latitude,
            longitude: request.longitude,
            description: request.description,
            eta_minutes: request.eta_minutes,
            eta_display: request.eta_minutes.map(format_eta),
            created_at: request.created_at,
            dispatched_at: request.dispatched_at,
            estimated_arrival_at: request.estimated_arrival_at,
            completed_at: request.completed_at,
            cancelled_at: request.cancelled_at,
        }
    }
}
