//! Modelo de solicitud de servicio
//!
//! Una solicitud recorre la máquina de estados
//! `PENDING -> DISPATCHED -> COMPLETED` o `PENDING | DISPATCHED -> CANCELLED`.
//! Los estados terminales no admiten más transiciones.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// ETA máximo aceptado (un año); valores mayores se recortan
pub const MAX_ETA_MINUTES: i64 = 525_600;

/// Estado de la solicitud - mapea al ENUM request_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "request_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Dispatched,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Dispatched => "DISPATCHED",
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Solicitud de servicio - mapea a la tabla service_requests
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub requester_id: String,
    /// Referencia débil: la solicitud no gobierna el ciclo de vida del vehículo
    pub vehicle_id: Option<Uuid>,
    pub status: RequestStatus,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
    pub eta_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub estimated_arrival_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Datos para crear una solicitud
#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub requester_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: Option<String>,
}

/// Transición solicitada sobre una solicitud
#[derive(Debug, Clone, PartialEq)]
pub enum RequestTransition {
    Dispatch { vehicle_id: Uuid, eta_minutes: i64 },
    Complete,
    Cancel,
}

impl RequestTransition {
    pub fn target(&self) -> RequestStatus {
        match self {
            RequestTransition::Dispatch { .. } => RequestStatus::Dispatched,
            RequestTransition::Complete => RequestStatus::Completed,
            RequestTransition::Cancel => RequestStatus::Cancelled,
        }
    }

    pub fn allowed_from(&self) -> &'static [RequestStatus] {
        match self {
            RequestTransition::Dispatch { .. } => &[RequestStatus::Pending],
            RequestTransition::Complete => &[RequestStatus::Dispatched],
            RequestTransition::Cancel => &[RequestStatus::Pending, RequestStatus::Dispatched],
        }
    }

    pub fn permits(&self, from: RequestStatus) -> bool {
        self.allowed_from().contains(&from)
    }
}

/// Resultado de aplicar una transición en el almacenamiento
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(ServiceRequest),
    Rejected { current: RequestStatus },
    NotFound,
}

impl ServiceRequest {
    pub fn from_new(new: NewServiceRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_id: new.requester_id,
            vehicle_id: None,
            status: RequestStatus::Pending,
            latitude: new.latitude,
            longitude: new.longitude,
            description: new.description,
            eta_minutes: None,
            created_at: now,
            dispatched_at: None,
            estimated_arrival_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Aplicar una transición in situ.
    ///
    /// Los timestamps se fijan a `max(now, anterior)` para que nunca retrocedan.
    /// Devuelve el estado actual si la transición no es legal.
    pub fn apply(
        &mut self,
        transition: &RequestTransition,
        now: DateTime<Utc>,
    ) -> Result<(), RequestStatus> {
        if !transition.permits(self.status) {
            return Err(self.status);
        }

        let floor = self.dispatched_at.unwrap_or(self.created_at);
        let at = now.max(floor);

        match transition {
            RequestTransition::Dispatch {
                vehicle_id,
                eta_minutes,
            } => {
                let eta_minutes = (*eta_minutes).clamp(0, MAX_ETA_MINUTES);
                self.vehicle_id = Some(*vehicle_id);
                self.eta_minutes = Some(eta_minutes);
                self.dispatched_at = Some(at);
                self.estimated_arrival_at = Some(at + Duration::minutes(eta_minutes));
            }
            RequestTransition::Complete => {
                self.completed_at = Some(at);
            }
            RequestTransition::Cancel => {
                self.cancelled_at = Some(at);
            }
        }
        self.status = transition.target();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> ServiceRequest {
        ServiceRequest::from_new(
            NewServiceRequest {
                requester_id: "user-1".to_string(),
                latitude: 1.0,
                longitude: 2.0,
                description: Some("chest pain".to_string()),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_legal_path_to_completed() {
        let mut request = pending();
        let vehicle_id = Uuid::new_v4();
        request
            .apply(
                &RequestTransition::Dispatch {
                    vehicle_id,
                    eta_minutes: 7,
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(request.status, RequestStatus::Dispatched);
        assert_eq!(request.vehicle_id, Some(vehicle_id));
        assert_eq!(
            request.estimated_arrival_at.unwrap() - request.dispatched_at.unwrap(),
            Duration::minutes(7)
        );

        request.apply(&RequestTransition::Complete, Utc::now()).unwrap();
        assert_eq!(request.status, RequestStatus::Completed);
        assert!(request.completed_at.unwrap() >= request.dispatched_at.unwrap());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let mut request = pending();
        request.apply(&RequestTransition::Cancel, Utc::now()).unwrap();
        assert_eq!(
            request.apply(&RequestTransition::Complete, Utc::now()),
            Err(RequestStatus::Cancelled)
        );
        assert_eq!(
            request.apply(&RequestTransition::Cancel, Utc::now()),
            Err(RequestStatus::Cancelled)
        );
        assert_eq!(
            request.apply(
                &RequestTransition::Dispatch {
                    vehicle_id: Uuid::new_v4(),
                    eta_minutes: 1
                },
                Utc::now()
            ),
            Err(RequestStatus::Cancelled)
        );
    }

    #[test]
    fn test_complete_requires_dispatched() {
        let mut request = pending();
        assert_eq!(
            request.apply(&RequestTransition::Complete, Utc::now()),
            Err(RequestStatus::Pending)
        );
        assert_eq!(request.status, RequestStatus::Pending);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut request = pending();
        let earlier = request.created_at - Duration::seconds(30);
        request
            .apply(
                &RequestTransition::Dispatch {
                    vehicle_id: Uuid::new_v4(),
                    eta_minutes: 0,
                },
                earlier,
            )
            .unwrap();
        assert_eq!(request.dispatched_at, Some(request.created_at));

        request.apply(&RequestTransition::Complete, earlier).unwrap();
        assert_eq!(request.completed_at, request.dispatched_at);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Dispatched).unwrap(),
            "\"DISPATCHED\""
        );
        assert_eq!(RequestStatus::Cancelled.to_string(), "CANCELLED");
    }
}
