//! Eventos publicados hacia la pasarela de notificaciones

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::request::ServiceRequest;
use crate::models::vehicle::Vehicle;
use crate::utils::geo::format_eta;

/// Carga plana enviada al solicitante y al conductor tras un despacho
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchNotification {
    pub request_id: Uuid,
    pub vehicle_id: Uuid,
    pub message: String,
    pub vehicle_plate: String,
    pub driver_name: String,
    pub driver_contact: String,
    pub eta_minutes: i64,
    pub eta_display: String,
}

impl DispatchNotification {
    pub fn new(request: &ServiceRequest, vehicle: &Vehicle, eta_minutes: i64) -> Self {
        Self {
            request_id: request.id,
            vehicle_id: vehicle.id,
            message: "A vehicle has been dispatched to your location".to_string(),
            vehicle_plate: vehicle.plate_number.clone(),
            driver_name: vehicle.driver_name.clone(),
            driver_contact: vehicle.driver_contact.clone(),
            eta_minutes,
            eta_display: format_eta(eta_minutes),
        }
    }
}

/// Posición en vivo del vehículo asignado
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationNotification {
    pub request_id: Uuid,
    pub vehicle_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    VehicleDispatched(DispatchNotification),
    VehicleLocation(LocationNotification),
}

impl NotificationEvent {
    pub fn request_id(&self) -> Uuid {
        match self {
            NotificationEvent::VehicleDispatched(n) => n.request_id,
            NotificationEvent::VehicleLocation(n) => n.request_id,
        }
    }
}
