use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::vehicle::{NewVehicle, Vehicle};
use crate::utils::geo;
use crate::utils::validation::{validate_not_empty, DRIVER_CONTACT_RE};

/// Tamaño máximo aceptado para `/nearest`
pub const MAX_NEAREST_LIMIT: u32 = 50;

// Request para registrar un vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(length(min = 1, max = 15), custom = "validate_not_empty")]
    pub plate_number: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(min = 1, max = 100), custom = "validate_not_empty")]
    pub driver_name: String,
    #[validate(regex(path = "DRIVER_CONTACT_RE", message = "Invalid driver contact"))]
    pub driver_contact: String,
}

impl From<CreateVehicleRequest> for NewVehicle {
    fn from(request: CreateVehicleRequest) -> Self {
        Self {
            plate_number: request.plate_number,
            latitude: request.latitude,
            longitude: request.longitude,
            driver_name: request.driver_name,
            driver_contact: request.driver_contact,
        }
    }
}

// Reporte de posición del vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLocationRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

// Query de `/nearest`
#[derive(Debug, Deserialize, Validate)]
pub struct NearestVehiclesQuery {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u32>,
}

// Response de vehículo
#[derive(Debug, Serialize, Deserialize)]
pub struct VehicleResponse {
    pub id: Uuid,
    pub plate_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub available: bool,
    pub driver_name: String,
    pub driver_contact: String,
    pub last_updated_at: DateTime<Utc>,
    pub revision: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            id: vehicle.id,
            plate_number: vehicle.plate_number,
            latitude: vehicle.latitude,
            longitude: vehicle.longitude,
            available: vehicle.available,
            driver_name: vehicle.driver_name,
            driver_contact: vehicle.driver_contact,
            last_updated_at: vehicle.last_updated_at,
            revision: vehicle.revision,
            distance_km: None,
        }
    }
}

impl VehicleResponse {
    /// Respuesta con la distancia al punto consultado
    pub fn with_distance(vehicle: Vehicle, latitude: f64, longitude: f64) -> Self {
        let distance = geo::distance_km(vehicle.latitude, vehicle.longitude, latitude, longitude);
        Self {
            distance_km: Some(distance),
            ..Self::from(vehicle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request() -> CreateVehicleRequest {
        CreateVehicleRequest {
            plate_number: "AMB-001".to_string(),
            latitude: 40.4,
            longitude: -3.7,
            driver_name: "Ana Ruiz".to_string(),
            driver_contact: "+34 600 123 456".to_string(),
        }
    }

    #[test]
    fn test_create_vehicle_request_validation() {
        assert!(create_request().validate().is_ok());

        let mut bad = create_request();
        bad.driver_contact = "abc".to_string();
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("driver_contact"));

        let mut bad = create_request();
        bad.latitude = 120.0;
        assert!(bad.validate().is_err());

        let mut bad = create_request();
        bad.plate_number = "   ".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_nearest_query_limit_bounds() {
        let query = NearestVehiclesQuery {
            latitude: 0.0,
            longitude: 0.0,
            limit: Some(MAX_NEAREST_LIMIT + 1),
        };
        assert!(query.validate().is_err());
    }
}
