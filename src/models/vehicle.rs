//! Modelo de Vehicle
//!
//! Este módulo contiene el struct Vehicle y los resultados de las operaciones
//! de reclamo. Mapea exactamente a la tabla `vehicles`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::geo;

/// Vehicle principal - mapea exactamente a la tabla vehicles
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Vehicle {
    pub id: Uuid,
    pub plate_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub available: bool,
    pub driver_name: String,
    pub driver_contact: String,
    pub last_updated_at: DateTime<Utc>,
    /// Token de revisión, crece con cada claim/release
    pub revision: i64,
}

/// Datos para dar de alta un vehículo en la flota
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub plate_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub driver_name: String,
    pub driver_contact: String,
}

impl Vehicle {
    /// Construir un vehículo disponible con revisión 0
    pub fn from_new(new: NewVehicle, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate_number: new.plate_number,
            latitude: new.latitude,
            longitude: new.longitude,
            available: true,
            driver_name: new.driver_name,
            driver_contact: new.driver_contact,
            last_updated_at: now,
            revision: 0,
        }
    }

    /// Distancia en km desde el vehículo hasta un punto
    pub fn distance_to(&self, latitude: f64, longitude: f64) -> f64 {
        geo::distance_km(self.latitude, self.longitude, latitude, longitude)
    }

    /// Compare-and-swap sobre (available, revision).
    ///
    /// El llamador debe tener acceso exclusivo al registro durante la llamada.
    pub fn try_claim(&mut self, expected_revision: i64, now: DateTime<Utc>) -> ClaimOutcome {
        if self.revision != expected_revision {
            return ClaimOutcome::ConcurrencyConflict {
                current_revision: self.revision,
            };
        }
        if !self.available {
            return ClaimOutcome::AlreadyUnavailable;
        }
        self.available = false;
        self.revision += 1;
        self.last_updated_at = now;
        ClaimOutcome::Claimed(self.clone())
    }

    /// Devolver el vehículo a la flota disponible
    pub fn release(&mut self, now: DateTime<Utc>) {
        self.available = true;
        self.revision += 1;
        self.last_updated_at = now;
    }
}

/// Resultado de un intento de reclamo
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(Vehicle),
    /// Otro llamador modificó el vehículo desde que se leyó
    ConcurrencyConflict { current_revision: i64 },
    AlreadyUnavailable,
    NotFound,
}

impl ClaimOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ClaimOutcome::Claimed(_) => "claimed",
            ClaimOutcome::ConcurrencyConflict { .. } => "concurrency_conflict",
            ClaimOutcome::AlreadyUnavailable => "already_unavailable",
            ClaimOutcome::NotFound => "not_found",
        }
    }
}

/// Resultado de dar de baja un vehículo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    /// El vehículo está asignado a una solicitud activa
    InUse,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vehicle {
        Vehicle::from_new(
            NewVehicle {
                plate_number: "AMB-001".to_string(),
                latitude: 10.0,
                longitude: 20.0,
                driver_name: "Driver One".to_string(),
                driver_contact: "+34 600 000 001".to_string(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_try_claim_bumps_revision() {
        let mut vehicle = sample();
        match vehicle.try_claim(0, Utc::now()) {
            ClaimOutcome::Claimed(v) => {
                assert!(!v.available);
                assert_eq!(v.revision, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!vehicle.available);
    }

    #[test]
    fn test_try_claim_stale_revision_conflicts() {
        let mut vehicle = sample();
        vehicle.try_claim(0, Utc::now());
        assert_eq!(
            vehicle.try_claim(0, Utc::now()),
            ClaimOutcome::ConcurrencyConflict { current_revision: 1 }
        );
        assert_eq!(vehicle.revision, 1);
    }

    #[test]
    fn test_try_claim_current_revision_but_unavailable() {
        let mut vehicle = sample();
        vehicle.try_claim(0, Utc::now());
        assert_eq!(vehicle.try_claim(1, Utc::now()), ClaimOutcome::AlreadyUnavailable);
        assert_eq!(vehicle.revision, 1);
    }

    #[test]
    fn test_release_on_available_vehicle_only_bumps_revision() {
        let mut vehicle = sample();
        vehicle.release(Utc::now());
        assert!(vehicle.available);
        assert_eq!(vehicle.revision, 1);
    }
}
