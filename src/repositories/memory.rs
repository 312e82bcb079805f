//! Almacenamiento en memoria
//!
//! Implementaciones de los stores sobre mapas protegidos por `RwLock`.
//! Cada mutación se hace bajo un único guard de escritura, lo que la
//! convierte en una transacción serializada.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::history::{HistoryEntry, HistoryEventKind};
use crate::models::request::{RequestTransition, ServiceRequest, TransitionOutcome};
use crate::models::vehicle::{ClaimOutcome, RemovalOutcome, Vehicle};
use crate::repositories::{HistoryStore, RequestStore, VehicleStore};
use crate::utils::errors::{AppError, AppResult};

#[derive(Default)]
pub struct InMemoryVehicleRepository {
    vehicles: RwLock<HashMap<Uuid, Vehicle>>,
}

impl InMemoryVehicleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VehicleStore for InMemoryVehicleRepository {
    async fn insert(&self, vehicle: Vehicle) -> AppResult<Vehicle> {
        let mut vehicles = self.vehicles.write().await;
        // Misma regla que el índice `lower(plate_number)` de PostgreSQL
        let plate = vehicle.plate_number.to_lowercase();
        if vehicles
            .values()
            .any(|v| v.plate_number.to_lowercase() == plate)
        {
            return Err(AppError::BadRequest(format!(
                "Plate '{}' is already registered",
                vehicle.plate_number
            )));
        }
        vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self.vehicles.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Vehicle>> {
        let mut vehicles: Vec<Vehicle> = self.vehicles.read().await.values().cloned().collect();
        vehicles.sort_by(|a, b| a.plate_number.cmp(&b.plate_number));
        Ok(vehicles)
    }

    async fn list_available(&self) -> AppResult<Vec<Vehicle>> {
        Ok(self
            .vehicles
            .read()
            .await
            .values()
            .filter(|v| v.available)
            .cloned()
            .collect())
    }

    async fn claim(
        &self,
        id: Uuid,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> AppResult<ClaimOutcome> {
        let mut vehicles = self.vehicles.write().await;
        Ok(match vehicles.get_mut(&id) {
            Some(vehicle) => vehicle.try_claim(expected_revision, now),
            None => ClaimOutcome::NotFound,
        })
    }

    async fn release(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<Vehicle>> {
        let mut vehicles = self.vehicles.write().await;
        Ok(vehicles.get_mut(&id).map(|vehicle| {
            vehicle.release(now);
            vehicle.clone()
        }))
    }

    async fn release_if_unchanged(
        &self,
        id: Uuid,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Vehicle>> {
        let mut vehicles = self.vehicles.write().await;
        Ok(vehicles
            .get_mut(&id)
            .filter(|vehicle| !vehicle.available && vehicle.revision == expected_revision)
            .map(|vehicle| {
                vehicle.release(now);
                vehicle.clone()
            }))
    }

    async fn update_location(
        &self,
        id: Uuid,
        latitude: f64,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Vehicle>> {
        let mut vehicles = self.vehicles.write().await;
        Ok(vehicles.get_mut(&id).map(|vehicle| {
            vehicle.latitude = latitude;
            vehicle.longitude = longitude;
            vehicle.last_updated_at = now;
            vehicle.clone()
        }))
    }

    async fn remove_if_available(&self, id: Uuid) -> AppResult<RemovalOutcome> {
        let mut vehicles = self.vehicles.write().await;
        Ok(match vehicles.get(&id) {
            None => RemovalOutcome::NotFound,
            Some(vehicle) if !vehicle.available => RemovalOutcome::InUse,
            Some(_) => {
                vehicles.remove(&id);
                RemovalOutcome::Removed
            }
        })
    }
}

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<Uuid, ServiceRequest>>,
}

impl InMemoryRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut requests: Vec<ServiceRequest>) -> Vec<ServiceRequest> {
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    requests
}

#[async_trait]
impl RequestStore for InMemoryRequestRepository {
    async fn insert(&self, request: ServiceRequest) -> AppResult<ServiceRequest> {
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(request)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<ServiceRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<ServiceRequest>> {
        let requests = self.requests.read().await.values().cloned().collect();
        Ok(newest_first(requests))
    }

    async fn list_by_requester(&self, requester_id: &str) -> AppResult<Vec<ServiceRequest>> {
        let requests = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| r.requester_id == requester_id)
            .cloned()
            .collect();
        Ok(newest_first(requests))
    }

    async fn find_active_for_vehicle(&self, vehicle_id: Uuid) -> AppResult<Option<ServiceRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .find(|r| r.vehicle_id == Some(vehicle_id) && r.is_active())
            .cloned())
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &RequestTransition,
        now: DateTime<Utc>,
    ) -> AppResult<TransitionOutcome> {
        let mut requests = self.requests.write().await;
        let Some(request) = requests.get_mut(&id) else {
            return Ok(TransitionOutcome::NotFound);
        };

        Ok(match request.apply(transition, now) {
            Ok(()) => TransitionOutcome::Applied(request.clone()),
            Err(current) => TransitionOutcome::Rejected { current },
        })
    }
}

#[derive(Default)]
pub struct InMemoryHistoryRepository {
    entries: RwLock<HashMap<Uuid, Vec<HistoryEntry>>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryRepository {
    async fn append(
        &self,
        request_id: Uuid,
        event_kind: HistoryEventKind,
        details: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<HistoryEntry> {
        let mut entries = self.entries.write().await;
        let log = entries.entry(request_id).or_default();

        let event_time = log
            .last()
            .map(|last| last.event_time.max(now))
            .unwrap_or(now);

        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            request_id,
            event_kind,
            event_time,
            details,
        };
        log.push(entry.clone());
        Ok(entry)
    }

    async fn list_for_request(&self, request_id: Uuid) -> AppResult<Vec<HistoryEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&request_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vehicle::NewVehicle;
    use chrono::Duration;

    fn vehicle(plate: &str) -> Vehicle {
        Vehicle::from_new(
            NewVehicle {
                plate_number: plate.to_string(),
                latitude: 0.0,
                longitude: 0.0,
                driver_name: "Driver".to_string(),
                driver_contact: "5550001111".to_string(),
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_duplicate_plate_rejected() {
        let store = InMemoryVehicleRepository::new();
        store.insert(vehicle("AMB-1")).await.unwrap();
        let err = store.insert(vehicle("amb-1")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        // Fuera de ASCII también se compara en minúsculas
        store.insert(vehicle("ÁGUILA-1")).await.unwrap();
        assert!(matches!(
            store.insert(vehicle("águila-1")).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_release_if_unchanged_checks_revision() {
        let store = InMemoryVehicleRepository::new();
        let v = store.insert(vehicle("AMB-3")).await.unwrap();

        // Disponible: nada que liberar
        assert!(store.release_if_unchanged(v.id, v.revision, Utc::now()).await.unwrap().is_none());

        store.claim(v.id, v.revision, Utc::now()).await.unwrap();
        assert!(store.release_if_unchanged(v.id, v.revision, Utc::now()).await.unwrap().is_none());

        let released = store
            .release_if_unchanged(v.id, v.revision + 1, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(released.available);
        assert_eq!(released.revision, v.revision + 2);
    }

    #[tokio::test]
    async fn test_claim_unknown_vehicle() {
        let store = InMemoryVehicleRepository::new();
        let outcome = store.claim(Uuid::new_v4(), 0, Utc::now()).await.unwrap();
        assert_eq!(outcome, ClaimOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_remove_only_when_available() {
        let store = InMemoryVehicleRepository::new();
        let v = store.insert(vehicle("AMB-2")).await.unwrap();
        store.claim(v.id, 0, Utc::now()).await.unwrap();
        assert_eq!(store.remove_if_available(v.id).await.unwrap(), RemovalOutcome::InUse);

        store.release(v.id, Utc::now()).await.unwrap();
        assert_eq!(store.remove_if_available(v.id).await.unwrap(), RemovalOutcome::Removed);
        assert_eq!(store.remove_if_available(v.id).await.unwrap(), RemovalOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_history_event_time_is_monotonic() {
        let store = InMemoryHistoryRepository::new();
        let request_id = Uuid::new_v4();
        let now = Utc::now();

        let first = store
            .append(request_id, HistoryEventKind::Created, None, now)
            .await
            .unwrap();
        // Reloj que retrocede
        let second = store
            .append(
                request_id,
                HistoryEventKind::Cancelled,
                None,
                now - Duration::seconds(5),
            )
            .await
            .unwrap();

        assert_eq!(second.event_time, first.event_time);
        let entries = store.list_for_request(request_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_kind, HistoryEventKind::Created);
        assert_eq!(entries[1].event_kind, HistoryEventKind::Cancelled);
    }
}
