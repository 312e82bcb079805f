//! Registro de vehículos
//!
//! Dueño de los registros de vehículos y de su disponibilidad. Expone el
//! protocolo atómico claim/release sobre el que descansa la exclusividad
//! de las asignaciones.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::vehicle::{ClaimOutcome, NewVehicle, RemovalOutcome, Vehicle};
use crate::repositories::VehicleStore;
use crate::utils::errors::{not_found_error, AppError, AppResult};
use crate::utils::validation::{validate_coordinates, validate_new_vehicle};

#[derive(Clone)]
pub struct VehicleRegistry {
    store: Arc<dyn VehicleStore>,
}

impl VehicleRegistry {
    pub fn new(store: Arc<dyn VehicleStore>) -> Self {
        Self { store }
    }

    /// Alta de un vehículo disponible en la flota
    pub async fn register(&self, new: NewVehicle) -> AppResult<Vehicle> {
        validate_new_vehicle(&new)?;
        let new = NewVehicle {
            plate_number: new.plate_number.trim().to_string(),
            driver_name: new.driver_name.trim().to_string(),
            ..new
        };
        let vehicle = self.store.insert(Vehicle::from_new(new, Utc::now())).await?;
        info!(vehicle_id = %vehicle.id, plate = %vehicle.plate_number, "🚑 Vehículo registrado");
        Ok(vehicle)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Vehicle> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found_error("Vehicle", id))
    }

    pub async fn list_all(&self) -> AppResult<Vec<Vehicle>> {
        self.store.list_all().await
    }

    /// Instantánea de los vehículos disponibles, sin orden garantizado
    pub async fn list_available(&self) -> AppResult<Vec<Vehicle>> {
        self.store.list_available().await
    }

    /// Los `k` vehículos disponibles más cercanos al punto, por distancia
    /// ascendente y con empates resueltos por id.
    pub async fn nearest_available(
        &self,
        latitude: f64,
        longitude: f64,
        k: usize,
    ) -> AppResult<Vec<Vehicle>> {
        validate_coordinates(latitude, longitude)?;
        let available = self.store.list_available().await?;
        Ok(rank_by_distance(available, latitude, longitude, k))
    }

    /// Reclamo atómico guardado por la revisión esperada
    pub async fn claim(&self, id: Uuid, expected_revision: i64) -> AppResult<ClaimOutcome> {
        let outcome = self.store.claim(id, expected_revision, Utc::now()).await?;
        debug!(vehicle_id = %id, expected_revision, outcome = outcome.label(), "Intento de reclamo");
        Ok(outcome)
    }

    /// Devuelve el vehículo a la flota disponible
    pub async fn release(&self, id: Uuid) -> AppResult<Vehicle> {
        let vehicle = self
            .store
            .release(id, Utc::now())
            .await?
            .ok_or_else(|| not_found_error("Vehicle", id))?;
        debug!(vehicle_id = %id, revision = vehicle.revision, "🔓 Vehículo liberado");
        Ok(vehicle)
    }

    /// Liberación condicionada a que nadie haya tocado el vehículo desde `expected_revision`
    pub async fn release_if_unchanged(&self, id: Uuid, expected_revision: i64) -> AppResult<Option<Vehicle>> {
        self.store
            .release_if_unchanged(id, expected_revision, Utc::now())
            .await
    }

    /// Actualiza la posición sin comprobar revisión
    pub async fn update_location(&self, id: Uuid, latitude: f64, longitude: f64) -> AppResult<Vehicle> {
        validate_coordinates(latitude, longitude)?;
        self.store
            .update_location(id, latitude, longitude, Utc::now())
            .await?
            .ok_or_else(|| not_found_error("Vehicle", id))
    }

    /// Baja de un vehículo. Solo procede si no está asignado a una solicitud activa.
    pub async fn decommission(&self, id: Uuid) -> AppResult<()> {
        match self.store.remove_if_available(id).await? {
            RemovalOutcome::Removed => {
                info!(vehicle_id = %id, "🗑️ Vehículo dado de baja");
                Ok(())
            }
            RemovalOutcome::InUse => {
                warn!(vehicle_id = %id, "Vehículo asignado, no se puede dar de baja");
                Err(AppError::BadRequest(format!(
                    "Vehicle '{}' is assigned to an active request",
                    id
                )))
            }
            RemovalOutcome::NotFound => Err(not_found_error("Vehicle", id)),
        }
    }
}

/// Ordena por distancia al punto (y por id en empate) y se queda con `k`
pub fn rank_by_distance(vehicles: Vec<Vehicle>, latitude: f64, longitude: f64, k: usize) -> Vec<Vehicle> {
    let mut ranked: Vec<(f64, Vehicle)> = vehicles
        .into_iter()
        .map(|v| (v.distance_to(latitude, longitude), v))
        .collect();

    ranked.sort_by(|(da, a), (db, b)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)));
    ranked.truncate(k);
    ranked.into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryVehicleRepository;
    use crate::utils::geo::distance_km;

    fn registry() -> VehicleRegistry {
        VehicleRegistry::new(Arc::new(InMemoryVehicleRepository::new()))
    }

    fn new_vehicle(plate: &str, latitude: f64, longitude: f64) -> NewVehicle {
        NewVehicle {
            plate_number: plate.to_string(),
            latitude,
            longitude,
            driver_name: format!("Driver {}", plate),
            driver_contact: "+1 555 0100".to_string(),
        }
    }

    #[tokio::test]
    async fn test_nearest_available_orders_by_distance() {
        let registry = registry();
        let far = registry.register(new_vehicle("FAR", 1.0, 1.0)).await.unwrap();
        let near = registry.register(new_vehicle("NEAR", 0.0, 0.0)).await.unwrap();
        let mid = registry.register(new_vehicle("MID", 0.3, 0.3)).await.unwrap();

        let ranked = registry.nearest_available(0.01, 0.01, 3).await.unwrap();
        let ids: Vec<Uuid> = ranked.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![near.id, mid.id, far.id]);

        let top = registry.nearest_available(0.01, 0.01, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, near.id);
    }

    #[tokio::test]
    async fn test_nearest_first_is_minimal_over_grid() {
        let registry = registry();
        let mut plate = 0;
        for lat in [-45.0, -10.5, 0.0, 12.25, 60.0] {
            for lon in [-170.0, -20.0, 0.5, 33.3, 179.0] {
                plate += 1;
                registry
                    .register(new_vehicle(&format!("V{}", plate), lat, lon))
                    .await
                    .unwrap();
            }
        }
        let available = registry.list_available().await.unwrap();

        for (qlat, qlon) in [(0.0, 0.0), (51.5, -0.12), (-33.9, 151.2), (89.0, 179.9)] {
            let first = registry.nearest_available(qlat, qlon, 3).await.unwrap()[0].clone();
            let best = distance_km(first.latitude, first.longitude, qlat, qlon);
            for v in &available {
                assert!(best <= distance_km(v.latitude, v.longitude, qlat, qlon));
            }
        }
    }

    #[tokio::test]
    async fn test_nearest_breaks_ties_by_id() {
        let registry = registry();
        let a = registry.register(new_vehicle("T1", 5.0, 5.0)).await.unwrap();
        let b = registry.register(new_vehicle("T2", 5.0, 5.0)).await.unwrap();

        let ranked = registry.nearest_available(5.0, 5.0, 2).await.unwrap();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(ranked.iter().map(|v| v.id).collect::<Vec<_>>(), expected);
    }

    #[tokio::test]
    async fn test_pool_larger_than_fleet_and_empty_fleet() {
        let registry = registry();
        assert!(registry.nearest_available(0.0, 0.0, 3).await.unwrap().is_empty());

        registry.register(new_vehicle("ONLY", 0.0, 0.0)).await.unwrap();
        assert_eq!(registry.nearest_available(0.0, 0.0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_excludes_vehicle_until_release() {
        let registry = registry();
        let vehicle = registry.register(new_vehicle("CLAIM", 0.0, 0.0)).await.unwrap();

        match registry.claim(vehicle.id, vehicle.revision).await.unwrap() {
            ClaimOutcome::Claimed(v) => assert_eq!(v.revision, vehicle.revision + 1),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(registry.nearest_available(0.0, 0.0, 3).await.unwrap().is_empty());

        // Segunda llamada con la misma revisión pierde
        assert!(matches!(
            registry.claim(vehicle.id, vehicle.revision).await.unwrap(),
            ClaimOutcome::ConcurrencyConflict { .. }
        ));

        let released = registry.release(vehicle.id).await.unwrap();
        assert!(released.available);
        assert_eq!(released.revision, vehicle.revision + 2);
        assert_eq!(registry.nearest_available(0.0, 0.0, 3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_vehicle_operations() {
        let registry = registry();
        let id = Uuid::new_v4();
        assert_eq!(registry.claim(id, 0).await.unwrap(), ClaimOutcome::NotFound);
        assert!(matches!(registry.release(id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            registry.update_location(id, 1.0, 1.0).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(registry.decommission(id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_location_keeps_availability_and_revision() {
        let registry = registry();
        let vehicle = registry.register(new_vehicle("MOVE", 0.0, 0.0)).await.unwrap();

        let moved = registry.update_location(vehicle.id, 10.0, 20.0).await.unwrap();
        assert_eq!((moved.latitude, moved.longitude), (10.0, 20.0));
        assert_eq!(moved.revision, vehicle.revision);
        assert!(moved.available);

        assert!(matches!(
            registry.update_location(vehicle.id, 91.0, 0.0).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_coordinates() {
        let registry = registry();
        assert!(matches!(
            registry.register(new_vehicle("BAD", 0.0, 200.0)).await,
            Err(AppError::Validation(_))
        ));
    }
}
