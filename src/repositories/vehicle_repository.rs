use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::vehicle::{ClaimOutcome, RemovalOutcome, Vehicle};
use crate::utils::errors::{AppError, AppResult};

/// Almacenamiento de vehículos.
///
/// `claim` y `release` son las únicas operaciones que tocan el par
/// (available, revision) y cada una debe ejecutarse como una sola
/// lectura-modificación-escritura atómica.
#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn insert(&self, vehicle: Vehicle) -> AppResult<Vehicle>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>>;

    async fn list_all(&self) -> AppResult<Vec<Vehicle>>;

    async fn list_available(&self) -> AppResult<Vec<Vehicle>>;

    async fn claim(
        &self,
        id: Uuid,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> AppResult<ClaimOutcome>;

    async fn release(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<Vehicle>>;

    /// Libera solo si el vehículo sigue no disponible con `expected_revision`.
    /// `None` si no existe o si otro escritor lo tocó entretanto.
    async fn release_if_unchanged(
        &self,
        id: Uuid,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Vehicle>>;

    async fn update_location(
        &self,
        id: Uuid,
        latitude: f64,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Vehicle>>;

    async fn remove_if_available(&self, id: Uuid) -> AppResult<RemovalOutcome>;
}

pub struct PgVehicleRepository {
    pool: PgPool,
}

impl PgVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleStore for PgVehicleRepository {
    async fn insert(&self, vehicle: Vehicle) -> AppResult<Vehicle> {
        let result = sqlx::query_as::<_, Vehicle>(
            r#"
            INSERT INTO vehicles (id, plate_number, latitude, longitude, available, driver_name, driver_contact, last_updated_at, revision)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.plate_number)
        .bind(vehicle.latitude)
        .bind(vehicle.longitude)
        .bind(vehicle.available)
        .bind(&vehicle.driver_name)
        .bind(&vehicle.driver_contact)
        .bind(vehicle.last_updated_at)
        .bind(vehicle.revision)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(vehicle) => Ok(vehicle),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                AppError::BadRequest(format!("Plate '{}' is already registered", vehicle.plate_number)),
            ),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    async fn list_all(&self) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles ORDER BY plate_number")
            .fetch_all(&self.pool)
            .await?;

        Ok(vehicles)
    }

    async fn list_available(&self) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE available")
            .fetch_all(&self.pool)
            .await?;

        Ok(vehicles)
    }

    async fn claim(
        &self,
        id: Uuid,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> AppResult<ClaimOutcome> {
        // Compare-and-swap en una sola sentencia
        let claimed = sqlx::query_as::<_, Vehicle>(
            r#"
            UPDATE vehicles
            SET available = FALSE, revision = revision + 1, last_updated_at = $3
            WHERE id = $1 AND revision = $2 AND available
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_revision)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(vehicle) = claimed {
            return Ok(ClaimOutcome::Claimed(vehicle));
        }

        // Solo para clasificar el fallo; no decide nada
        let current: Option<(i64, bool)> =
            sqlx::query_as("SELECT revision, available FROM vehicles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match current {
            None => ClaimOutcome::NotFound,
            Some((revision, _)) if revision != expected_revision => {
                ClaimOutcome::ConcurrencyConflict {
                    current_revision: revision,
                }
            }
            Some(_) => ClaimOutcome::AlreadyUnavailable,
        })
    }

    async fn release(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            UPDATE vehicles
            SET available = TRUE, revision = revision + 1, last_updated_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    async fn release_if_unchanged(
        &self,
        id: Uuid,
        expected_revision: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            UPDATE vehicles
            SET available = TRUE, revision = revision + 1, last_updated_at = $3
            WHERE id = $1 AND revision = $2 AND NOT available
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_revision)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    async fn update_location(
        &self,
        id: Uuid,
        latitude: f64,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            UPDATE vehicles
            SET latitude = $2, longitude = $3, last_updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(latitude)
        .bind(longitude)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    async fn remove_if_available(&self, id: Uuid) -> AppResult<RemovalOutcome> {
        let deleted = sqlx::query("DELETE FROM vehicles WHERE id = $1 AND available")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted > 0 {
            return Ok(RemovalOutcome::Removed);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM vehicles WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(if exists {
            RemovalOutcome::InUse
        } else {
            RemovalOutcome::NotFound
        })
    }
}
