//! Repositorios
//!
//! Traits de almacenamiento y sus implementaciones sobre PostgreSQL
//! y en memoria.

pub mod history_repository;
pub mod memory;
pub mod request_repository;
pub mod vehicle_repository;

pub use history_repository::{HistoryStore, PgHistoryRepository};
pub use memory::{InMemoryHistoryRepository, InMemoryRequestRepository, InMemoryVehicleRepository};
pub use request_repository::{PgRequestRepository, RequestStore};
pub use vehicle_repository::{PgVehicleRepository, VehicleStore};
