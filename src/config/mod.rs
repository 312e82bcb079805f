//! Configuración del proyecto
//!
//! Variables de entorno, parámetros del despacho y pool de base de datos.

pub mod database;
pub mod environment;

pub use database::DatabaseConfig;
pub use environment::{DispatchSettings, EnvironmentConfig};
