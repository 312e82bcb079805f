//! Utilidades de validación
//!
//! Funciones helper compartidas por los DTOs y por el núcleo de despacho.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

use crate::models::vehicle::NewVehicle;
use crate::utils::errors::{validation_error, AppResult};

lazy_static! {
    /// Formato aceptado para el contacto del conductor
    pub static ref DRIVER_CONTACT_RE: Regex = Regex::new(r"^[0-9+\-() ]{7,15}$").unwrap();
}

pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

/// Longitud máxima de descripciones y detalles de historial
pub const MAX_DETAIL_LENGTH: usize = 500;

pub const MAX_PLATE_LENGTH: usize = 15;
pub const MAX_DRIVER_NAME_LENGTH: usize = 100;

/// Validar que latitud y longitud estén dentro del rango geográfico estándar
pub fn validate_coordinates(latitude: f64, longitude: f64) -> AppResult<()> {
    if !latitude.is_finite() || !(MIN_LATITUDE..=MAX_LATITUDE).contains(&latitude) {
        return Err(validation_error(
            "latitude",
            "Latitude must be between -90 and 90",
        ));
    }
    if !longitude.is_finite() || !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&longitude) {
        return Err(validation_error(
            "longitude",
            "Longitude must be between -180 and 180",
        ));
    }
    Ok(())
}

/// Reglas de alta de un vehículo: matrícula, conductor, contacto y posición
pub fn validate_new_vehicle(new: &NewVehicle) -> AppResult<()> {
    let plate_len = new.plate_number.trim().chars().count();
    if plate_len == 0 || plate_len > MAX_PLATE_LENGTH {
        return Err(validation_error(
            "plate_number",
            "Plate number must be between 1 and 15 characters",
        ));
    }
    let name_len = new.driver_name.trim().chars().count();
    if name_len == 0 || name_len > MAX_DRIVER_NAME_LENGTH {
        return Err(validation_error(
            "driver_name",
            "Driver name must be between 1 and 100 characters",
        ));
    }
    if !DRIVER_CONTACT_RE.is_match(&new.driver_contact) {
        return Err(validation_error(
            "driver_contact",
            "Driver contact must be 7-15 digits, spaces or +-() characters",
        ));
    }
    validate_coordinates(new.latitude, new.longitude)
}

/// Validar que un string no esté vacío
pub fn validate_not_empty(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Recortar un texto libre a `max` caracteres sin partir caracteres multibyte
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
