//! Configuración de variables de entorno
//!
//! Todas las claves tienen un valor por defecto razonable salvo
//! `DATABASE_URL`, cuya ausencia selecciona el almacenamiento en memoria.
//! Un número mal formado es un error de arranque, nunca un default silencioso.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use crate::services::dispatch_engine::DispatchOptions;
use crate::utils::geo::{DEFAULT_SPEED_KMH, MIN_SPEED_KMH};

/// Parámetros del motor de despacho
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchSettings {
    /// Opciones usadas cuando el llamador no envía las suyas
    pub default_options: DispatchOptions,
    /// Velocidad constante usada para el ETA
    pub speed_kmh: f64,
    /// Antigüedad mínima de un vehículo no disponible y sin solicitud
    /// activa antes de que la reconciliación lo devuelva a la flota
    pub release_grace_secs: u32,
    /// Periodo de la reconciliación de flota; 0 la desactiva
    pub reconcile_interval_secs: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_options: DispatchOptions::default(),
            speed_kmh: DEFAULT_SPEED_KMH,
            release_grace_secs: 30,
            reconcile_interval_secs: 60,
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub cors_origins: Vec<String>,
    pub dispatch: DispatchSettings,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            cors_origins: Vec::new(),
            dispatch: DispatchSettings::default(),
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración del proceso
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Leer la configuración desde una fuente arbitraria de claves
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let dispatch = DispatchSettings {
            default_options: DispatchOptions {
                candidate_pool_size: parse_or(
                    &get,
                    "DISPATCH_CANDIDATE_POOL_SIZE",
                    defaults.dispatch.default_options.candidate_pool_size,
                )?,
                max_attempts: parse_or(
                    &get,
                    "DISPATCH_MAX_ATTEMPTS",
                    defaults.dispatch.default_options.max_attempts,
                )?,
            },
            speed_kmh: parse_or(&get, "DISPATCH_SPEED_KMH", defaults.dispatch.speed_kmh)?,
            release_grace_secs: parse_or(
                &get,
                "DISPATCH_RELEASE_GRACE_SECS",
                defaults.dispatch.release_grace_secs,
            )?,
            reconcile_interval_secs: parse_or(
                &get,
                "DISPATCH_RECONCILE_INTERVAL_SECS",
                defaults.dispatch.reconcile_interval_secs,
            )?,
        };

        if dispatch.default_options.validate().is_err() {
            anyhow::bail!("DISPATCH_CANDIDATE_POOL_SIZE and DISPATCH_MAX_ATTEMPTS must be at least 1");
        }
        if !(dispatch.speed_kmh.is_finite() && dispatch.speed_kmh >= MIN_SPEED_KMH) {
            anyhow::bail!("DISPATCH_SPEED_KMH must be a number >= {}", MIN_SPEED_KMH);
        }

        Ok(Self {
            environment: get("APP_ENV").unwrap_or(defaults.environment),
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(&get, "PORT", defaults.port)?,
            log_level: get("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(
                &get,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            cors_origins: get("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            dispatch,
        })
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number, got '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<EnvironmentConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvironmentConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server_url(), "0.0.0.0:3000");
        assert!(config.is_development());
        assert!(config.database_url.is_none());
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.dispatch, DispatchSettings::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("APP_ENV", "production"),
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://dispatch@localhost/dispatch"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("DISPATCH_CANDIDATE_POOL_SIZE", "5"),
            ("DISPATCH_MAX_ATTEMPTS", "2"),
            ("DISPATCH_SPEED_KMH", "45.5"),
            ("DISPATCH_RELEASE_GRACE_SECS", "5"),
            ("DISPATCH_RECONCILE_INTERVAL_SECS", "0"),
        ])
        .unwrap();

        assert!(config.is_production());
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.dispatch.default_options.candidate_pool_size, 5);
        assert_eq!(config.dispatch.default_options.max_attempts, 2);
        assert_eq!(config.dispatch.speed_kmh, 45.5);
        assert_eq!(config.dispatch.release_grace_secs, 5);
        assert_eq!(config.dispatch.reconcile_interval_secs, 0);
    }

    #[test]
    fn test_malformed_numbers_are_errors() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("DISPATCH_MAX_ATTEMPTS", "-1")]).is_err());
        assert!(config_from(&[("DISPATCH_CANDIDATE_POOL_SIZE", "0")]).is_err());
        assert!(config_from(&[("DISPATCH_SPEED_KMH", "0")]).is_err());
    }

    #[test]
    fn test_speed_below_minimum_is_rejected() {
        assert!(config_from(&[("DISPATCH_SPEED_KMH", "1e-300")]).is_err());
        assert!(config_from(&[("DISPATCH_SPEED_KMH", "0.5")]).is_err());
        assert!(config_from(&[("DISPATCH_SPEED_KMH", "inf")]).is_err());
        let config = config_from(&[("DISPATCH_SPEED_KMH", "1")]).unwrap();
        assert_eq!(config.dispatch.speed_kmh, 1.0);
    }
}
