//! Cálculos geográficos
//!
//! Distancia de gran círculo (haversine) y ETA a velocidad constante.
//! Funciones puras, sin estado.

/// Radio medio de la Tierra en kilómetros
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Velocidad media asumida para un vehículo de emergencia
pub const DEFAULT_SPEED_KMH: f64 = 60.0;

/// Velocidad mínima configurable; por debajo el ETA deja de tener sentido
pub const MIN_SPEED_KMH: f64 = 1.0;

/// Distancia de gran círculo entre dos puntos, en kilómetros
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    // `a` puede salirse de [0, 1] por redondeo en puntos antipodales
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Minutos para cubrir la distancia de gran círculo a `speed_kmh`, truncados hacia cero
pub fn eta_minutes(lat1: f64, lon1: f64, lat2: f64, lon2: f64, speed_kmh: f64) -> i64 {
    if !(speed_kmh > 0.0) {
        return 0;
    }
    let minutes = distance_km(lat1, lon1, lat2, lon2) / speed_kmh * 60.0;
    minutes.floor().max(0.0) as i64
}

/// ETA con la velocidad por defecto de 60 km/h
pub fn eta_minutes_default(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> i64 {
    eta_minutes(lat1, lon1, lat2, lon2, DEFAULT_SPEED_KMH)
}

/// Texto legible para un ETA en minutos
pub fn format_eta(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let remaining = minutes % 60;

    if hours > 0 {
        format!("{} hour(s) and {} minute(s)", hours, remaining)
    } else if minutes > 0 {
        format!("{} minute(s)", minutes)
    } else {
        "less than a minute".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero_for_same_point() {
        assert_eq!(distance_km(12.5, -45.25, 12.5, -45.25), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let ab = distance_km(40.4168, -3.7038, 48.8566, 2.3522);
        let ba = distance_km(48.8566, 2.3522, 40.4168, -3.7038);
        assert!((ab - ba).abs() < 1e-9);
        // Madrid - París ~ 1053 km
        assert!((ab - 1053.0).abs() < 5.0);
    }

    #[test]
    fn test_distance_domain_edges() {
        let poles = distance_km(90.0, 0.0, -90.0, 0.0);
        assert!((poles - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);

        let antipodal = distance_km(0.0, -180.0, 0.0, 0.0);
        assert!(antipodal.is_finite());
        assert!(antipodal > 0.0);

        let across_dateline = distance_km(0.0, 179.9, 0.0, -179.9);
        assert!(across_dateline < 25.0);
    }

    #[test]
    fn test_scenario_distances() {
        let to_a = distance_km(0.0, 0.0, 0.01, 0.01);
        let to_b = distance_km(1.0, 1.0, 0.01, 0.01);
        assert!((to_a - 1.57).abs() < 0.01);
        assert!((to_b - 155.7).abs() < 1.0);
        assert_eq!(eta_minutes_default(0.0, 0.0, 0.01, 0.01), 1);
    }

    #[test]
    fn test_eta_truncates_toward_zero() {
        // ~1.57 km a 60 km/h = 1.57 minutos -> 1
        assert_eq!(eta_minutes(0.0, 0.0, 0.01, 0.01, 60.0), 1);
        // A 30 km/h = 3.14 minutos -> 3
        assert_eq!(eta_minutes(0.0, 0.0, 0.01, 0.01, 30.0), 3);
        assert_eq!(eta_minutes(5.0, 5.0, 5.0, 5.0, 60.0), 0);
    }

    #[test]
    fn test_eta_monotonic_in_distance() {
        let mut previous = 0;
        for step in 0..200 {
            let lat = step as f64 * 0.05;
            let eta = eta_minutes_default(0.0, 0.0, lat, 0.0);
            assert!(eta >= 0);
            assert!(eta >= previous);
            previous = eta;
        }
    }

    #[test]
    fn test_eta_with_non_positive_speed() {
        assert_eq!(eta_minutes(0.0, 0.0, 1.0, 1.0, 0.0), 0);
        assert_eq!(eta_minutes(0.0, 0.0, 1.0, 1.0, -10.0), 0);
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(0), "less than a minute");
        assert_eq!(format_eta(1), "1 minute(s)");
        assert_eq!(format_eta(59), "59 minute(s)");
        assert_eq!(format_eta(90), "1 hour(s) and 30 minute(s)");
    }
}
