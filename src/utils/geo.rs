//! Geometría sobre coordenadas geográficas
//!
//! Distancias en línea recta (gran círculo); el enrutamiento real
//! queda fuera del sistema.

/// Radio terrestre en km
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distancia máxima al punto de recogida para poder iniciar un viaje, en km
pub const PICKUP_PROXIMITY_KM: f64 = 0.1;

fn to_radians(degrees: f64) -> f64 {
    degrees * std::f64::consts::PI / 180.0
}

/// Distancia de gran círculo (Haversine) entre dos puntos, en km
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = to_radians(lat1);
    let phi2 = to_radians(lat2);
    let delta_phi = to_radians(lat2 - lat1);
    let delta_lambda = to_radians(lng2 - lng1);

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Valida rangos de latitud/longitud
pub fn coordinates_in_range(lat: f64, lng: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_distance_in_almaty() {
        // Centro de Almaty hacia el nordeste, ~3.72 km
        let d = haversine_km(43.2389, 76.8897, 43.2567, 76.9286);
        assert!((d - 3.7208).abs() < 0.001, "distance was {}", d);
    }

    #[test]
    fn symmetry_within_a_millimeter() {
        let pairs = [
            (43.2389, 76.8897, 43.2567, 76.9286),
            (-33.8688, 151.2093, 51.5074, -0.1278),
            (89.9, 179.9, -89.9, -179.9),
            (0.0, 0.0, 0.0, 0.0),
        ];
        for (lat1, lng1, lat2, lng2) in pairs {
            let forward = haversine_km(lat1, lng1, lat2, lng2);
            let back = haversine_km(lat2, lng2, lat1, lng1);
            assert!((forward - back).abs() < 1e-6, "asymmetric for {:?}", (lat1, lng1));
        }
    }

    #[test]
    fn zero_distance_for_same_point() {
        assert_eq!(haversine_km(43.0, 76.0, 43.0, 76.0), 0.0);
    }

    #[test]
    fn coordinate_ranges() {
        assert!(coordinates_in_range(90.0, 180.0));
        assert!(coordinates_in_range(-90.0, -180.0));
        assert!(!coordinates_in_range(90.1, 0.0));
        assert!(!coordinates_in_range(0.0, -180.5));
    }
}
