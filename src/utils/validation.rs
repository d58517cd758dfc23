//! Validaciones de negocio compartidas
//!
//! Chequeos que no caben en los derives de `validator` porque también
//! se usan fuera de los DTOs HTTP (frames de WebSocket, consumidores).

use chrono::Datelike;

use crate::models::driver::VehicleAttributes;
use crate::utils::errors::AppError;
use crate::utils::geo::coordinates_in_range;

/// Valida un par latitud/longitud
pub fn validate_location(latitude: f64, longitude: f64) -> Result<(), AppError> {
    if !coordinates_in_range(latitude, longitude) {
        return Err(AppError::BadRequest(
            "latitude must be within [-90, 90] and longitude within [-180, 180]".to_string(),
        ));
    }
    Ok(())
}

/// Valida los atributos del vehículo al registrar un conductor
pub fn validate_vehicle_attributes(attrs: &VehicleAttributes) -> Result<(), AppError> {
    if attrs.color.trim().is_empty() {
        return Err(AppError::BadRequest("vehicle_attrs.color is required".to_string()));
    }
    if attrs.model.trim().is_empty() {
        return Err(AppError::BadRequest("vehicle_attrs.model is required".to_string()));
    }

    let current_year = chrono::Utc::now().year();
    if attrs.year < 1990 || attrs.year > current_year {
        return Err(AppError::BadRequest(format!(
            "vehicle_attrs.year must be between 1990 and {}",
            current_year
        )));
    }

    Ok(())
}

/// Valida distancia y duración reales al completar un viaje
pub fn validate_completion(actual_distance_km: f64, actual_duration_minutes: i32) -> Result<(), AppError> {
    if actual_distance_km <= 0.0 {
        return Err(AppError::BadRequest(
            "actual_distance_km must be greater than 0".to_string(),
        ));
    }
    if actual_duration_minutes <= 0 {
        return Err(AppError::BadRequest(
            "actual_duration_minutes must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_bounds() {
        assert!(validate_location(43.23, 76.88).is_ok());
        assert!(validate_location(-91.0, 0.0).is_err());
        assert!(validate_location(0.0, 181.0).is_err());
    }

    #[test]
    fn vehicle_attributes_checks() {
        let mut attrs = VehicleAttributes {
            color: "blue".to_string(),
            model: "Camry".to_string(),
            year: 2020,
        };
        assert!(validate_vehicle_attributes(&attrs).is_ok());

        attrs.year = 1980;
        assert!(validate_vehicle_attributes(&attrs).is_err());

        attrs.year = 2020;
        attrs.color = " ".to_string();
        assert!(validate_vehicle_attributes(&attrs).is_err());
    }

    #[test]
    fn completion_requires_positive_figures() {
        assert!(validate_completion(4.2, 12).is_ok());
        assert!(validate_completion(0.0, 12).is_err());
        assert!(validate_completion(4.2, 0).is_err());
    }
}
