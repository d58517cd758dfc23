//! Cálculo de tarifas
//!
//! Tabla de tarifas por tipo de viaje y las dos fórmulas que la usan:
//! la estimación al crear el viaje y la tarifa final al completarlo.
//! El conductor recibe un porcentaje fijo de la tarifa final.

use crate::models::ride::RideType;

/// Porción de la tarifa final que gana el conductor
pub const DRIVER_SHARE: f64 = 0.8;

/// Tarifa base, por km y por minuto de un tipo de viaje
#[derive(Debug, Clone, Copy)]
pub struct FareRate {
    pub base: f64,
    pub per_km: f64,
    pub per_min: f64,
}

/// Tarifas vigentes por tipo de viaje
pub fn rate_for(ride_type: RideType) -> FareRate {
    match ride_type {
        RideType::Economy => FareRate { base: 500.0, per_km: 100.0, per_min: 50.0 },
        RideType::Premium => FareRate { base: 800.0, per_km: 120.0, per_min: 60.0 },
        RideType::Xl => FareRate { base: 1000.0, per_km: 150.0, per_min: 75.0 },
    }
}

/// Estimación inicial: duración en minutos a partir de la distancia
/// (2 min por km, mínimo 1) y tarifa con la fórmula estándar.
pub fn estimate(ride_type: RideType, distance_km: f64) -> (i32, f64) {
    let duration_minutes = ((distance_km * 2.0) as i32).max(1);
    let rate = rate_for(ride_type);
    let fare = rate.base + distance_km * rate.per_km + f64::from(duration_minutes) * rate.per_min;
    (duration_minutes, fare)
}

/// Tarifa final sobre distancia y duración reales, nunca por debajo
/// de la tarifa base del tipo.
pub fn final_fare(ride_type: RideType, actual_distance_km: f64, actual_duration_minutes: f64) -> f64 {
    let rate = rate_for(ride_type);
    let fare = rate.base + actual_distance_km * rate.per_km + actual_duration_minutes * rate.per_min;
    fare.max(rate.base)
}

/// Ganancia del conductor sobre la tarifa final
pub fn driver_earnings(fare: f64) -> f64 {
    fare * DRIVER_SHARE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn economy_estimate_for_almaty_trip() {
        // 3.88 km -> 7 minutos -> 500 + 388 + 350 = 1238
        let (duration, fare) = estimate(RideType::Economy, 3.88);
        assert_eq!(duration, 7);
        assert!((fare - 1238.0).abs() < 0.01, "fare was {}", fare);
    }

    #[test]
    fn minimum_duration_is_one_minute() {
        let (duration, fare) = estimate(RideType::Economy, 0.1);
        assert_eq!(duration, 1);
        assert!((fare - (500.0 + 10.0 + 50.0)).abs() < 1e-9);
    }

    #[test]
    fn final_fare_never_below_base() {
        assert_eq!(final_fare(RideType::Premium, 0.0, 0.0), 800.0);
        assert_eq!(final_fare(RideType::Xl, 0.0, 0.0), 1000.0);
    }

    #[test]
    fn final_fare_formula_per_type() {
        let fare = final_fare(RideType::Economy, 10.0, 20.0);
        assert!((fare - (500.0 + 1000.0 + 1000.0)).abs() < 1e-9);

        let fare = final_fare(RideType::Premium, 5.0, 12.0);
        assert!((fare - (800.0 + 600.0 + 720.0)).abs() < 1e-9);
    }

    #[test]
    fn driver_gets_eighty_percent() {
        let fare = final_fare(RideType::Economy, 10.0, 20.0);
        assert!((driver_earnings(fare) - fare * 0.8).abs() < 1e-9);
    }
}
