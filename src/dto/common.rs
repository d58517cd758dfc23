//! Tipos compartidos entre DTOs HTTP, frames de socket y mensajes del broker

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::VehicleAttributes;

/// Par latitud/longitud compacto (claves `lat`/`lng` en el cable)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Punto con dirección legible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

/// Posición reportada por el conductor en requests HTTP y frames
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Datos del conductor que se muestran al pasajero tras el match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverInfo {
    pub driver_id: Uuid,
    pub name: String,
    pub rating: f64,
    pub vehicle: VehicleAttributes,
}
