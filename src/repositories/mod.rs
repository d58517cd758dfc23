//! Repositorios de acceso a datos
//!
//! Cada transición de estado es una única transacción serializada por
//! el lock de fila del viaje; la coordinación entre servicios pasa por
//! la bitácora de eventos, no por locks distribuidos.

pub mod driver_repository;
pub mod location_repository;
pub mod ride_repository;
pub mod user_repository;
