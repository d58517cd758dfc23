//! Routers de Axum por servicio

pub mod auth_routes;
pub mod driver_routes;
pub mod ride_routes;
