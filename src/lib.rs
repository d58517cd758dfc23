//! Backend de ride-hailing
//!
//! Cuatro piezas cooperan sobre una base de datos PostGIS y un broker
//! de mensajes: el servicio de viajes (ride), el despacho de conductores
//! (dispatch), el servicio de autenticación y los canales push en tiempo
//! real. Cada servicio es un binario propio bajo `src/bin/`.

pub mod config;
pub mod consumers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod mq;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
pub mod ws;
