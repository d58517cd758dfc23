//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! JWT, geometría y tarifas.

pub mod errors;
pub mod fare;
pub mod geo;
pub mod jwt;
pub mod validation;
