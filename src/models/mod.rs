//! Modelos de dominio
//!
//! Entidades persistidas y sus máquinas de estado.

pub mod coordinate;
pub mod driver;
pub mod ride;
pub mod user;
