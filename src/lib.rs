//! Despacho de vehículos de emergencia
//!
//! Asigna a cada solicitud el vehículo disponible más cercano con reclamo
//! atómico, lleva el ciclo de vida de la solicitud y notifica a las partes.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_router;
pub use state::AppState;
