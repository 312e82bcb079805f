//! Controladores HTTP: validan los DTOs y delegan en el motor de despacho

pub mod request_controller;
pub mod vehicle_controller;
