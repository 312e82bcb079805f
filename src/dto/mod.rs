//! DTOs de la API HTTP

pub mod common;
pub mod request_dto;
pub mod vehicle_dto;

pub use common::ApiResponse;
