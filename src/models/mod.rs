//! Modelos del sistema
//!
//! Este módulo contiene todos los modelos de datos que mapean exactamente
//! al schema PostgreSQL.

pub mod history;
pub mod notification;
pub mod request;
pub mod vehicle;

pub use history::{HistoryEntry, HistoryEventKind};
pub use notification::{DispatchNotification, LocationNotification, NotificationEvent};
pub use request::{
    NewServiceRequest, RequestStatus, RequestTransition, ServiceRequest, TransitionOutcome,
};
pub use vehicle::{ClaimOutcome, NewVehicle, RemovalOutcome, Vehicle};
