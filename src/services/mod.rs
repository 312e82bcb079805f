//! Services module
//!
//! Lógica de negocio del despacho. El motor es el único componente que
//! coordina a los demás; registro, libro e historial no se conocen entre sí.

pub mod dispatch_engine;
pub mod history_log;
pub mod metrics;
pub mod notification_gateway;
pub mod request_ledger;
pub mod vehicle_registry;

pub use dispatch_engine::{DispatchEngine, DispatchOptions};
pub use history_log::HistoryLog;
pub use metrics::DispatchMetrics;
pub use notification_gateway::{
    NotificationError, NotificationGateway, SessionNotificationGateway, SessionRegistry,
};
pub use request_ledger::RequestLedger;
pub use vehicle_registry::VehicleRegistry;
