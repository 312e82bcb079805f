//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::{
    HistoryStore, InMemoryHistoryRepository, InMemoryRequestRepository,
    InMemoryVehicleRepository, PgHistoryRepository, PgRequestRepository, PgVehicleRepository,
    RequestStore, VehicleStore,
};
use crate::services::{
    DispatchEngine, DispatchMetrics, HistoryLog, RequestLedger, SessionNotificationGateway,
    SessionRegistry, VehicleRegistry,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DispatchEngine>,
    pub sessions: SessionRegistry,
    pub metrics: DispatchMetrics,
    pub config: EnvironmentConfig,
}

impl AppState {
    /// Estado sobre los almacenes en memoria del proceso
    pub fn in_memory(config: EnvironmentConfig) -> Result<Self> {
        Self::with_stores(
            config,
            Arc::new(InMemoryVehicleRepository::new()),
            Arc::new(InMemoryRequestRepository::new()),
            Arc::new(InMemoryHistoryRepository::new()),
        )
    }

    /// Estado sobre PostgreSQL
    pub fn postgres(config: EnvironmentConfig, pool: PgPool) -> Result<Self> {
        Self::with_stores(
            config,
            Arc::new(PgVehicleRepository::new(pool.clone())),
            Arc::new(PgRequestRepository::new(pool.clone())),
            Arc::new(PgHistoryRepository::new(pool)),
        )
    }

    pub fn with_stores(
        config: EnvironmentConfig,
        vehicles: Arc<dyn VehicleStore>,
        requests: Arc<dyn RequestStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Result<Self> {
        let sessions = SessionRegistry::new();
        let metrics = DispatchMetrics::new()?;

        let engine = DispatchEngine::new(
            VehicleRegistry::new(vehicles),
            RequestLedger::new(requests),
            HistoryLog::new(history),
            Arc::new(SessionNotificationGateway::new(sessions.clone())),
            metrics.clone(),
            config.dispatch,
        );

        Ok(Self {
            engine: Arc::new(engine),
            sessions,
            metrics,
            config,
        })
    }
}
