//! Historial de eventos del ciclo de vida
//!
//! Log de solo-anexado escrito por el motor. No es fuente de verdad: una
//! entrada perdida no invalida el estado de la solicitud ni del vehículo.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::models::history::{HistoryEntry, HistoryEventKind};
use crate::repositories::HistoryStore;
use crate::utils::errors::AppResult;
use crate::utils::validation::{truncate_chars, MAX_DETAIL_LENGTH};

#[derive(Clone)]
pub struct HistoryLog {
    store: Arc<dyn HistoryStore>,
}

impl HistoryLog {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        request_id: Uuid,
        event_kind: HistoryEventKind,
        details: impl Into<String>,
    ) -> AppResult<HistoryEntry> {
        let details = truncate_chars(&details.into(), MAX_DETAIL_LENGTH);
        let details = (!details.is_empty()).then_some(details);

        let entry = self
            .store
            .append(request_id, event_kind, details, Utc::now())
            .await?;
        debug!(request_id = %request_id, kind = %event_kind, "📜 Entrada de historial añadida");
        Ok(entry)
    }

    /// Entradas de una solicitud en orden de inserción
    pub async fn for_request(&self, request_id: Uuid) -> AppResult<Vec<HistoryEntry>> {
        self.store.list_for_request(request_id).await
    }
}
