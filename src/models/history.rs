//! Historial de servicio
//!
//! Entradas de solo-anexado: nunca se modifican ni se eliminan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// Tipo de evento - mapea al ENUM history_event_kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "history_event_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEventKind {
    Created,
    Dispatched,
    Completed,
    Cancelled,
}

impl fmt::Display for HistoryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HistoryEventKind::Created => "CREATED",
            HistoryEventKind::Dispatched => "DISPATCHED",
            HistoryEventKind::Completed => "COMPLETED",
            HistoryEventKind::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    pub event_kind: HistoryEventKind,
    /// Asignado por el servidor, no decreciente por solicitud
    pub event_time: DateTime<Utc>,
    pub details: Option<String>,
}
