//! Pasarela de notificaciones
//!
//! El motor solo conoce el contrato `publish(recipient_id, event)`. La
//! entrega es de como mucho una vez y los fallos nunca deshacen un despacho.
//!
//! `SessionRegistry` mantiene las conexiones vivas (destinatario -> canal),
//! se llena al conectar y se vacía al desconectar. El motor nunca la toca.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use crate::models::notification::NotificationEvent;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Recipient '{0}' has no active session")]
    RecipientNotConnected(String),

    #[error("Session for '{0}' was closed")]
    ChannelClosed(String),

    #[error("Could not encode notification: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn publish(
        &self,
        recipient_id: &str,
        event: &NotificationEvent,
    ) -> Result<(), NotificationError>;
}

/// Conexiones vivas por destinatario
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<String>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registrar una sesión; reemplaza la anterior del mismo destinatario
    pub async fn connect(&self, recipient_id: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sessions = self.sessions.write().await;
        sessions.insert(recipient_id.to_string(), tx);
        info!(recipient_id, total = sessions.len(), "🔌 Sesión conectada");
        rx
    }

    pub async fn disconnect(&self, recipient_id: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(recipient_id).is_some() {
            info!(recipient_id, total = sessions.len(), "🔌 Sesión desconectada");
        }
    }

    pub async fn is_connected(&self, recipient_id: &str) -> bool {
        self.sessions.read().await.contains_key(recipient_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn send(&self, recipient_id: &str, message: String) -> Result<(), NotificationError> {
        let sender = self
            .sessions
            .read()
            .await
            .get(recipient_id)
            .cloned()
            .ok_or_else(|| NotificationError::RecipientNotConnected(recipient_id.to_string()))?;

        if sender.send(message).is_err() {
            // Receptor descartado; solo se quita si nadie se reconectó entretanto
            self.remove_if_same(recipient_id, &sender).await;
            return Err(NotificationError::ChannelClosed(recipient_id.to_string()));
        }
        Ok(())
    }

    /// Quitar la sesión solo si sigue siendo el mismo canal que `stale`
    async fn remove_if_same(&self, recipient_id: &str, stale: &mpsc::UnboundedSender<String>) {
        let mut sessions = self.sessions.write().await;
        let same = sessions
            .get(recipient_id)
            .is_some_and(|current| current.same_channel(stale));
        if same {
            sessions.remove(recipient_id);
            info!(recipient_id, total = sessions.len(), "🔌 Sesión cerrada descartada");
        }
    }
}

/// Pasarela que entrega los eventos como JSON por la sesión del destinatario
#[derive(Clone)]
pub struct SessionNotificationGateway {
    sessions: SessionRegistry,
}

impl SessionNotificationGateway {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl NotificationGateway for SessionNotificationGateway {
    async fn publish(
        &self,
        recipient_id: &str,
        event: &NotificationEvent,
    ) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(event)?;
        self.sessions.send(recipient_id, payload).await?;
        debug!(recipient_id, request_id = %event.request_id(), "📨 Notificación publicada");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::LocationNotification;
    use chrono::Utc;
    use uuid::Uuid;

    fn location_event() -> NotificationEvent {
        NotificationEvent::VehicleLocation(LocationNotification {
            request_id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            latitude: 1.5,
            longitude: 2.5,
            updated_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_publish_to_connected_recipient() {
        let sessions = SessionRegistry::new();
        let gateway = SessionNotificationGateway::new(sessions.clone());
        let mut rx = sessions.connect("user-1").await;

        let event = location_event();
        gateway.publish("user-1", &event).await.unwrap();

        let raw = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "VEHICLE_LOCATION");
        assert_eq!(value["latitude"], 1.5);
        let decoded: NotificationEvent = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, event);
    }

    #[tokio::test]
    async fn test_publish_without_session_fails() {
        let gateway = SessionNotificationGateway::new(SessionRegistry::new());
        let err = gateway.publish("nobody", &location_event()).await.unwrap_err();
        assert!(matches!(err, NotificationError::RecipientNotConnected(_)));
    }

    #[tokio::test]
    async fn test_closed_session_is_dropped() {
        let sessions = SessionRegistry::new();
        let gateway = SessionNotificationGateway::new(sessions.clone());
        let rx = sessions.connect("user-2").await;
        drop(rx);

        let err = gateway.publish("user-2", &location_event()).await.unwrap_err();
        assert!(matches!(err, NotificationError::ChannelClosed(_)));
        assert!(!sessions.is_connected("user-2").await);
    }

    #[tokio::test]
    async fn test_stale_channel_does_not_drop_reconnected_session() {
        let sessions = SessionRegistry::new();
        let old_rx = sessions.connect("user-4").await;
        let stale = sessions.sessions.read().await.get("user-4").cloned().unwrap();
        drop(old_rx);

        // Reconexión antes de que el envío fallido limpie su canal
        let mut new_rx = sessions.connect("user-4").await;
        sessions.remove_if_same("user-4", &stale).await;
        assert!(sessions.is_connected("user-4").await);

        let gateway = SessionNotificationGateway::new(sessions.clone());
        gateway.publish("user-4", &location_event()).await.unwrap();
        assert!(new_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_disconnect_removes_session() {
        let sessions = SessionRegistry::new();
        let _rx = sessions.connect("user-3").await;
        assert_eq!(sessions.session_count().await, 1);
        sessions.disconnect("user-3").await;
        assert_eq!(sessions.session_count().await, 0);
    }
}
