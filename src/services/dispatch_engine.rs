//! Motor de despacho
//!
//! Orquesta registro de vehículos, libro de solicitudes, historial y
//! notificaciones. Es el único componente con política de reintentos:
//! los conflictos de reclamo se absorben aquí y nunca llegan al llamador.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::environment::DispatchSettings;
use crate::models::history::{HistoryEntry, HistoryEventKind};
use crate::models::notification::{DispatchNotification, LocationNotification, NotificationEvent};
use crate::models::request::{NewServiceRequest, RequestStatus, ServiceRequest};
use crate::models::vehicle::{ClaimOutcome, Vehicle};
use crate::services::history_log::HistoryLog;
use crate::services::metrics::{
    DispatchMetrics, OUTCOME_DISPATCHED, OUTCOME_ERROR, OUTCOME_NO_VEHICLE, OUTCOME_REJECTED,
};
use crate::services::notification_gateway::NotificationGateway;
use crate::services::request_ledger::{invalid_transition, RequestLedger};
use crate::services::vehicle_registry::VehicleRegistry;
use crate::utils::errors::{bad_request_error, AppError, AppResult};
use crate::utils::geo;

/// Intentos para devolver un vehículo a la flota tras una transición terminal
const RELEASE_ATTEMPTS: u32 = 3;
const RELEASE_BACKOFF: Duration = Duration::from_millis(25);

/// Parámetros de un despacho
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Vehículos más cercanos considerados por ronda
    pub candidate_pool_size: usize,
    /// Rondas totales (consulta + intentos de reclamo) antes de rendirse
    pub max_attempts: u32,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            candidate_pool_size: 3,
            max_attempts: 3,
        }
    }
}

impl DispatchOptions {
    pub fn validate(&self) -> AppResult<()> {
        if self.candidate_pool_size == 0 {
            return Err(bad_request_error("candidate_pool_size must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(bad_request_error("max_attempts must be at least 1"));
        }
        Ok(())
    }
}

pub struct DispatchEngine {
    vehicles: VehicleRegistry,
    requests: RequestLedger,
    history: HistoryLog,
    notifier: Arc<dyn NotificationGateway>,
    metrics: DispatchMetrics,
    settings: DispatchSettings,
}

impl DispatchEngine {
    pub fn new(
        vehicles: VehicleRegistry,
        requests: RequestLedger,
        history: HistoryLog,
        notifier: Arc<dyn NotificationGateway>,
        metrics: DispatchMetrics,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            vehicles,
            requests,
            history,
            notifier,
            metrics,
            settings,
        }
    }

    pub fn vehicles(&self) -> &VehicleRegistry {
        &self.vehicles
    }

    pub fn requests(&self) -> &RequestLedger {
        &self.requests
    }

    pub fn metrics(&self) -> &DispatchMetrics {
        &self.metrics
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Crear una solicitud `PENDING`. No selecciona vehículo.
    pub async fn create_request(&self, new: NewServiceRequest) -> AppResult<ServiceRequest> {
        let request = self.requests.create(new).await?;
        let details = request.description.clone().unwrap_or_default();
        self.append_history(request.id, HistoryEventKind::Created, details)
            .await;
        Ok(request)
    }

    pub async fn get_request(&self, request_id: Uuid) -> AppResult<ServiceRequest> {
        self.requests.get(request_id).await
    }

    /// Despacho con los parámetros por defecto de la configuración
    pub async fn dispatch(&self, request_id: Uuid) -> AppResult<ServiceRequest> {
        self.dispatch_with(request_id, self.settings.default_options)
            .await
    }

    pub async fn dispatch_with(
        &self,
        request_id: Uuid,
        options: DispatchOptions,
    ) -> AppResult<ServiceRequest> {
        let result = self.try_dispatch(request_id, options).await;

        let outcome = match &result {
            Ok(_) => OUTCOME_DISPATCHED,
            Err(AppError::NoAvailableVehicle) => OUTCOME_NO_VEHICLE,
            Err(AppError::NotFound(_))
            | Err(AppError::InvalidStateTransition { .. })
            | Err(AppError::BadRequest(_)) => OUTCOME_REJECTED,
            Err(_) => OUTCOME_ERROR,
        };
        self.metrics.record_outcome(outcome);

        result
    }

    async fn try_dispatch(
        &self,
        request_id: Uuid,
        options: DispatchOptions,
    ) -> AppResult<ServiceRequest> {
        options.validate()?;

        let request = self.requests.get(request_id).await?;
        if request.status != RequestStatus::Pending {
            return Err(invalid_transition(
                request.id,
                request.status,
                RequestStatus::Dispatched,
            ));
        }

        let vehicle = self.claim_nearest(&request, options).await?;

        let eta = geo::eta_minutes(
            vehicle.latitude,
            vehicle.longitude,
            request.latitude,
            request.longitude,
            self.settings.speed_kmh,
        );

        let dispatched = match self
            .requests
            .mark_dispatched(request.id, vehicle.id, eta)
            .await
        {
            Ok(dispatched) => dispatched,
            Err(err) => {
                // El vehículo quedó reclamado sin solicitud: devolverlo antes de propagar
                warn!(
                    request_id = %request.id,
                    vehicle_id = %vehicle.id,
                    error = %err,
                    "↩️ Despacho fallido tras el reclamo, liberando vehículo"
                );
                self.metrics.record_compensating_release();
                if let Err(release_err) = self.release_with_retry(vehicle.id).await {
                    error!(
                        vehicle_id = %vehicle.id,
                        error = %release_err,
                        "❌ No se pudo liberar el vehículo tras el fallo del despacho"
                    );
                }
                return Err(err);
            }
        };

        info!(
            request_id = %dispatched.id,
            vehicle_id = %vehicle.id,
            plate = %vehicle.plate_number,
            eta_minutes = eta,
            "🚑 Vehículo despachado"
        );

        // Un cancel concurrente pudo cerrar la solicitud justo después de la
        // transición; en ese caso ni historial DISPATCHED ni avisos.
        let current = self.requests.get(dispatched.id).await?;
        if current.status != RequestStatus::Dispatched {
            debug!(
                request_id = %current.id,
                status = %current.status,
                "Solicitud cerrada tras el despacho, se omiten historial y avisos"
            );
            return Ok(current);
        }

        self.append_history(
            dispatched.id,
            HistoryEventKind::Dispatched,
            format!(
                "Vehicle {} ({}) dispatched, ETA {} minute(s)",
                vehicle.id, vehicle.plate_number, eta
            ),
        )
        .await;

        self.notify_dispatch(&dispatched, &vehicle, eta).await;

        Ok(dispatched)
    }

    /// Recorre los candidatos más cercanos intentando el reclamo; si la ronda
    /// se agota vuelve a consultar el registro, hasta `max_attempts` rondas.
    async fn claim_nearest(
        &self,
        request: &ServiceRequest,
        options: DispatchOptions,
    ) -> AppResult<Vehicle> {
        for round in 1..=options.max_attempts {
            let candidates = self
                .vehicles
                .nearest_available(
                    request.latitude,
                    request.longitude,
                    options.candidate_pool_size,
                )
                .await?;

            if candidates.is_empty() {
                debug!(request_id = %request.id, round, "Sin candidatos disponibles");
                break;
            }

            for candidate in candidates {
                match self.vehicles.claim(candidate.id, candidate.revision).await? {
                    ClaimOutcome::Claimed(vehicle) => {
                        debug!(
                            request_id = %request.id,
                            vehicle_id = %vehicle.id,
                            round,
                            "Reclamo ganado"
                        );
                        return Ok(vehicle);
                    }
                    lost => {
                        self.metrics.record_claim_conflict();
                        debug!(
                            request_id = %request.id,
                            vehicle_id = %candidate.id,
                            round,
                            outcome = lost.label(),
                            "Reclamo perdido, probando el siguiente candidato"
                        );
                    }
                }
            }

            debug!(request_id = %request.id, round, "Candidatos agotados en esta ronda");
        }

        warn!(request_id = %request.id, "⚠️ Sin vehículos disponibles");
        Err(AppError::NoAvailableVehicle)
    }

    /// `DISPATCHED -> COMPLETED` y devolución del vehículo.
    ///
    /// El historial se escribe antes de liberar: si la liberación falla la
    /// solicitud ya es terminal y el vehículo queda para la reconciliación.
    pub async fn complete(&self, request_id: Uuid) -> AppResult<ServiceRequest> {
        let completed = match self.requests.mark_completed(request_id).await {
            Ok(completed) => completed,
            Err(err) => return Err(self.reconcile_after_rejection(request_id, err).await),
        };

        info!(request_id = %completed.id, "✅ Servicio completado");
        self.append_history(
            completed.id,
            HistoryEventKind::Completed,
            completed
                .vehicle_id
                .map(|id| format!("Service completed by vehicle {}", id))
                .unwrap_or_default(),
        )
        .await;

        if let Some(vehicle_id) = completed.vehicle_id {
            self.release_after_terminal(completed.id, vehicle_id).await?;
        }

        Ok(completed)
    }

    /// `PENDING | DISPATCHED -> CANCELLED`.
    ///
    /// La transición va primero y se libera el vehículo que referencia el
    /// registro terminal, así un despacho concurrente no puede dejarlo colgado.
    pub async fn cancel(&self, request_id: Uuid) -> AppResult<ServiceRequest> {
        let cancelled = match self.requests.mark_cancelled(request_id).await {
            Ok(cancelled) => cancelled,
            Err(err) => return Err(self.reconcile_after_rejection(request_id, err).await),
        };

        info!(request_id = %cancelled.id, "🛑 Solicitud cancelada");
        self.append_history(
            cancelled.id,
            HistoryEventKind::Cancelled,
            cancelled
                .vehicle_id
                .map(|id| format!("Cancelled while vehicle {} was assigned", id))
                .unwrap_or_else(|| "Cancelled before dispatch".to_string()),
        )
        .await;

        if let Some(vehicle_id) = cancelled.vehicle_id {
            self.release_after_terminal(cancelled.id, vehicle_id).await?;
        }

        Ok(cancelled)
    }

    /// Devuelve a la flota un vehículo no disponible que ninguna solicitud
    /// activa referencia. Respeta `release_grace_secs` desde su última
    /// modificación para no pisar un reclamo cuyo despacho sigue en curso.
    pub async fn reconcile_vehicle(&self, vehicle_id: Uuid) -> AppResult<bool> {
        let vehicle = match self.vehicles.get(vehicle_id).await {
            Ok(vehicle) => vehicle,
            Err(AppError::NotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        if vehicle.available {
            return Ok(false);
        }

        let grace = chrono::Duration::seconds(i64::from(self.settings.release_grace_secs));
        if Utc::now() - vehicle.last_updated_at < grace {
            return Ok(false);
        }
        if self.requests.find_active_for_vehicle(vehicle_id).await?.is_some() {
            return Ok(false);
        }

        // Condicionado a la revisión leída: cualquier escritura intermedia gana
        match self
            .vehicles
            .release_if_unchanged(vehicle_id, vehicle.revision)
            .await?
        {
            Some(_) => {
                self.metrics.record_reconciled_release();
                warn!(vehicle_id = %vehicle_id, "🧹 Vehículo sin solicitud activa devuelto a la flota");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reconciliación de toda la flota; devuelve cuántos vehículos se liberaron
    pub async fn reconcile_fleet(&self) -> AppResult<usize> {
        let mut released = 0;
        for vehicle in self.vehicles.list_all().await? {
            if !vehicle.available && self.reconcile_vehicle(vehicle.id).await? {
                released += 1;
            }
        }
        Ok(released)
    }

    /// Historial de una solicitud existente, en orden de inserción
    pub async fn get_history(&self, request_id: Uuid) -> AppResult<Vec<HistoryEntry>> {
        self.requests.get(request_id).await?;
        self.history.for_request(request_id).await
    }

    /// Actualiza la posición y la reenvía al solicitante si el vehículo
    /// está atendiendo una solicitud despachada.
    pub async fn report_location(
        &self,
        vehicle_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> AppResult<Vehicle> {
        let vehicle = self
            .vehicles
            .update_location(vehicle_id, latitude, longitude)
            .await?;

        match self.requests.find_active_for_vehicle(vehicle_id).await {
            Ok(Some(active)) if active.status == RequestStatus::Dispatched => {
                let event = NotificationEvent::VehicleLocation(LocationNotification {
                    request_id: active.id,
                    vehicle_id,
                    latitude: vehicle.latitude,
                    longitude: vehicle.longitude,
                    updated_at: vehicle.last_updated_at,
                });
                self.publish(&active.requester_id, &event).await;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(vehicle_id = %vehicle_id, error = %err, "⚠️ No se pudo buscar la solicitud activa para la posición");
            }
        }

        Ok(vehicle)
    }

    async fn notify_dispatch(&self, request: &ServiceRequest, vehicle: &Vehicle, eta: i64) {
        let event =
            NotificationEvent::VehicleDispatched(DispatchNotification::new(request, vehicle, eta));

        self.publish(&request.requester_id, &event).await;
        self.publish(&vehicle.driver_contact, &event).await;
    }

    /// Publicación best-effort: los fallos se registran y se descartan
    async fn publish(&self, recipient_id: &str, event: &NotificationEvent) {
        if let Err(err) = self.notifier.publish(recipient_id, event).await {
            self.metrics.record_notification_failure();
            warn!(
                recipient_id,
                request_id = %event.request_id(),
                error = %err,
                "📭 Fallo al entregar la notificación"
            );
        }
    }

    async fn append_history(&self, request_id: Uuid, kind: HistoryEventKind, details: String) {
        if let Err(err) = self.history.record(request_id, kind, details).await {
            warn!(request_id = %request_id, kind = %kind, error = %err, "⚠️ No se pudo añadir la entrada de historial");
        }
    }

    async fn release_after_terminal(&self, request_id: Uuid, vehicle_id: Uuid) -> AppResult<()> {
        self.release_with_retry(vehicle_id).await.map_err(|err| {
            error!(
                request_id = %request_id,
                vehicle_id = %vehicle_id,
                error = %err,
                "❌ Solicitud cerrada pero el vehículo sigue sin liberar"
            );
            err
        })
    }

    /// Un reintento sobre una solicitud ya terminal repara el vehículo que
    /// la llamada original no consiguió liberar. El error original se conserva.
    async fn reconcile_after_rejection(&self, request_id: Uuid, err: AppError) -> AppError {
        let AppError::InvalidStateTransition { from, .. } = &err else {
            return err;
        };
        if !from.is_terminal() {
            return err;
        }

        let vehicle_id = match self.requests.get(request_id).await {
            Ok(request) => request.vehicle_id,
            Err(_) => None,
        };
        if let Some(vehicle_id) = vehicle_id {
            if let Err(reconcile_err) = self.reconcile_vehicle(vehicle_id).await {
                warn!(vehicle_id = %vehicle_id, error = %reconcile_err, "⚠️ Reconciliación fallida");
            }
        }
        err
    }

    async fn release_with_retry(&self, vehicle_id: Uuid) -> AppResult<()> {
        let mut attempt = 1;
        loop {
            match self.vehicles.release(vehicle_id).await {
                Ok(_) => return Ok(()),
                Err(AppError::NotFound(_)) => {
                    warn!(vehicle_id = %vehicle_id, "⚠️ El vehículo a liberar ya no existe");
                    return Ok(());
                }
                Err(err) if attempt < RELEASE_ATTEMPTS => {
                    warn!(vehicle_id = %vehicle_id, attempt, error = %err, "🔁 Liberación fallida, reintentando");
                    tokio::time::sleep(RELEASE_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
