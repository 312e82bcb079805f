use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use emergency_dispatch::config::{DatabaseConfig, EnvironmentConfig};
use emergency_dispatch::services::dispatch_engine::DispatchEngine;
use emergency_dispatch::{create_router, database, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("🚑 Emergency Dispatch API");
    info!("================================================");

    let state = match DatabaseConfig::from_environment(&config) {
        Some(db_config) => {
            let pool = match database::connect(&db_config).await {
                Ok(pool) => pool,
                Err(e) => {
                    error!("❌ Error conectando a la base de datos: {:#}", e);
                    return Err(e);
                }
            };
            info!("✅ Almacenamiento PostgreSQL listo");
            AppState::postgres(config.clone(), pool)?
        }
        None => {
            warn!("⚠️ DATABASE_URL no definida, usando almacenamiento en memoria");
            AppState::in_memory(config.clone())?
        }
    };

    info!(
        candidate_pool_size = config.dispatch.default_options.candidate_pool_size,
        max_attempts = config.dispatch.default_options.max_attempts,
        speed_kmh = config.dispatch.speed_kmh,
        release_grace_secs = config.dispatch.release_grace_secs,
        reconcile_interval_secs = config.dispatch.reconcile_interval_secs,
        "⚙️ Parámetros de despacho"
    );

    if config.dispatch.reconcile_interval_secs > 0 {
        spawn_fleet_reconciler(
            state.engine.clone(),
            Duration::from_secs(config.dispatch.reconcile_interval_secs),
        );
    }

    let app = create_router(state);
    let addr: SocketAddr = config.server_url().parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Estado del servicio");
    info!("   GET  /metrics - Métricas Prometheus");
    info!("🚑 Vehículos:");
    info!("   POST /api/vehicles - Registrar vehículo");
    info!("   GET  /api/vehicles - Listar vehículos");
    info!("   GET  /api/vehicles/available - Vehículos disponibles");
    info!("   GET  /api/vehicles/nearest - Vehículos más cercanos");
    info!("   GET  /api/vehicles/:id - Obtener vehículo");
    info!("   PUT  /api/vehicles/:id/location - Reportar posición");
    info!("   DELETE /api/vehicles/:id - Dar de baja");
    info!("📝 Solicitudes:");
    info!("   POST /api/requests - Crear solicitud");
    info!("   GET  /api/requests - Listar solicitudes");
    info!("   GET  /api/requests/requester/:requester_id - Solicitudes de un solicitante");
    info!("   GET  /api/requests/:id - Obtener solicitud");
    info!("   POST /api/requests/:id/dispatch - Despachar vehículo");
    info!("   POST /api/requests/:id/complete - Completar servicio");
    info!("   POST /api/requests/:id/cancel - Cancelar solicitud");
    info!("   GET  /api/requests/:id/history - Historial");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Devuelve periódicamente a la flota los vehículos sin solicitud activa
fn spawn_fleet_reconciler(engine: Arc<DispatchEngine>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match engine.reconcile_fleet().await {
                Ok(0) => {}
                Ok(released) => info!(released, "🧹 Reconciliación de flota completada"),
                Err(e) => warn!("⚠️ Reconciliación de flota fallida: {}", e),
            }
        }
    });
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
