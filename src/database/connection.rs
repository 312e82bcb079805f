//! Conexión a PostgreSQL
//!
//! Abre el pool y aplica las migraciones embebidas en `migrations/`.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::database::DatabaseConfig;

/// Crear el pool y dejar el esquema al día
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    info!(url = %mask_database_url(&config.url), max_connections = config.max_connections, "🗄️ Conectando a PostgreSQL");

    let pool = config
        .create_pool()
        .await
        .context("Could not connect to PostgreSQL")?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Ejecutar migraciones de la base de datos
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Database migrations failed")?;
    info!("✅ Migraciones aplicadas");
    Ok(())
}

/// Enmascarar credenciales de la URL de la base de datos en logs
fn mask_database_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at_pos)) if at_pos > scheme_end => {
            format!("{}***:***@{}", &url[..scheme_end + 3], &url[at_pos + 1..])
        }
        _ => url.to_string(),
    }
}
