use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::infra::config::DatabaseConfig;

pub async fn init_db(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(cfg.pool_size)
        .connect(&cfg.url)
        .await
        .context("connecting to database")
}

/// Liveness probe used by the health endpoint.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
