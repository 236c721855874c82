mod api;
mod core;
mod infra;
mod models;

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{http::HeaderValue, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::docs::{openapi_json, swagger_ui};
use crate::api::system::{favicon, health, root};
use crate::api::table::table_routes;
use crate::infra::config::{load_config, AppConfig};
use crate::models::schema::TableDescriptor;

pub mod ax_state {
    use super::*;
    pub struct AppState {
        pub db: sqlx::PgPool,
        pub catalog: HashMap<String, Arc<TableDescriptor>>,
        pub read_only: HashSet<String>,
        pub config: AppConfig,
    }
}

fn build_cors(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        Ok(cors.allow_origin(Any))
    } else {
        let parsed = origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cors.allow_origin(parsed))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let db = infra::db::init_db(&config.database).await?;

    // One descriptor per exposed table; an unknown name fails startup here.
    let catalog = infra::reflect::build_catalog(&db, &config.api.expose_tables).await?;

    let docs_path = config.api.docs.docs_path.clone();
    let base = config.api.prefix().to_string();
    let cors = build_cors(&config.server.cors_allow_origins)?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = Arc::new(ax_state::AppState {
        read_only: config.api.read_only_tables.iter().cloned().collect(),
        db,
        catalog,
        config,
    });

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/", get(root))
        .route("/favicon.ico", get(favicon))
        .route("/openapi.json", get(openapi_json))
        .route(&docs_path, get(swagger_ui));

    // One route per table; method dispatch happens inside the handler.
    for name in &state.config.api.expose_tables {
        let table = state
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown table '{name}'"))?;
        let path = format!("{base}/{name}");
        app = app.route(&path, table_routes(table));
        info!(table = %name, %path, "endpoint registered");
    }

    let app = app
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!(%addr, "restgate listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
